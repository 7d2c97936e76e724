use std::num::NonZeroUsize;
use std::sync::Arc;

use fnv::FnvHashMap;
use lru::LruCache;

pub(crate) type Page = Arc<[u8]>;

/// Page index -> page bytes. Unbounded unless a capacity is given.
pub(crate) enum PageCache {
    Unbounded(FnvHashMap<u64, Page>),
    Lru(LruCache<u64, Page>),
}

impl PageCache {
    pub(crate) fn new(capacity: Option<NonZeroUsize>) -> Self {
        match capacity {
            Some(capacity) => PageCache::Lru(LruCache::new(capacity)),
            None => PageCache::Unbounded(FnvHashMap::default()),
        }
    }

    pub(crate) fn get(&mut self, index: u64) -> Option<Page> {
        match self {
            PageCache::Unbounded(map) => map.get(&index).cloned(),
            PageCache::Lru(lru) => lru.get(&index).cloned(),
        }
    }

    /// Insert a page, returning the index of the page evicted to make room.
    pub(crate) fn insert(&mut self, index: u64, page: Page) -> Option<u64> {
        match self {
            PageCache::Unbounded(map) => {
                map.insert(index, page);
                None
            }
            PageCache::Lru(lru) => match lru.push(index, page) {
                Some((evicted, _)) if evicted != index => Some(evicted),
                _ => None,
            },
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            PageCache::Unbounded(map) => map.len(),
            PageCache::Lru(lru) => lru.len(),
        }
    }

    pub(crate) fn indices(&self) -> Vec<u64> {
        let mut indices: Vec<u64> = match self {
            PageCache::Unbounded(map) => map.keys().copied().collect(),
            PageCache::Lru(lru) => lru.iter().map(|(index, _)| *index).collect(),
        };
        indices.sort_unstable();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(byte: u8) -> Page {
        Arc::from(vec![byte; 4])
    }

    #[test]
    fn unbounded_keeps_everything() {
        let mut cache = PageCache::new(None);
        for i in 0..100 {
            assert_eq!(cache.insert(i, page(i as u8)), None);
        }
        assert_eq!(cache.len(), 100);
        assert_eq!(cache.get(42).unwrap()[0], 42);
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let mut cache = PageCache::new(NonZeroUsize::new(2));
        cache.insert(0, page(0));
        cache.insert(1, page(1));
        assert!(cache.get(0).is_some());

        assert_eq!(cache.insert(2, page(2)), Some(1));
        assert_eq!(cache.indices(), vec![0, 2]);
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn lru_reinsert_is_not_an_eviction() {
        let mut cache = PageCache::new(NonZeroUsize::new(1));
        cache.insert(7, page(1));
        assert_eq!(cache.insert(7, page(2)), None);
        assert_eq!(cache.get(7).unwrap()[0], 2);
    }
}
