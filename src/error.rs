use std::io;

/// Error type shared by every stream in the crate.
///
/// `SeekOutOfRange` and `InvalidPosition` mean the same thing (a seek target
/// outside `[0, length]`). The first is raised by sources that talk to
/// storage, the second by the page cache. Use
/// [`StreamError::is_out_of_range`] when the distinction does not matter.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),
    #[error("Seek position {position} is outside of [0, {length}]")]
    SeekOutOfRange { position: i128, length: u64 },
    #[error("Stream position {position} is invalid for length {length}")]
    InvalidPosition { position: i128, length: u64 },
    #[error("Operation not supported on a read-only stream: {0}")]
    NotSupported(&'static str),
    #[error("Object {location} was modified or removed since it was opened (expected etag {etag})")]
    PreconditionFailed {
        location: String,
        etag: String,
        source: object_store::Error,
    },
    #[error("Read cancelled")]
    Cancelled,
    #[error("Object Store Error: {0}")]
    Store(#[source] object_store::Error),
    #[error("IO Error: {0}")]
    Io(io::Error),
}

impl StreamError {
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            StreamError::SeekOutOfRange { .. } | StreamError::InvalidPosition { .. }
        )
    }

    /// True when the remote object no longer matches the etag captured at
    /// open time. Callers typically reopen the stream.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, StreamError::PreconditionFailed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        match e.get_ref() {
            Some(inner) if inner.is::<StreamError>() => {}
            _ => return StreamError::Io(e),
        }

        // The io::Error only wraps a StreamError that crossed a std::io boundary.
        let kind = e.kind();
        match e.into_inner().map(|inner| inner.downcast::<StreamError>()) {
            Some(Ok(err)) => *err,
            Some(Err(inner)) => StreamError::Io(io::Error::new(kind, inner)),
            None => StreamError::Io(io::Error::from(kind)),
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(e: StreamError) -> Self {
        let kind = match e {
            StreamError::Io(inner) => return inner,
            StreamError::InvalidArgument(_)
            | StreamError::SeekOutOfRange { .. }
            | StreamError::InvalidPosition { .. } => io::ErrorKind::InvalidInput,
            StreamError::NotSupported(_) => io::ErrorKind::Unsupported,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_error_survives_io_round_trip() {
        let original = StreamError::InvalidPosition {
            position: -1,
            length: 10,
        };
        let io_err: io::Error = original.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);

        let back = StreamError::from(io_err);
        assert!(matches!(
            back,
            StreamError::InvalidPosition {
                position: -1,
                length: 10
            }
        ));
    }

    #[test]
    fn plain_io_error_is_wrapped() {
        let err = StreamError::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        match err {
            StreamError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn io_variant_unwraps_to_inner_error() {
        let err = StreamError::Io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);
        assert!(io_err.get_ref().map_or(true, |inner| !inner.is::<StreamError>()));
    }

    #[test]
    fn out_of_range_flavours_are_equivalent() {
        assert!(StreamError::SeekOutOfRange {
            position: 11,
            length: 10
        }
        .is_out_of_range());
        assert!(StreamError::InvalidPosition {
            position: 11,
            length: 10
        }
        .is_out_of_range());
        assert!(!StreamError::Cancelled.is_out_of_range());
    }

    #[test]
    fn not_supported_maps_to_unsupported_kind() {
        let io_err: io::Error = StreamError::NotSupported("write").into();
        assert_eq!(io_err.kind(), io::ErrorKind::Unsupported);
    }
}
