//! Remote objects as seekable streams over `object_store` range requests.

mod range_stream;

pub use range_stream::{RemoteRangeStream, RemoteRangeStreamBuilder};
