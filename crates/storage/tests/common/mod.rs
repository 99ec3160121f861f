pub mod contract;
pub mod minio;

#[allow(unused_imports)]
pub use contract::{collect_stream, stream_of};
#[allow(unused_imports)]
pub use minio::{MinioContext, should_skip_s3_tests};
