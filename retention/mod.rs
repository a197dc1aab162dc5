pub mod bucket;
pub mod range;
pub mod schema;

pub use bucket::{parse_buckets, parse_duration, Bucket};
pub use range::QueryRange;
pub use schema::RetentionSchema;
