//! Input formats and the in-memory dataset they decode into

pub mod dataset;
pub mod parquet;
pub mod records;

pub use dataset::Dataset;
pub use records::{JsonRecord, records_to_dataset};
pub use self::parquet::read_parquet_file;
