//! Parquet file decoding.

use anyhow::{Context, Result};
use futures::TryStreamExt;
use parquet::arrow::async_reader::ParquetRecordBatchStreamBuilder;
use std::path::Path;
use tokio::fs::File;

use super::dataset::Dataset;

/// Read every row group of a local Parquet file into a [`Dataset`].
pub async fn read_parquet_file(path: &Path) -> Result<Dataset> {
    let file = File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let builder = ParquetRecordBatchStreamBuilder::new(file)
        .await
        .context("Failed to read Parquet metadata")?;

    let schema = builder.schema().clone();
    let stream = builder.build().context("Failed to build Parquet stream")?;

    let batches = stream
        .try_collect::<Vec<_>>()
        .await
        .context("Failed to read record batch")?;

    Ok(Dataset::new(schema, batches))
}
