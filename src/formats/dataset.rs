//! In-memory tabular dataset shared by every input format.

use anyhow::{Context, Result};
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::sync::Arc;

/// Named columns and ordered rows, held as Arrow record batches
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Dataset {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    /// A dataset with no columns and no rows
    pub fn empty() -> Self {
        Self {
            schema: Arc::new(Schema::empty()),
            batches: Vec::new(),
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    /// True when there is nothing loadable: no rows, or rows without columns.
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0 || self.num_columns() == 0
    }

    /// Encode the whole dataset as a single Parquet file in memory.
    ///
    /// CPU bound; call from a blocking task.
    pub fn to_parquet_bytes(&self) -> Result<Bytes> {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(Vec::new(), Arc::clone(&self.schema), Some(props))
            .context("Failed to create Parquet writer")?;

        for batch in &self.batches {
            writer
                .write(batch)
                .context("Failed to write record batch to Parquet")?;
        }

        let buffer = writer
            .into_inner()
            .context("Failed to finalize Parquet file")?;

        Ok(Bytes::from(buffer))
    }
}
