//! Tabulation of inline JSON records.
//!
//! The column set is the union of keys seen across all records, in first-seen
//! order, and row order follows input order. Types are inferred per column by
//! arrow-json; mixed scalar types widen to strings and columns that only ever
//! hold nulls are loaded as strings.

use anyhow::{Context, Result};
use arrow::datatypes::{DataType, Field, Fields, Schema};
use arrow::json::ReaderBuilder;
use arrow::json::reader::infer_json_schema_from_iterator;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::dataset::Dataset;
use crate::config::RECORD_BATCH_SIZE;

/// One inline record: column name to value
pub type JsonRecord = Map<String, Value>;

/// Build a [`Dataset`] from records, keeping their order.
///
/// CPU bound; call from a blocking task.
pub fn records_to_dataset(records: Vec<JsonRecord>) -> Result<Dataset> {
    if records.is_empty() {
        return Ok(Dataset::empty());
    }

    let rows: Vec<Value> = records.into_iter().map(Value::Object).collect();

    let inferred = infer_json_schema_from_iterator(rows.iter().map(Ok))
        .context("Failed to infer schema from records")?;
    if inferred.fields().is_empty() {
        return Ok(Dataset::empty());
    }
    let schema = Arc::new(loadable_schema(&inferred));

    let mut decoder = ReaderBuilder::new(Arc::clone(&schema))
        .with_batch_size(RECORD_BATCH_SIZE)
        .with_coerce_primitive(true)
        .build_decoder()
        .context("Failed to create JSON decoder")?;

    let mut batches = Vec::with_capacity(rows.len().div_ceil(RECORD_BATCH_SIZE));
    for chunk in rows.chunks(RECORD_BATCH_SIZE) {
        decoder
            .serialize(chunk)
            .context("Failed to convert records to columns")?;
        if let Some(batch) = decoder.flush().context("Failed to flush record batch")? {
            batches.push(batch);
        }
    }

    Ok(Dataset::new(schema, batches))
}

/// Replace types the warehouse cannot take from an all-null column.
fn loadable_schema(schema: &Schema) -> Schema {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| f.as_ref().clone().with_data_type(loadable_type(f.data_type())))
        .collect();
    Schema::new(fields)
}

fn loadable_type(data_type: &DataType) -> DataType {
    match data_type {
        DataType::Null => DataType::Utf8,
        DataType::List(item) => DataType::List(Arc::new(
            item.as_ref()
                .clone()
                .with_data_type(loadable_type(item.data_type())),
        )),
        DataType::Struct(fields) => DataType::Struct(Fields::from(
            fields
                .iter()
                .map(|f| f.as_ref().clone().with_data_type(loadable_type(f.data_type())))
                .collect::<Vec<Field>>(),
        )),
        other => other.clone(),
    }
}
