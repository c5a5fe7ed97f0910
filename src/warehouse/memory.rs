use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{LoadJob, TableRef, Warehouse};
use crate::formats::Dataset;

/// In-memory warehouse for tests. Tables are keyed by their dotted path.
#[derive(Default)]
pub(crate) struct InMemoryWarehouse {
    tables: Mutex<HashMap<String, Dataset>>,
    calls: AtomicUsize,
    fail_with: Option<String>,
}

impl InMemoryWarehouse {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every load fails with `message` and leaves tables untouched
    pub(crate) fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn table(&self, destination: &str) -> Option<Dataset> {
        self.tables.lock().unwrap().get(destination).cloned()
    }

    pub(crate) fn seed(&self, destination: &str, dataset: Dataset) {
        self.tables
            .lock()
            .unwrap()
            .insert(destination.to_string(), dataset);
    }
}

#[async_trait]
impl Warehouse for InMemoryWarehouse {
    async fn replace_table(&self, destination: &TableRef, dataset: Dataset) -> Result<LoadJob> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(message) = &self.fail_with {
            return Err(anyhow!("{message}"));
        }

        let output_rows = dataset.num_rows() as u64;
        self.tables
            .lock()
            .unwrap()
            .insert(destination.to_string(), dataset);

        Ok(LoadJob {
            job_id: format!("memory-{n}"),
            output_rows: Some(output_rows),
        })
    }
}
