// Load-once dataset capability

use anyhow::Result;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::csv_reader::{read_csv_file, read_csv_from_stdin};
use crate::data::Dataset;
use crate::schema::SchemaOverrides;

/// Where the dataset comes from
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    File(PathBuf),
    Stdin,
}

impl DataSource {
    /// `-` means stdin, anything else is a path
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            DataSource::Stdin
        } else {
            DataSource::File(PathBuf::from(arg))
        }
    }
}

/// Lazily loads the dataset on first access and hands out the same shared
/// copy afterwards. A failed load leaves the cell empty so the next call
/// retries.
#[derive(Debug)]
pub struct DatasetStore {
    source: DataSource,
    overrides: SchemaOverrides,
    cell: OnceCell<Arc<Dataset>>,
}

impl DatasetStore {
    pub fn new(source: DataSource, overrides: SchemaOverrides) -> Self {
        Self {
            source,
            overrides,
            cell: OnceCell::new(),
        }
    }

    pub fn get(&self) -> Result<Arc<Dataset>> {
        self.cell.get_or_try_init(|| self.load()).map(Arc::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    fn load(&self) -> Result<Arc<Dataset>> {
        let csv = match &self.source {
            DataSource::File(path) => read_csv_file(path)?,
            DataSource::Stdin => read_csv_from_stdin()?,
        };
        let dataset = Dataset::from_csv(csv, &self.overrides)?;
        info!(
            source = ?self.source,
            rows = dataset.row_count(),
            columns = dataset.columns().len(),
            "dataset loaded"
        );
        Ok(Arc::new(dataset))
    }
}
