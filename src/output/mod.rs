//! Tabular output sinks.

use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use crate::billing::{NormalizedRow, COLUMNS, PRIMARY_KEY};
use crate::error::BillingError;

/// Destination for normalized rows.
pub trait TableWriter: Send + Sync {
    /// Write `rows` as table `table` and return the data file path.
    fn write(&self, table: &str, rows: &[NormalizedRow]) -> Result<PathBuf, BillingError>;
}

/// Sidecar describing how the table should be loaded.
#[derive(Debug, Clone, Serialize)]
pub struct TableManifest {
    pub incremental: bool,
    pub primary_key: Vec<String>,
    pub columns: Vec<String>,
}

impl Default for TableManifest {
    fn default() -> Self {
        Self {
            incremental: true,
            primary_key: vec![PRIMARY_KEY.to_string()],
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Writes `<dir>/<table>.csv` plus `<table>.csv.manifest`.
///
/// # Example
/// ```no_run
/// use allegro_billing::output::{CsvTableWriter, TableWriter};
///
/// let writer = CsvTableWriter::new("out/tables");
/// let path = writer.write("billing_entries", &[])?;
/// assert!(path.ends_with("billing_entries.csv"));
/// # Ok::<(), allegro_billing::error::BillingError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CsvTableWriter {
    dir: PathBuf,
}

impl CsvTableWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TableWriter for CsvTableWriter {
    fn write(&self, table: &str, rows: &[NormalizedRow]) -> Result<PathBuf, BillingError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{table}.csv"));

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)?;
        writer.write_record(COLUMNS)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        let manifest_path = self.dir.join(format!("{table}.csv.manifest"));
        let manifest = serde_json::to_string_pretty(&TableManifest::default())?;
        fs::write(&manifest_path, manifest)?;

        tracing::info!(path = %path.display(), rows = rows.len(), "Wrote output table");
        Ok(path)
    }
}
