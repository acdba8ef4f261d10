//! CSV Export
//!
//! Writes a store snapshot as a table with columns
//! `ID, Address, Date, Weight`, dates in the canonical `dd.MM.yyyy` form.

use crate::storage::{Order, OrderStore};
use std::io::Write;
use std::path::Path;

/// Column headers, in output order
pub const EXPORT_HEADERS: [&str; 4] = ["ID", "Address", "Date", "Weight"];

/// Errors that can occur during export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// CSV exporter over `OrderStore::all_records`
#[derive(Debug, Clone)]
pub struct CsvExporter {
    /// Field delimiter
    delimiter: u8,
    /// Whether to write a header row
    has_header: bool,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvExporter {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
        }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to write a header row
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Export every order in the store to a file, returning the row count
    pub fn export_to_path(&self, store: &OrderStore, path: &Path) -> Result<usize, ExportError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = std::fs::File::create(path)?;
        let rows = self.write_orders(&store.all_records(), std::io::BufWriter::new(file))?;
        tracing::info!(path = ?path, rows, "Exported orders");
        Ok(rows)
    }

    /// Write orders to any writer, returning the row count
    pub fn write_orders<W: Write>(&self, orders: &[Order], writer: W) -> Result<usize, ExportError> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(writer);

        if self.has_header {
            csv_writer.write_record(EXPORT_HEADERS)?;
        }

        for order in orders {
            csv_writer.write_record([
                order.id.to_string(),
                order.address.clone(),
                order.formatted_date(),
                order.weight.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(orders.len())
    }
}
