use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{discard_file, ensure_parent_dir, promote, require, restore_backup, staging_path};

/// CSV sink writer
///
/// Header is the column set given to `init`; each row fills the columns it
/// has and leaves the rest empty. Quoting follows the spreadsheet dialect
/// (`"` around fields holding delimiters, quotes or newlines).
pub struct CsvSink {
    final_path: PathBuf,
    columns: Vec<String>,
    writer: Option<csv::Writer<File>>,
    rows_written: u64,
    /// Temp file path for staging
    temp_path: Option<PathBuf>,
    /// Previous file at the destination, kept until the run succeeds
    backup_path: Option<PathBuf>,
    /// True once final file has been promoted
    committed: bool,
}

impl CsvSink {
    pub fn new(final_path: PathBuf) -> Result<Self> {
        ensure_parent_dir(&final_path)?;

        Ok(Self {
            final_path,
            columns: Vec::new(),
            writer: None,
            rows_written: 0,
            temp_path: None,
            backup_path: None,
            committed: false,
        })
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn init(&mut self, columns: &[String]) -> Result<()> {
        let temp_path = staging_path(&self.final_path);

        info!(
            "Initializing CSV sink: {} (temp: {})",
            self.final_path.display(),
            temp_path.display()
        );

        let file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temp CSV file: {}", temp_path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(file);
        if !columns.is_empty() {
            writer
                .write_record(columns)
                .context("Failed to write CSV header")?;
        }

        self.columns = columns.to_vec();
        self.writer = Some(writer);
        self.temp_path = Some(temp_path);
        Ok(())
    }

    pub fn write_row(&mut self, row: &[(String, String)]) -> Result<bool> {
        let writer = require(self.writer.as_mut(), "CSV")?;

        let values: HashMap<&str, &str> = row
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let record: Vec<&str> = self
            .columns
            .iter()
            .map(|column| values.get(column.as_str()).copied().unwrap_or(""))
            .collect();

        writer
            .write_record(&record)
            .context("Failed to write row to CSV")?;

        self.rows_written += 1;
        debug!("Wrote CSV row {}", self.rows_written);
        Ok(true)
    }

    pub fn prepare(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().context("Failed to flush CSV writer")?;
        }
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        if let Some(temp_path) = &self.temp_path {
            self.backup_path = promote(temp_path, &self.final_path)?;
            info!(
                "Committed CSV sink: {} ({} rows)",
                self.final_path.display(),
                self.rows_written
            );
            self.committed = true;
        }
        self.temp_path = None;
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        drop(self.writer.take());
        if self.committed {
            discard_file(&self.final_path, "CSV committed");
            if let Some(backup) = self.backup_path.take() {
                restore_backup(&backup, &self.final_path);
            }
        }
        if let Some(temp_path) = self.temp_path.take() {
            discard_file(&temp_path, "CSV temp");
        }
        self.committed = false;
        Ok(())
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        // Cleanup temp file if we didn't finish properly
        drop(self.writer.take());
        if let Some(temp_path) = &self.temp_path {
            if temp_path.exists() {
                let _ = std::fs::remove_file(temp_path);
                warn!("Cleaned up orphaned temp file: {}", temp_path.display());
            }
        }
        if let Some(backup) = self.backup_path.take() {
            let _ = std::fs::remove_file(backup);
        }
    }
}
