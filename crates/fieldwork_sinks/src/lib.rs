//! Output writers for flattened instance rows.
//!
//! Every sink receives rows of `(key, value)` tag pairs and writes them to a
//! file. Sinks handle:
//! - Staging to a hidden temp file next to the destination
//! - Header/column setup
//! - Row writing
//! - Atomic promotion on commit, cleanup on rollback or drop

use anyhow::{bail, Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

mod csv_sink;
mod geojson;

pub use csv_sink::CsvSink;
pub use geojson::GeoJsonSink;

/// Errors returned by sink setup and writing.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{message}")]
    Source {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;

impl From<anyhow::Error> for SinkError {
    fn from(err: anyhow::Error) -> Self {
        SinkError::Source {
            message: format!("{:#}", err),
            source: err,
        }
    }
}

/// Union of all keys across rows, in first-seen order.
pub fn column_union<'a, I>(rows: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a [(String, String)]>,
{
    let mut seen: HashSet<&'a str> = HashSet::new();
    let mut columns = Vec::new();
    for row in rows {
        for (key, _) in row {
            if seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Hidden staging path for a destination: `dir/.name.tmp`.
pub fn staging_path(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let temp_name = format!(".{}.tmp", name);
    match final_path.parent() {
        Some(parent) => parent.join(temp_name),
        None => PathBuf::from(temp_name),
    }
}

/// Hidden backup path for a replaced destination: `dir/.name.bak`.
pub fn backup_path(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let backup_name = format!(".{}.bak", name);
    match final_path.parent() {
        Some(parent) => parent.join(backup_name),
        None => PathBuf::from(backup_name),
    }
}

/// Rename a staged file into place. An existing destination is moved
/// aside first and its backup path returned, so a rollback can put it
/// back.
pub(crate) fn promote(temp_path: &Path, final_path: &Path) -> Result<Option<PathBuf>> {
    let backup = if final_path.exists() {
        let backup = backup_path(final_path);
        std::fs::rename(final_path, &backup).with_context(|| {
            format!(
                "Failed to move existing {} aside to {}",
                final_path.display(),
                backup.display()
            )
        })?;
        Some(backup)
    } else {
        None
    };

    if let Err(err) = std::fs::rename(temp_path, final_path) {
        if let Some(backup) = &backup {
            let _ = std::fs::rename(backup, final_path);
        }
        return Err(err).with_context(|| {
            format!(
                "Failed to rename {} -> {}",
                temp_path.display(),
                final_path.display()
            )
        });
    }
    Ok(backup)
}

/// Put a replaced destination back after its replacement was discarded.
pub(crate) fn restore_backup(backup: &Path, final_path: &Path) {
    if std::fs::rename(backup, final_path).is_ok() {
        warn!("Restored previous file: {}", final_path.display());
    }
}

/// Create the destination's parent directory if it has one.
pub(crate) fn ensure_parent_dir(final_path: &Path) -> Result<()> {
    if let Some(parent) = final_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    Ok(())
}

/// Remove a staged or promoted file, logging what was removed.
pub(crate) fn discard_file(path: &Path, what: &str) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
        warn!("Rolled back {} file: {}", what, path.display());
    }
}

enum Sink {
    Csv(Box<CsvSink>),
    GeoJson(Box<GeoJsonSink>),
}

impl Sink {
    fn init(&mut self, columns: &[String]) -> Result<()> {
        match self {
            Sink::Csv(sink) => sink.init(columns),
            Sink::GeoJson(sink) => sink.init(columns),
        }
    }

    fn write_row(&mut self, row: &[(String, String)]) -> Result<bool> {
        match self {
            Sink::Csv(sink) => sink.write_row(row),
            Sink::GeoJson(sink) => sink.write_row(row),
        }
    }

    fn prepare(&mut self) -> Result<()> {
        match self {
            Sink::Csv(sink) => sink.prepare(),
            Sink::GeoJson(sink) => sink.prepare(),
        }
    }

    fn commit(&mut self) -> Result<()> {
        match self {
            Sink::Csv(sink) => sink.commit(),
            Sink::GeoJson(sink) => sink.commit(),
        }
    }

    fn rollback(&mut self) -> Result<()> {
        match self {
            Sink::Csv(sink) => sink.rollback(),
            Sink::GeoJson(sink) => sink.rollback(),
        }
    }

    fn final_path(&self) -> &Path {
        match self {
            Sink::Csv(sink) => sink.final_path(),
            Sink::GeoJson(sink) => sink.final_path(),
        }
    }
}

/// Sink registry - manages the outputs of one conversion run.
#[derive(Default)]
pub struct SinkRegistry {
    sinks: BTreeMap<String, Sink>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a CSV output under `name`.
    pub fn add_csv(&mut self, name: &str, final_path: PathBuf) -> SinkResult<()> {
        let sink = CsvSink::new(final_path)?;
        self.sinks.insert(name.to_string(), Sink::Csv(Box::new(sink)));
        Ok(())
    }

    /// Register a GeoJSON output under `name`.
    pub fn add_geojson(&mut self, name: &str, final_path: PathBuf) -> SinkResult<()> {
        let sink = GeoJsonSink::new(final_path)?;
        self.sinks
            .insert(name.to_string(), Sink::GeoJson(Box::new(sink)));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Initialize every sink with the run's column set.
    pub fn init_all(&mut self, columns: &[String]) -> SinkResult<()> {
        for (name, sink) in self.sinks.iter_mut() {
            sink.init(columns)
                .with_context(|| format!("Failed to initialize sink '{}'", name))?;
        }
        Ok(())
    }

    /// Write one row to every sink. Returns how many sinks accepted it.
    pub fn write_row(&mut self, row: &[(String, String)]) -> SinkResult<usize> {
        let mut accepted = 0;
        for (name, sink) in self.sinks.iter_mut() {
            if sink
                .write_row(row)
                .with_context(|| format!("Failed to write row to sink '{}'", name))?
            {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Finish all sinks using prepare/commit with rollback on failure.
    ///
    /// Returns the promoted paths in sink-name order.
    pub fn finish(mut self) -> SinkResult<Vec<PathBuf>> {
        let names: Vec<String> = self.sinks.keys().cloned().collect();

        let prepare_result: Result<()> = (|| {
            for name in &names {
                if let Some(sink) = self.sinks.get_mut(name) {
                    debug!("Preparing sink: {}", name);
                    sink.prepare()?;
                }
            }
            Ok(())
        })();
        if let Err(err) = prepare_result {
            self.rollback_all();
            return Err(err.into());
        }

        let commit_result: Result<()> = (|| {
            for name in &names {
                if let Some(sink) = self.sinks.get_mut(name) {
                    debug!("Committing sink: {}", name);
                    sink.commit()?;
                }
            }
            Ok(())
        })();

        if let Err(err) = commit_result {
            warn!("Sink commit failed, rolling back: {}", err);
            self.rollback_all();
            return Err(err.into());
        }

        Ok(self
            .sinks
            .values()
            .map(|sink| sink.final_path().to_path_buf())
            .collect())
    }

    /// Discard every staged and promoted file.
    pub fn abort(mut self) {
        self.rollback_all();
    }

    fn rollback_all(&mut self) {
        for sink in self.sinks.values_mut() {
            let _ = sink.rollback();
        }
    }
}

pub(crate) fn require<T>(value: Option<T>, what: &str) -> Result<T> {
    match value {
        Some(v) => Ok(v),
        None => bail!("{} sink not initialized", what),
    }
}
