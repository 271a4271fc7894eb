use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{discard_file, ensure_parent_dir, promote, require, restore_backup, staging_path};

pub const LAT_KEY: &str = "lat";
pub const LON_KEY: &str = "lon";

/// GeoJSON sink writer
///
/// Streams a `FeatureCollection` of `Point` features. Rows without a
/// parseable `lat`/`lon` pair are skipped.
pub struct GeoJsonSink {
    final_path: PathBuf,
    writer: Option<BufWriter<File>>,
    features_written: u64,
    rows_skipped: u64,
    temp_path: Option<PathBuf>,
    backup_path: Option<PathBuf>,
    committed: bool,
}

impl GeoJsonSink {
    pub fn new(final_path: PathBuf) -> Result<Self> {
        ensure_parent_dir(&final_path)?;
        Ok(Self {
            final_path,
            writer: None,
            features_written: 0,
            rows_skipped: 0,
            temp_path: None,
            backup_path: None,
            committed: false,
        })
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn features_written(&self) -> u64 {
        self.features_written
    }

    pub fn rows_skipped(&self) -> u64 {
        self.rows_skipped
    }

    pub fn init(&mut self, _columns: &[String]) -> Result<()> {
        let temp_path = staging_path(&self.final_path);
        info!(
            "Initializing GeoJSON sink: {} (temp: {})",
            self.final_path.display(),
            temp_path.display()
        );

        let file = File::create(&temp_path).with_context(|| {
            format!("Failed to create temp GeoJSON file: {}", temp_path.display())
        })?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(b"{\"type\":\"FeatureCollection\",\"features\":[")
            .context("Failed to write GeoJSON header")?;

        self.writer = Some(writer);
        self.temp_path = Some(temp_path);
        Ok(())
    }

    pub fn write_row(&mut self, row: &[(String, String)]) -> Result<bool> {
        let Some(feature) = point_feature(row) else {
            self.rows_skipped += 1;
            debug!("Skipping row without coordinates for GeoJSON output");
            return Ok(false);
        };

        let first = self.features_written == 0;
        let writer = require(self.writer.as_mut(), "GeoJSON")?;
        if !first {
            writer.write_all(b",")?;
        }
        serde_json::to_writer(&mut *writer, &feature)
            .context("Failed to serialize GeoJSON feature")?;

        self.features_written += 1;
        Ok(true)
    }

    pub fn prepare(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .write_all(b"]}\n")
                .context("Failed to close GeoJSON feature collection")?;
            writer.flush().context("Failed to flush GeoJSON writer")?;
        }
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        if let Some(temp_path) = &self.temp_path {
            self.backup_path = promote(temp_path, &self.final_path)?;
            info!(
                "Committed GeoJSON sink: {} ({} features, {} rows without coordinates)",
                self.final_path.display(),
                self.features_written,
                self.rows_skipped
            );
            self.committed = true;
        }
        self.temp_path = None;
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        drop(self.writer.take());
        if self.committed {
            discard_file(&self.final_path, "GeoJSON committed");
            if let Some(backup) = self.backup_path.take() {
                restore_backup(&backup, &self.final_path);
            }
        }
        if let Some(temp_path) = self.temp_path.take() {
            discard_file(&temp_path, "GeoJSON temp");
        }
        self.committed = false;
        Ok(())
    }
}

impl Drop for GeoJsonSink {
    fn drop(&mut self) {
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

/// Build a Point feature from a row; `None` when coordinates are missing.
///
/// GeoJSON orders positions as `[lon, lat]`. Every other tag becomes a
/// string property.
pub fn point_feature(row: &[(String, String)]) -> Option<Value> {
    let lookup = |key: &str| {
        row.iter()
            .rev()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    };
    let lat = lookup(LAT_KEY)?;
    let lon = lookup(LON_KEY)?;

    let mut properties = Map::new();
    for (key, value) in row {
        if key == LAT_KEY || key == LON_KEY {
            continue;
        }
        properties.insert(key.clone(), Value::String(value.clone()));
    }

    Some(json!({
        "type": "Feature",
        "geometry": {
            "type": "Point",
            "coordinates": [lon, lat],
        },
        "properties": properties,
    }))
}
