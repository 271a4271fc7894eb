//! Conversion pipeline: discover, flatten, write.
//!
//! One run walks the discovered instances in order. Each instance either
//! becomes a row or a recorded failure; neither stops the batch. Outputs
//! are written only when at least one row was produced.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::instance::{read_instance, FlattenRules, InstanceError, TagMap};
use crate::naming::output_filename_at;
use crate::scout::{discover_instances_in, Discovery, ScoutError};
use fieldwork_sinks::{column_union, SinkError, SinkRegistry};

const CSV_SINK: &str = "csv";
const GEOJSON_SINK: &str = "geojson";

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Scout(#[from] ScoutError),

    #[error("no instance directories matched '{instance_spec}'")]
    NoInstances { instance_spec: String },

    #[error("failed to write outputs: {0}")]
    Sink(#[from] SinkError),
}

/// One converted instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceRow {
    pub source: PathBuf,
    pub tags: TagMap,
}

/// One instance that could not be converted.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceFailure {
    pub source: PathBuf,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every instance converted
    Clean,
    /// Some rows, some failures
    Partial,
    /// Nothing converted
    Failed,
}

/// Everything one run produced; threaded through the pipeline.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub instance_spec: String,
    pub discovered: usize,
    pub rows: Vec<InstanceRow>,
    pub failures: Vec<InstanceFailure>,
    /// CSV destination derived for this run, written or not
    pub target: Option<PathBuf>,
    pub outputs: Vec<PathBuf>,
}

impl RunReport {
    pub fn new(instance_spec: &str) -> Self {
        Self {
            instance_spec: instance_spec.to_string(),
            ..Self::default()
        }
    }

    pub fn record_row(&mut self, source: &Path, tags: TagMap) {
        debug!("{}: {} tags", source.display(), tags.len());
        self.rows.push(InstanceRow {
            source: source.to_path_buf(),
            tags,
        });
    }

    pub fn record_failure(&mut self, source: &Path, error: &InstanceError) {
        warn!("Skipping instance {}: {}", source.display(), error);
        self.failures.push(InstanceFailure {
            source: source.to_path_buf(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    pub fn status(&self) -> RunStatus {
        match (self.rows.is_empty(), self.failures.is_empty()) {
            (true, _) => RunStatus::Failed,
            (false, true) => RunStatus::Clean,
            (false, false) => RunStatus::Partial,
        }
    }

    /// Primary output: the CSV when written, else the first output.
    pub fn primary_output(&self) -> Option<&Path> {
        self.outputs
            .iter()
            .find(|p| p.extension().is_some_and(|e| e == "csv"))
            .or_else(|| self.outputs.first())
            .map(PathBuf::as_path)
    }
}

/// Where and what to write.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Explicit CSV path; GeoJSON goes next to it
    pub outfile: Option<PathBuf>,
    /// Directory for derived names
    pub output_dir: Option<PathBuf>,
    pub write_csv: bool,
    pub write_geojson: bool,
}

/// Resolved output paths for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    /// CSV destination, whether or not it is written
    pub target: PathBuf,
    pub csv: Option<PathBuf>,
    pub geojson: Option<PathBuf>,
}

impl OutputPlan {
    /// The path reported as written.
    pub fn primary(&self) -> Option<&Path> {
        self.csv.as_deref().or(self.geojson.as_deref())
    }

    /// Resolve relative paths against `base`.
    pub fn resolved_against(self, base: &Path) -> Self {
        Self {
            target: base.join(self.target),
            csv: self.csv.map(|p| base.join(p)),
            geojson: self.geojson.map(|p| base.join(p)),
        }
    }
}

/// Derive output paths from the first instance file.
pub fn plan_outputs(first_instance: &Path, options: &OutputOptions, now: &DateTime<Local>) -> OutputPlan {
    let csv_path = match &options.outfile {
        Some(path) => path.clone(),
        None => {
            let name = output_filename_at(first_instance, "csv", now);
            match &options.output_dir {
                Some(dir) => dir.join(name),
                None => PathBuf::from(name),
            }
        }
    };
    let geojson_path = csv_path.with_extension("geojson");

    OutputPlan {
        csv: options.write_csv.then(|| csv_path.clone()),
        geojson: options.write_geojson.then_some(geojson_path),
        target: csv_path,
    }
}

/// Flatten every discovered instance into the report.
pub fn convert_discovery(discovery: &Discovery, rules: &FlattenRules, report: &mut RunReport) {
    report.discovered += discovery.len();
    for entry in &discovery.entries {
        match entry {
            Ok(path) => {
                info!("Processing instance file: {}", path.display());
                match read_instance(path, rules) {
                    Ok(tags) => report.record_row(path, tags),
                    Err(err) => report.record_failure(path, &err),
                }
            }
            Err(issue) => {
                let path = issue.path().to_path_buf();
                report.record_failure(&path, &InstanceError::Discovery(issue.clone()));
            }
        }
    }
}

/// Write every planned output from the report's rows.
pub fn write_outputs(report: &RunReport, plan: &OutputPlan) -> Result<Vec<PathBuf>, SinkError> {
    let mut registry = SinkRegistry::new();
    if let Some(path) = &plan.csv {
        registry.add_csv(CSV_SINK, path.clone())?;
    }
    if let Some(path) = &plan.geojson {
        registry.add_geojson(GEOJSON_SINK, path.clone())?;
    }
    if registry.is_empty() {
        return Ok(Vec::new());
    }

    let columns = column_union(report.rows.iter().map(|r| r.tags.as_pairs()));
    debug!("Output columns: {}", columns.join(","));

    let written: Result<(), SinkError> = (|| {
        registry.init_all(&columns)?;
        for row in &report.rows {
            registry.write_row(row.tags.as_pairs())?;
        }
        Ok(())
    })();
    if let Err(err) = written {
        registry.abort();
        return Err(err);
    }

    registry.finish()
}

/// Run a whole conversion: discovery relative to `base`, flattening, and
/// output writing.
pub fn run_conversion(
    base: &Path,
    instance_spec: &str,
    rules: &FlattenRules,
    options: &OutputOptions,
) -> Result<RunReport, ConvertError> {
    let discovery = discover_instances_in(base, instance_spec)?;
    if discovery.is_empty() {
        return Err(ConvertError::NoInstances {
            instance_spec: instance_spec.to_string(),
        });
    }

    let mut report = RunReport::new(instance_spec);
    convert_discovery(&discovery, rules, &mut report);

    if report.rows.is_empty() {
        warn!("No instance converted; nothing written");
        return Ok(report);
    }

    let first = discovery
        .first_file()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| report.rows[0].source.clone());
    let plan = plan_outputs(&first, options, &Local::now()).resolved_against(base);
    if plan.primary().is_none() {
        debug!("All outputs disabled");
    }
    report.target = Some(plan.target.clone());

    report.outputs = write_outputs(&report, &plan)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    const GOOD: &str = r#"<?xml version="1.0"?>
<data id="buildings">
  <start>2021-01-01</start>
  <warmup>9.0 9.0 9.0 9.0</warmup>
  <gps>12.34 -56.78 10.0 5.0</gps>
  <building>yes</building>
  <meta><instanceID>uuid:1</instanceID></meta>
</data>"#;

    fn write_instance(base: &Path, name: &str, content: &str) {
        let dir = base.join("instances").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.xml", name)), content).unwrap();
    }

    fn options() -> OutputOptions {
        OutputOptions {
            write_csv: true,
            ..OutputOptions::default()
        }
    }

    #[test]
    fn test_plan_outputs_derived_names() {
        let now = Local.with_ymd_and_hms(2021, 7, 1, 14, 5, 0).unwrap();
        let opts = OutputOptions {
            output_dir: Some(PathBuf::from("exports")),
            write_csv: true,
            write_geojson: true,
            ..OutputOptions::default()
        };
        let plan = plan_outputs(Path::new("x/Form_2_1.xml"), &opts, &now);
        assert_eq!(plan.csv, Some(PathBuf::from("exports/Form_2021_14_5.csv")));
        assert_eq!(plan.geojson, Some(PathBuf::from("exports/Form_2021_14_5.geojson")));
        assert_eq!(plan.primary(), Some(Path::new("exports/Form_2021_14_5.csv")));
    }

    #[test]
    fn test_plan_outputs_explicit_outfile() {
        let now = Local::now();
        let opts = OutputOptions {
            outfile: Some(PathBuf::from("/tmp/out.csv")),
            output_dir: Some(PathBuf::from("ignored")),
            write_csv: false,
            write_geojson: true,
        };
        let plan = plan_outputs(Path::new("Form_2_1.xml"), &opts, &now);
        assert_eq!(plan.csv, None);
        assert_eq!(plan.target, PathBuf::from("/tmp/out.csv"));
        assert_eq!(plan.geojson, Some(PathBuf::from("/tmp/out.geojson")));
    }

    #[test]
    fn test_batch_tolerates_bad_instances() {
        let temp = TempDir::new().unwrap();
        write_instance(temp.path(), "a_1", GOOD);
        write_instance(temp.path(), "b_2", "<data><start>broken</data>");
        fs::create_dir_all(temp.path().join("instances/c_3")).unwrap();

        let report = run_conversion(
            temp.path(),
            "instances/*",
            &FlattenRules::default(),
            &options(),
        )
        .unwrap();

        assert_eq!(report.discovered, 3);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.status(), RunStatus::Partial);
        let kinds: Vec<&str> = report.failures.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec!["parse", "discovery"]);

        let tags = &report.rows[0].tags;
        assert_eq!(
            tags.iter().collect::<Vec<_>>(),
            vec![
                ("start", "2021-01-01"),
                ("lat", "12.34"),
                ("lon", "-56.78"),
                ("building", "yes")
            ]
        );

        let csv_path = report.primary_output().unwrap();
        assert!(csv_path.starts_with(temp.path()));
        let name = csv_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("a_") && name.ends_with(".csv"), "{}", name);
        let content = fs::read_to_string(csv_path).unwrap();
        assert!(content.starts_with("start,lat,lon,building"));
        assert_eq!(report.target.as_deref(), Some(csv_path));
    }

    #[test]
    fn test_nothing_converted_writes_nothing() {
        let temp = TempDir::new().unwrap();
        write_instance(temp.path(), "bad_1", "not xml at all <");

        let report = run_conversion(
            temp.path(),
            "instances/*",
            &FlattenRules::default(),
            &options(),
        )
        .unwrap();
        assert_eq!(report.status(), RunStatus::Failed);
        assert!(report.outputs.is_empty());
        assert!(report.target.is_none());
    }

    #[test]
    fn test_no_matches_is_error() {
        let temp = TempDir::new().unwrap();
        let err = run_conversion(
            temp.path(),
            "instances/*",
            &FlattenRules::default(),
            &options(),
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::NoInstances { .. }));
    }

    #[test]
    fn test_outputs_disabled_still_reports_target() {
        let temp = TempDir::new().unwrap();
        write_instance(temp.path(), "Form_1", GOOD);

        let report = run_conversion(
            temp.path(),
            "instances/Form_1",
            &FlattenRules::default(),
            &OutputOptions::default(),
        )
        .unwrap();
        assert_eq!(report.status(), RunStatus::Clean);
        assert!(report.outputs.is_empty());
        let target = report.target.unwrap();
        assert!(target.file_name().unwrap().to_string_lossy().starts_with("Form_"));
        assert!(!target.exists());
    }

    #[test]
    fn test_status_from_counts() {
        let mut report = RunReport::new("x");
        assert_eq!(report.status(), RunStatus::Failed);
        report.record_row(Path::new("a.xml"), TagMap::new());
        assert_eq!(report.status(), RunStatus::Clean);
        report.record_failure(
            Path::new("b.xml"),
            &InstanceError::Discovery(crate::scout::DiscoveryIssue::EmptyDirectory {
                dir: PathBuf::from("b"),
            }),
        );
        assert_eq!(report.status(), RunStatus::Partial);
    }
}
