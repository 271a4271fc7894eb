//! Convert command: instance files to an OSM tag CSV
//!
//! Settings merge in order: built-in defaults, config file, environment,
//! command-line flags.

use crate::cli::error::HelpfulError;
use crate::cli::output::{display_path, pluralize, print_table};
use anyhow::Context;
use fieldwork::convert::{run_conversion, ConvertError, OutputOptions, RunReport, RunStatus};
use fieldwork::scout::ScoutError;
use fieldwork::FieldworkConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

/// Arguments for the convert command
#[derive(Debug, Clone, Default)]
pub struct ConvertArgs {
    pub instance: String,
    pub outfile: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub no_csv: bool,
    pub geojson: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    status: RunStatus,
    #[serde(flatten)]
    report: &'a RunReport,
}

/// Merge config and flags into output options.
pub fn output_options(args: &ConvertArgs, config: &FieldworkConfig) -> OutputOptions {
    OutputOptions {
        outfile: args.outfile.clone(),
        output_dir: args.output_dir.clone().or_else(|| config.output_dir.clone()),
        write_csv: config.write_csv && !args.no_csv,
        write_geojson: config.write_geojson || args.geojson,
    }
}

/// Process exit status for a finished run.
pub fn exit_status(status: RunStatus) -> u8 {
    match status {
        RunStatus::Clean => 0,
        RunStatus::Partial => 2,
        RunStatus::Failed => 1,
    }
}

pub fn exit_code(status: RunStatus) -> ExitCode {
    ExitCode::from(exit_status(status))
}

/// Execute the convert command
pub fn run(args: ConvertArgs) -> anyhow::Result<RunStatus> {
    let config = match &args.config {
        Some(path) => FieldworkConfig::load(path)
            .map_err(|e| HelpfulError::invalid_config(path, &e.to_string()))?,
        None => FieldworkConfig::default(),
    };
    let options = output_options(&args, &config);
    let base = std::env::current_dir().context("Failed to resolve current directory")?;

    info!("Converting instances from {}", args.instance);
    let report = match run_conversion(&base, &args.instance, &config.flatten_rules(), &options) {
        Ok(report) => report,
        Err(err) => return Err(helpful_convert_error(&base, err)),
    };

    if args.json {
        let payload = JsonReport {
            status: report.status(),
            report: &report,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_summary(&report, &base);
        if report.status() == RunStatus::Failed {
            eprint!("{}", HelpfulError::nothing_converted(report.discovered));
        }
    }

    Ok(report.status())
}

fn helpful_convert_error(base: &Path, err: ConvertError) -> anyhow::Error {
    match err {
        ConvertError::Scout(ScoutError::NotFound(path)) => {
            HelpfulError::instance_not_found(&path).into()
        }
        ConvertError::Scout(ScoutError::InvalidPattern { pattern, message }) => {
            HelpfulError::invalid_pattern(&pattern, &message).into()
        }
        ConvertError::NoInstances { instance_spec } => {
            HelpfulError::no_instances(&instance_spec).into()
        }
        ConvertError::Sink(err) => HelpfulError::cannot_write_output(&err.to_string()).into(),
        other => anyhow::Error::new(other)
            .context(format!("Conversion failed in {}", base.display())),
    }
}

/// `Wrote:` lines for written outputs, or `Would write:` for the CSV
/// target when nothing was written. Paths are shown relative to `base`.
fn output_lines(report: &RunReport, base: &Path) -> Vec<String> {
    if report.outputs.is_empty() {
        return report
            .target
            .iter()
            .map(|target| format!("Would write: {}", display_path(target, base)))
            .collect();
    }
    report
        .outputs
        .iter()
        .map(|output| format!("Wrote: {}", display_path(output, base)))
        .collect()
}

fn print_summary(report: &RunReport, base: &Path) {
    for line in output_lines(report, base) {
        println!("{}", line);
    }

    if report.failures.is_empty() {
        return;
    }

    println!();
    println!(
        "{} of {} failed:",
        pluralize(report.failures.len(), "instance"),
        report.discovered
    );
    let rows = report
        .failures
        .iter()
        .map(|f| {
            vec![
                display_path(&f.source, base),
                f.kind.to_string(),
                f.message.clone(),
            ]
        })
        .collect();
    print_table(&["Instance", "Kind", "Reason"], rows);
}
