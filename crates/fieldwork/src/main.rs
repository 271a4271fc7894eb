//! odk2osm
//!
//! Converts ODK Collect instance files into a CSV of OSM-style tags, one
//! row per submission.

use clap::Parser;
use fieldwork_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

mod cli;

#[derive(Parser, Debug)]
#[command(
    name = "odk2osm",
    version,
    about = "Convert ODK XML instance files to OSM tag rows"
)]
struct Cli {
    /// The instance directory, instance file, or glob of instance directories
    #[arg(short = 'i', long)]
    instance: String,

    /// Enable verbose output (debug logs to stdout); the level is optional
    #[arg(
        short = 'v',
        long,
        num_args = 0..=1,
        default_missing_value = "1",
        value_name = "LEVEL"
    )]
    verbose: Option<String>,

    /// Write the CSV here instead of a derived name
    #[arg(short = 'o', long)]
    outfile: Option<PathBuf>,

    /// Directory for derived output names
    #[arg(long, env = "FIELDWORK_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(long, env = "FIELDWORK_CONFIG")]
    config: Option<PathBuf>,

    /// Convert and report, but do not write the CSV
    #[arg(long)]
    no_csv: bool,

    /// Also write a GeoJSON FeatureCollection next to the CSV
    #[arg(long)]
    geojson: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn convert_args(&self) -> cli::convert::ConvertArgs {
        cli::convert::ConvertArgs {
            instance: self.instance.clone(),
            outfile: self.outfile.clone(),
            output_dir: self.output_dir.clone(),
            config: self.config.clone(),
            no_csv: self.no_csv,
            geojson: self.geojson,
            json: self.json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = cli.json;

    let _log_guard = match init_logging(LogConfig {
        app_name: "odk2osm",
        verbose: cli.verbose.is_some(),
        log_file: cli.log_file.as_deref(),
        json_mode,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };
    if let Some(level) = &cli.verbose {
        debug!("Verbose output enabled (level {})", level);
    }

    match cli::convert::run(cli.convert_args()) {
        Ok(status) => cli::convert::exit_code(status),
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
