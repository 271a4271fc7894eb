//! fieldwork - ODK Collect instances to OSM tags
//!
//! Reads survey instance documents, flattens each into one row of
//! OSM-style tags, and writes the rows as CSV (and optionally GeoJSON).

pub mod config;
pub mod convert;
pub mod instance;
pub mod naming;
pub mod scout;

pub use config::FieldworkConfig;
pub use convert::{run_conversion, ConvertError, OutputOptions, RunReport, RunStatus};
pub use fieldwork_sinks as sinks;
pub use instance::{flatten_bytes, FlattenRules, InstanceError, TagMap};
