//! Scout - Instance Discovery
//!
//! Scout turns an `--instance` specification (directory, file or glob)
//! into the list of instance files to convert, recording per-directory
//! problems instead of failing the run.

pub mod discover;
pub mod error;
pub mod patterns;

pub use discover::{
    discover_instances, discover_instances_in, expected_instance_path, instance_file_in,
    Discovery,
};
pub use error::{DiscoveryIssue, ScoutError};
pub use patterns::{anchor_pattern, is_glob_pattern};
