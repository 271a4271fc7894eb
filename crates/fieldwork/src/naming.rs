//! Output file naming.
//!
//! Names derive from the first instance file: `Form_2021-01-01_10-00-00.xml`
//! becomes `Form_<year>_<hour>_<minute>.csv`. The timestamp has no
//! month, day or seconds, so runs in the same hour and minute on
//! different days produce the same name.

use chrono::{Datelike, Local, Timelike};
use std::path::Path;

/// Stem used when the instance name yields nothing usable.
pub const FALLBACK_STEM: &str = "instances";

/// First underscore-separated segment of the basename, spaces removed.
///
/// A basename without underscores is used whole, extension included.
pub fn output_stem(instance: &Path) -> String {
    let base = instance
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let compact: String = base.chars().filter(|c| *c != ' ').collect();
    match compact.split('_').next() {
        Some(first) if !first.is_empty() => first.to_string(),
        _ => FALLBACK_STEM.to_string(),
    }
}

/// `_<year>_<hour>_<minute>`, not zero-padded.
pub fn timestamp_suffix<T: Datelike + Timelike>(at: &T) -> String {
    format!("_{}_{}_{}", at.year(), at.hour(), at.minute())
}

pub fn output_filename_at<T: Datelike + Timelike>(
    instance: &Path,
    extension: &str,
    at: &T,
) -> String {
    format!("{}{}.{}", output_stem(instance), timestamp_suffix(at), extension)
}

/// Output filename stamped with the local time now.
pub fn output_filename(instance: &Path, extension: &str) -> String {
    output_filename_at(instance, extension, &Local::now())
}
