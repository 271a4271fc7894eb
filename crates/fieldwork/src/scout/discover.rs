//! Locate instance files from a directory or glob specification.
//!
//! ODK Collect keeps every submission in its own directory:
//! `instances/<Form>_<timestamp>/<Form>_<timestamp>.xml`, next to any
//! media captured with it.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::{DiscoveryIssue, Result, ScoutError};
use super::patterns::{anchor_pattern, is_glob_pattern};

const INSTANCE_EXTENSION: &str = "xml";

/// Outcome of discovery: one entry per instance directory, in path order.
#[derive(Debug, Default)]
pub struct Discovery {
    pub instance_spec: String,
    pub entries: Vec<std::result::Result<PathBuf, DiscoveryIssue>>,
}

impl Discovery {
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .filter_map(|e| e.as_ref().ok().map(PathBuf::as_path))
    }

    pub fn issues(&self) -> impl Iterator<Item = &DiscoveryIssue> {
        self.entries.iter().filter_map(|e| e.as_ref().err())
    }

    /// First instance file found; output names derive from it.
    pub fn first_file(&self) -> Option<&Path> {
        self.files().next()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Discover instances relative to the current directory.
pub fn discover_instances(instance_spec: &str) -> Result<Discovery> {
    let cwd = std::env::current_dir()?;
    discover_instances_in(&cwd, instance_spec)
}

/// Discover instances with relative specifications resolved against `base`.
///
/// - A glob selects every matching directory; each contributes its
///   instance file (see [`instance_file_in`]). Matches that are not
///   directories are ignored.
/// - A directory `dir` holds its instance at `dir/<basename(dir)>.xml`.
/// - A regular file is taken as the instance itself.
pub fn discover_instances_in(base: &Path, instance_spec: &str) -> Result<Discovery> {
    let entries = if is_glob_pattern(instance_spec) {
        discover_glob(base, instance_spec)?
    } else {
        vec![discover_single(&base.join(instance_spec))?]
    };

    Ok(Discovery {
        instance_spec: instance_spec.to_string(),
        entries,
    })
}

fn discover_glob(
    base: &Path,
    instance_spec: &str,
) -> Result<Vec<std::result::Result<PathBuf, DiscoveryIssue>>> {
    let pattern = anchor_pattern(base, instance_spec);
    let paths = glob::glob(&pattern).map_err(|e| ScoutError::InvalidPattern {
        pattern: instance_spec.to_string(),
        message: e.msg.to_string(),
    })?;

    let mut matched = Vec::new();
    let mut issues = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_dir() => matched.push(path),
            Ok(path) => debug!("Ignoring non-directory match: {}", path.display()),
            Err(err) => issues.push(DiscoveryIssue::Unreadable {
                path: err.path().to_path_buf(),
                message: err.error().to_string(),
            }),
        }
    }
    matched.sort();
    debug!("Pattern {} matched {} directories", pattern, matched.len());

    let mut entries: Vec<_> = matched.iter().map(|dir| instance_file_in(dir)).collect();
    entries.extend(issues.into_iter().map(Err));
    Ok(entries)
}

fn discover_single(path: &Path) -> Result<std::result::Result<PathBuf, DiscoveryIssue>> {
    if path.is_file() {
        return Ok(Ok(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(ScoutError::NotFound(path.to_path_buf()));
    }

    let expected = expected_instance_path(path)?;
    if expected.is_file() {
        Ok(Ok(expected))
    } else {
        Ok(Err(DiscoveryIssue::MissingFile { path: expected }))
    }
}

/// `dir/<basename(dir)>.xml`
pub fn expected_instance_path(dir: &Path) -> Result<PathBuf> {
    let name = match dir.file_name() {
        Some(name) => name.to_os_string(),
        None => dir
            .canonicalize()?
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| ScoutError::NotFound(dir.to_path_buf()))?,
    };
    let mut file_name = name;
    file_name.push(".");
    file_name.push(INSTANCE_EXTENSION);
    Ok(dir.join(file_name))
}

/// The instance file of a directory: the lexicographically first `.xml`
/// file, else the first visible file of any kind.
pub fn instance_file_in(dir: &Path) -> std::result::Result<PathBuf, DiscoveryIssue> {
    let read = fs::read_dir(dir).map_err(|e| DiscoveryIssue::Unreadable {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = read
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && !is_hidden(path))
        .collect();
    files.sort();

    let xml = files.iter().find(|path| {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(INSTANCE_EXTENSION))
    });

    match xml.or_else(|| files.first()) {
        Some(path) => Ok(path.clone()),
        None => Err(DiscoveryIssue::EmptyDirectory {
            dir: dir.to_path_buf(),
        }),
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}
