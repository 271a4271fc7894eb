//! Error types for instance discovery

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Discovery error that stops the whole run.
#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),
}

/// Discovery problem with a single instance directory. The run continues.
#[derive(Error, Debug, Clone)]
pub enum DiscoveryIssue {
    #[error("instance file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("no instance file in directory: {}", dir.display())]
    EmptyDirectory { dir: PathBuf },

    #[error("cannot list {}: {message}", path.display())]
    Unreadable { path: PathBuf, message: String },
}

impl DiscoveryIssue {
    /// The file or directory the issue is about.
    pub fn path(&self) -> &Path {
        match self {
            DiscoveryIssue::MissingFile { path } => path,
            DiscoveryIssue::EmptyDirectory { dir } => dir,
            DiscoveryIssue::Unreadable { path, .. } => path,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ScoutError>;
