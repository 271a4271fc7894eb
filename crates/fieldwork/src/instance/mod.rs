//! Instance documents: parsing and flattening into tag rows.

pub mod document;
pub mod flatten;
pub mod gps;
pub mod tags;

pub use document::{parse_document, Document, DocumentError, XmlValue};
pub use flatten::{flatten_document, FlattenError, FlattenRules, MAX_DEPTH};
pub use gps::{is_gps_fix, GpsFix};
pub use tags::TagMap;

use crate::scout::DiscoveryIssue;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why one instance could not be converted. Never fatal to a batch.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryIssue),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse instance: {0}")]
    Parse(#[from] DocumentError),

    #[error("{0}")]
    Flatten(#[from] FlattenError),
}

impl InstanceError {
    /// Category name used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            InstanceError::Discovery(_) => "discovery",
            InstanceError::Read { .. } => "read",
            InstanceError::Parse(_) => "parse",
            InstanceError::Flatten(FlattenError::SchemaSurprise { .. }) => "schema",
            InstanceError::Flatten(_) => "parse",
        }
    }
}

/// Parse and flatten raw instance bytes.
pub fn flatten_bytes(bytes: &[u8], rules: &FlattenRules) -> Result<TagMap, InstanceError> {
    let doc = parse_document(bytes)?;
    Ok(flatten_document(&doc, rules)?)
}

/// Read one instance file and flatten it.
pub fn read_instance(path: &Path, rules: &FlattenRules) -> Result<TagMap, InstanceError> {
    // Instances are small, read the whole file
    let bytes = std::fs::read(path).map_err(|source| InstanceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    flatten_bytes(&bytes, rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_bytes() {
        let xml = br#"<data id="f"><start>2021-01-01</start><gps>1 2 3 4</gps></data>"#;
        let tags = flatten_bytes(xml, &FlattenRules::default()).unwrap();
        assert_eq!(
            tags.iter().collect::<Vec<_>>(),
            vec![("start", "2021-01-01"), ("lat", "1"), ("lon", "2")]
        );
    }

    #[test]
    fn test_error_kinds() {
        let rules = FlattenRules::default();
        assert_eq!(flatten_bytes(b"<data>", &rules).unwrap_err().kind(), "parse");
        assert_eq!(flatten_bytes(b"<form/>", &rules).unwrap_err().kind(), "parse");
        assert_eq!(
            flatten_bytes(br#"<data id="x"></data>"#, &rules).unwrap_err().kind(),
            "parse"
        );
        assert_eq!(
            flatten_bytes(b"<data><r>1</r><r>2</r></data>", &rules)
                .unwrap_err()
                .kind(),
            "schema"
        );
        let missing = read_instance(Path::new("/nonexistent/instance.xml"), &rules).unwrap_err();
        assert_eq!(missing.kind(), "read");
    }
}
