//! Glob detection and anchoring for instance specifications.

use std::path::Path;

const GLOB_CHARS: &[char] = &['*', '?', '['];

/// An instance specification is a glob when it carries a wildcard.
pub fn is_glob_pattern(instance_spec: &str) -> bool {
    instance_spec.contains(GLOB_CHARS)
}

/// Anchor a relative pattern at `base`. The base is escaped so directory
/// names with glob characters match literally.
///
/// Rules:
/// - Absolute patterns are returned unchanged
/// - A leading `./` is dropped before joining
pub fn anchor_pattern(base: &Path, pattern: &str) -> String {
    if Path::new(pattern).is_absolute() {
        return pattern.to_string();
    }
    let relative = pattern.trim_start_matches("./");
    let escaped = glob::Pattern::escape(&base.to_string_lossy());
    if escaped.ends_with('/') {
        format!("{}{}", escaped, relative)
    } else {
        format!("{}/{}", escaped, relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_wildcards() {
        assert!(is_glob_pattern("instances/*"));
        assert!(is_glob_pattern("site?"));
        assert!(is_glob_pattern("site[12]"));
        assert!(!is_glob_pattern("instances/site1"));
        assert!(!is_glob_pattern(""));
    }

    #[test]
    fn anchors_relative_patterns() {
        assert_eq!(anchor_pattern(Path::new("/work"), "inst/*"), "/work/inst/*");
        assert_eq!(anchor_pattern(Path::new("/work/"), "./inst/*"), "/work/inst/*");
        assert_eq!(anchor_pattern(Path::new("/work"), "/abs/*"), "/abs/*");
    }

    #[test]
    fn escapes_base_directory() {
        assert_eq!(
            anchor_pattern(Path::new("/data/[2021]"), "*"),
            "/data/[[]2021[]]/*"
        );
    }
}
