//! Flatten an instance document into one row of tags.
//!
//! Forms nest at most two levels of groups under the `data` root. Fields
//! at every level land in one flat [`TagMap`] keyed by their own name, so
//! field names must be unique across a form; a later field silently
//! replaces an earlier one with the same name.

use thiserror::Error;
use tracing::debug;

use super::document::{Document, XmlValue, ATTRIBUTE_PREFIX, TEXT_KEY};
use super::gps::GpsFix;
use super::tags::TagMap;

/// Root element every instance is expected to have.
pub const DATA_ROOT: &str = "data";

/// Levels of nesting traversed: form fields, groups, nested groups.
pub const MAX_DEPTH: usize = 3;

/// Top-level fields never copied: `meta` bookkeeping and the `warmup`
/// calibration fix.
pub const ALWAYS_SKIPPED: [&str; 2] = ["meta", "warmup"];

pub const LAT_TAG: &str = "lat";
pub const LON_TAG: &str = "lon";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlattenError {
    #[error("instance root is <{found}>, expected <{}>", DATA_ROOT)]
    MissingDataRoot { found: String },

    #[error("<{}> holds {found} instead of form fields", DATA_ROOT)]
    DataNotMapping { found: &'static str },

    #[error("<{}> holds no form fields", DATA_ROOT)]
    NoFields,

    #[error("unexpected {shape} at '{path}'")]
    SchemaSurprise { path: String, shape: String },
}

/// Top-level fields dropped before flattening.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenRules {
    /// Dropped regardless of shape, on top of [`ALWAYS_SKIPPED`].
    pub skip_fields: Vec<String>,
}

impl FlattenRules {
    pub fn skips(&self, name: &str) -> bool {
        ALWAYS_SKIPPED.contains(&name) || self.skip_fields.iter().any(|f| f == name)
    }
}

/// Flatten a parsed document into tags.
pub fn flatten_document(doc: &Document, rules: &FlattenRules) -> Result<TagMap, FlattenError> {
    if doc.root_name != DATA_ROOT {
        return Err(FlattenError::MissingDataRoot {
            found: doc.root_name.clone(),
        });
    }
    let fields = match &doc.root {
        XmlValue::Mapping(fields) => fields,
        other => {
            return Err(FlattenError::DataNotMapping {
                found: other.shape(),
            })
        }
    };

    let has_fields = fields
        .iter()
        .any(|(name, _)| !name.starts_with(ATTRIBUTE_PREFIX) && name != TEXT_KEY);
    if !has_fields {
        return Err(FlattenError::NoFields);
    }

    let mut tags = TagMap::new();
    let mut path = Vec::new();
    flatten_level(fields, 0, &mut path, rules, &mut tags)?;
    debug!("Flattened {} fields into {} tags", fields.len(), tags.len());
    Ok(tags)
}

fn flatten_level(
    fields: &[(String, XmlValue)],
    depth: usize,
    path: &mut Vec<String>,
    rules: &FlattenRules,
    tags: &mut TagMap,
) -> Result<(), FlattenError> {
    let top = depth == 0;
    // Leaves of the innermost group are copied verbatim, GPS strings included
    let innermost = depth + 1 == MAX_DEPTH;

    for (name, value) in fields {
        if top && rules.skips(name) {
            continue;
        }
        match value {
            XmlValue::Null => {}
            XmlValue::Text(text) => {
                if !innermost {
                    if let Some(fix) = GpsFix::parse(text) {
                        tags.insert(LAT_TAG, fix.lat);
                        tags.insert(LON_TAG, fix.lon);
                        continue;
                    }
                }
                if top && name.starts_with(ATTRIBUTE_PREFIX) {
                    continue;
                }
                tags.insert(name.clone(), text.clone());
            }
            XmlValue::Mapping(children) => {
                if innermost {
                    return Err(surprise(path, name, "group nested deeper than two levels"));
                }
                path.push(name.clone());
                flatten_level(children, depth + 1, path, rules, tags)?;
                path.pop();
            }
            XmlValue::List(items) => {
                return Err(surprise(
                    path,
                    name,
                    &format!("repeated element ({} occurrences)", items.len()),
                ));
            }
        }
    }
    Ok(())
}

fn surprise(path: &[String], name: &str, shape: &str) -> FlattenError {
    let mut full: Vec<&str> = path.iter().map(String::as_str).collect();
    full.push(name);
    FlattenError::SchemaSurprise {
        path: full.join("/"),
        shape: shape.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> XmlValue {
        XmlValue::Text(s.to_string())
    }

    fn map(fields: Vec<(&str, XmlValue)>) -> XmlValue {
        XmlValue::Mapping(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn data(fields: Vec<(&str, XmlValue)>) -> Document {
        Document {
            root_name: DATA_ROOT.to_string(),
            root: map(fields),
        }
    }

    fn pairs(tags: &TagMap) -> Vec<(&str, &str)> {
        tags.iter().collect()
    }

    #[test]
    fn test_reference_scenario() {
        let doc = data(vec![
            ("meta", text("x")),
            ("warmup", text("1.0 2.0 3.0 4.0")),
            ("start", text("2021-01-01")),
            ("gps", text("12.34 -56.78 10.0 5.0")),
            (
                "group",
                map(vec![("age", text("30")), ("loc", text("1.0 2.0 3.0 4.0"))]),
            ),
        ]);
        let tags = flatten_document(&doc, &FlattenRules::default()).unwrap();
        assert_eq!(
            pairs(&tags),
            vec![("start", "2021-01-01"), ("lat", "1.0"), ("lon", "2.0"), ("age", "30")]
        );
    }

    #[test]
    fn test_warmup_dropped_regardless_of_shape() {
        let doc = data(vec![
            ("warmup", text("not a fix")),
            ("name", text("clinic")),
        ]);
        let tags = flatten_document(&doc, &FlattenRules::default()).unwrap();
        assert_eq!(pairs(&tags), vec![("name", "clinic")]);

        let doc = data(vec![("warmup", map(vec![("inner", text("v"))]))]);
        assert!(flatten_document(&doc, &FlattenRules::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_top_level_attributes_dropped_nested_kept() {
        let doc = data(vec![
            ("@id", text("buildings")),
            ("@version", text("3")),
            ("group", map(vec![("@relevant", text("yes")), ("roof", text("tin"))])),
        ]);
        let tags = flatten_document(&doc, &FlattenRules::default()).unwrap();
        assert_eq!(pairs(&tags), vec![("@relevant", "yes"), ("roof", "tin")]);
    }

    #[test]
    fn test_two_levels_flatten_to_innermost_keys() {
        let doc = data(vec![(
            "survey",
            map(vec![
                ("building", text("yes")),
                (
                    "details",
                    map(vec![
                        ("levels", text("2")),
                        ("empty", XmlValue::Null),
                        ("point", text("1 2 3 4")),
                    ]),
                ),
            ]),
        )]);
        let tags = flatten_document(&doc, &FlattenRules::default()).unwrap();
        // Innermost leaves are copied as-is, no lat/lon split
        assert_eq!(
            pairs(&tags),
            vec![("building", "yes"), ("levels", "2"), ("point", "1 2 3 4")]
        );
    }

    #[test]
    fn test_inner_gps_sets_coordinates() {
        let doc = data(vec![("where", map(vec![("fix", text("-1.5 2.5 0 3"))]))]);
        let tags = flatten_document(&doc, &FlattenRules::default()).unwrap();
        assert_eq!(tags.get(LAT_TAG), Some("-1.5"));
        assert_eq!(tags.get(LON_TAG), Some("2.5"));
        assert!(!tags.contains_key("fix"));
    }

    #[test]
    fn test_null_fields_skipped() {
        let doc = data(vec![
            ("a", XmlValue::Null),
            ("g", map(vec![("b", XmlValue::Null)])),
        ]);
        assert!(flatten_document(&doc, &FlattenRules::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_too_deep_is_schema_surprise() {
        let doc = data(vec![(
            "a",
            map(vec![("b", map(vec![("c", map(vec![("d", text("x"))]))]))]),
        )]);
        let err = flatten_document(&doc, &FlattenRules::default()).unwrap_err();
        assert_eq!(
            err,
            FlattenError::SchemaSurprise {
                path: "a/b/c".to_string(),
                shape: "group nested deeper than two levels".to_string(),
            }
        );
    }

    #[test]
    fn test_repeat_group_is_schema_surprise() {
        let doc = data(vec![(
            "household",
            map(vec![("member", XmlValue::List(vec![text("a"), text("b")]))]),
        )]);
        let err = flatten_document(&doc, &FlattenRules::default()).unwrap_err();
        assert!(matches!(err, FlattenError::SchemaSurprise { ref path, .. } if path == "household/member"));
    }

    #[test]
    fn test_wrong_root_rejected() {
        let doc = Document {
            root_name: "html".to_string(),
            root: map(vec![]),
        };
        assert_eq!(
            flatten_document(&doc, &FlattenRules::default()).unwrap_err(),
            FlattenError::MissingDataRoot {
                found: "html".to_string()
            }
        );
    }

    #[test]
    fn test_text_data_root_rejected() {
        let doc = Document {
            root_name: DATA_ROOT.to_string(),
            root: text("just text"),
        };
        assert_eq!(
            flatten_document(&doc, &FlattenRules::default()).unwrap_err(),
            FlattenError::DataNotMapping { found: "text" }
        );
    }

    #[test]
    fn test_custom_skip_fields() {
        let rules = FlattenRules {
            skip_fields: vec!["deviceid".to_string()],
        };
        let doc = data(vec![
            ("warmup", text("9.0 9.0 9.0 9.0")),
            ("deviceid", text("abc")),
            ("meta", text("m")),
            ("name", text("a")),
        ]);
        let tags = flatten_document(&doc, &rules).unwrap();
        assert_eq!(pairs(&tags), vec![("name", "a")]);
        assert!(!tags.contains_key(LAT_TAG));
    }

    #[test]
    fn test_attributes_only_root_rejected() {
        let doc = data(vec![("@id", text("x")), ("@version", text("1"))]);
        assert_eq!(
            flatten_document(&doc, &FlattenRules::default()).unwrap_err(),
            FlattenError::NoFields
        );
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let doc = data(vec![
            ("start", text("2021")),
            ("g", map(vec![("x", text("1")), ("h", map(vec![("y", text("2"))]))])),
        ]);
        let rules = FlattenRules::default();
        assert_eq!(
            flatten_document(&doc, &rules).unwrap(),
            flatten_document(&doc, &rules).unwrap()
        );
    }
}
