use serde::ser::{Serialize, SerializeMap, Serializer};

/// Flattened OSM-style tags for one instance.
///
/// Keeps insertion order; re-inserting a key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    entries: Vec<(String, String)>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a tag. Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Rows in the shape the sinks consume.
    pub fn as_pairs(&self) -> &[(String, String)] {
        &self.entries
    }
}

impl Serialize for TagMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = TagMap::new();
        for (k, v) in iter {
            tags.insert(k, v);
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins_in_place() {
        let mut tags = TagMap::new();
        tags.insert("lat", "12.34");
        tags.insert("start", "2021-01-01");
        assert_eq!(tags.insert("lat", "1.0"), Some("12.34".to_string()));

        assert_eq!(tags.keys().collect::<Vec<_>>(), vec!["lat", "start"]);
        assert_eq!(tags.get("lat"), Some("1.0"));
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_serializes_as_ordered_object() {
        let tags: TagMap = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(serde_json::to_string(&tags).unwrap(), r#"{"b":"2","a":"1"}"#);
    }
}
