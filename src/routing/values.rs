//! Route values extracted during matching.
//!
//! # Design Decisions
//! - Insertion ordered, so values come out in template order
//! - Keys compare ASCII case-insensitively, like parameter names
//! - Backed by a small vector; patterns rarely carry more than a handful

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Ordered mapping from parameter name to extracted (or default) value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteValues {
    entries: Vec<(String, String)>,
}

impl RouteValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Look up a value by parameter name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert a value, replacing any existing value for the same name.
    /// The original position of a replaced key is kept.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for RouteValues
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = RouteValues::new();
        for (key, value) in iter {
            values.insert(key, value);
        }
        values
    }
}

impl Serialize for RouteValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut values = RouteValues::new();
        values.insert("Controller", "Home");

        assert_eq!(values.get("controller"), Some("Home"));
        assert_eq!(values.get("CONTROLLER"), Some("Home"));
        assert!(values.get("action").is_none());
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut values: RouteValues = [("a", "1"), ("b", "2")].into_iter().collect();
        values.insert("A", "3");

        let collected: Vec<_> = values.iter().collect();
        assert_eq!(collected, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_serializes_as_ordered_map() {
        let values: RouteValues = [("id", "42"), ("slug", "hello")].into_iter().collect();
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"{"id":"42","slug":"hello"}"#);
    }
}
