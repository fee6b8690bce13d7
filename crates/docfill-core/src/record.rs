//! Records: the name → value mappings that fill one instance of a template.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DocfillError, Result};

/// A mapping from placeholder name to replacement text.
///
/// A record may omit names the template uses (those tokens stay literal) and may
/// carry names the template never mentions (they are ignored).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON object, coercing every value to text.
    ///
    /// Strings are taken verbatim, numbers and booleans use their JSON spelling,
    /// `null` becomes the empty string, and nested arrays or objects are kept as
    /// compact JSON.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            DocfillError::InputValidation("values must be a JSON object of name -> value".into())
        })?;

        let fields = object
            .iter()
            .map(|(key, value)| (key.clone(), coerce(value)))
            .collect();
        Ok(Self { fields })
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// True when `name` is missing or holds only whitespace.
    pub fn is_blank(&self, name: &str) -> bool {
        self.get(name).is_none_or(|v| v.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merge `other` into `self`; values from `other` win.
    pub fn extend(&mut self, other: Record) {
        self.fields.extend(other.fields);
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_coerces_values() {
        let record = Record::from_json(&json!({
            "name": "Ann",
            "balance": 10,
            "active": true,
            "note": null,
            "tags": ["a", "b"],
        }))
        .unwrap();

        assert_eq!(record.get("name"), Some("Ann"));
        assert_eq!(record.get("balance"), Some("10"));
        assert_eq!(record.get("active"), Some("true"));
        assert_eq!(record.get("note"), Some(""));
        assert_eq!(record.get("tags"), Some(r#"["a","b"]"#));
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let result = Record::from_json(&json!(["name", "Ann"]));
        assert!(matches!(result, Err(DocfillError::InputValidation(_))));
    }

    #[test]
    fn test_is_blank() {
        let record: Record = [("name", "  "), ("city", "Oslo")].into_iter().collect();
        assert!(record.is_blank("name"));
        assert!(record.is_blank("missing"));
        assert!(!record.is_blank("city"));
    }

    #[test]
    fn test_extend_overrides() {
        let mut base: Record = [("name", "Ann"), ("city", "Oslo")].into_iter().collect();
        base.extend([("city", "Bergen")].into_iter().collect());
        assert_eq!(base.get("city"), Some("Bergen"));
        assert_eq!(base.len(), 2);
    }
}
