//! Encyclopedia (wiki) records
//!
//! Raw records as produced by the extraction, the consolidator that turns
//! them into canonical records, and the typed per-movie view used by the
//! merge.

pub mod consolidator;
pub mod fields;

use crate::error::{EtlError, EtlResult, Stage};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

pub use consolidator::{
    consolidate, filter_films, CanonicalWikiRecord, ConsolidatedWiki, ConsolidationStats, WikiTable,
};
pub use fields::{parse_wiki_table, WikiMovie};

/// Field value in a raw record
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    List(Vec<String>),
    /// Nested mapping (`alt_titles`)
    Map(BTreeMap<String, RawValue>),
}

impl RawValue {
    /// Convert a JSON value; `null` has no representation
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(RawValue::Text(s)),
            Value::Array(items) => Some(RawValue::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            Value::Object(map) => Some(RawValue::Map(
                map.into_iter()
                    .filter_map(|(k, v)| RawValue::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
            other => Some(RawValue::Text(other.to_string())),
        }
    }

    /// Text for the grammars: lists are joined with spaces, maps are not text
    pub fn joined_text(&self) -> Option<Cow<'_, str>> {
        match self {
            RawValue::Text(s) => Some(Cow::Borrowed(s)),
            RawValue::List(items) => Some(Cow::Owned(items.join(" "))),
            RawValue::Map(_) => None,
        }
    }

    /// Rendering stored in an output column
    ///
    /// Text is stored as-is; lists and maps are stored as JSON.
    pub fn to_column_text(&self) -> String {
        match self {
            RawValue::Text(s) => s.clone(),
            other => to_json(other).to_string(),
        }
    }
}

fn to_json(value: &RawValue) -> Value {
    match value {
        RawValue::Text(s) => Value::String(s.clone()),
        RawValue::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
        RawValue::Map(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
    }
}

/// Mapping from free-text field name to value; absent keys are nulls
pub type RawRecord = BTreeMap<String, RawValue>;

/// IMDb title identifier: `tt` followed by exactly 7 digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImdbId(String);

impl ImdbId {
    /// Validate a bare identifier
    pub fn parse(s: &str) -> Option<Self> {
        let digits = s.strip_prefix("tt")?;
        if digits.len() == 7 && digits.bytes().all(|b| b.is_ascii_digit()) {
            Some(ImdbId(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImdbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read the encyclopedia extraction (a JSON array of objects)
///
/// Elements that are not objects are skipped with a warning.
pub fn load_wiki_records(path: &Path) -> EtlResult<Vec<RawRecord>> {
    let content = std::fs::read_to_string(path).map_err(|source| EtlError::Read {
        stage: Stage::LoadWiki,
        path: path.to_path_buf(),
        source,
    })?;
    parse_wiki_json(&content)
}

/// Parse the encyclopedia extraction from a string
pub fn parse_wiki_json(content: &str) -> EtlResult<Vec<RawRecord>> {
    let document: Value = serde_json::from_str(content).map_err(|e| EtlError::Format {
        stage: Stage::LoadWiki,
        what: "wiki JSON",
        message: e.to_string(),
    })?;

    let Value::Array(items) = document else {
        return Err(EtlError::Format {
            stage: Stage::LoadWiki,
            what: "wiki JSON",
            message: "top-level value is not an array".to_string(),
        });
    };

    let total = items.len();
    let mut records = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => records.push(
                map.into_iter()
                    .filter_map(|(k, v)| RawValue::from_json(v).map(|v| (k, v)))
                    .collect(),
            ),
            other => warn!(index, kind = json_kind(&other), "Skipping non-object wiki entry"),
        }
    }

    info!(records = records.len(), skipped = total - records.len(), "Loaded wiki records");
    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_variants() {
        assert_eq!(RawValue::from_json(json!(null)), None);
        assert_eq!(
            RawValue::from_json(json!("Ridley Scott")),
            Some(RawValue::Text("Ridley Scott".into()))
        );
        assert_eq!(
            RawValue::from_json(json!(["a", 2])),
            Some(RawValue::List(vec!["a".into(), "2".into()]))
        );
        assert_eq!(RawValue::from_json(json!(1990)), Some(RawValue::Text("1990".into())));
    }

    #[test]
    fn test_joined_text() {
        let list = RawValue::List(vec!["$12 million".into(), "(estimated)".into()]);
        assert_eq!(list.joined_text().unwrap(), "$12 million (estimated)");
        assert!(RawValue::Map(BTreeMap::new()).joined_text().is_none());
    }

    #[test]
    fn test_column_text() {
        assert_eq!(RawValue::Text("x".into()).to_column_text(), "x");
        assert_eq!(
            RawValue::List(vec!["a".into(), "b".into()]).to_column_text(),
            r#"["a","b"]"#
        );
    }

    #[test]
    fn test_imdb_id_format() {
        assert!(ImdbId::parse("tt0111161").is_some());
        assert!(ImdbId::parse("tt011116").is_none());
        assert!(ImdbId::parse("nm0111161").is_none());
        assert!(ImdbId::parse("tt01111a1").is_none());
    }

    #[test]
    fn test_parse_wiki_json() {
        let records = parse_wiki_json(
            r#"[{"title": "Alien", "Directed by": "Ridley Scott", "Budget": null}, 42]"#,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].contains_key("Budget"));
        assert_eq!(records[0]["title"], RawValue::Text("Alien".into()));
    }

    #[test]
    fn test_parse_wiki_json_rejects_non_array() {
        let err = parse_wiki_json(r#"{"title": "Alien"}"#).unwrap_err();
        assert_eq!(err.stage(), Stage::LoadWiki);
    }
}
