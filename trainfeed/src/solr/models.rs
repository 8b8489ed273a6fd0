//! Solr `/select` response model (`wt=json`).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Name of the header param carrying the next cursor token.
pub const NEXT_CURSOR_PARAM: &str = "nextCursorMark";

/// The `responseHeader` block: query metadata and echoed params.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseHeader {
    #[serde(default)]
    pub status: i64,
    #[serde(rename = "QTime", default)]
    pub qtime: i64,
    #[serde(default)]
    pub params: HashMap<String, Value>,
}

impl ResponseHeader {
    /// A param as text. Repeated params echo as arrays; the last one wins.
    pub fn param(&self, name: &str) -> Option<&str> {
        match self.params.get(name)? {
            Value::String(s) => Some(s),
            Value::Array(values) => values.last()?.as_str(),
            _ => None,
        }
    }
}

/// The `response` block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    #[serde(rename = "numFound", default)]
    pub num_found: u64,
    #[serde(default)]
    pub start: u64,
    #[serde(rename = "numFoundExact", default)]
    pub num_found_exact: bool,
    #[serde(default)]
    pub docs: Vec<SolrDocument>,
}

/// A single result document. Only the text fields are typed; the rest of the
/// schema is kept as raw JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolrDocument {
    #[serde(default, deserialize_with = "de_text")]
    pub id: String,
    #[serde(default, deserialize_with = "de_text")]
    pub title: String,
    #[serde(default, deserialize_with = "de_text")]
    pub url: String,
    #[serde(default, deserialize_with = "de_text")]
    pub content: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolrResponse {
    #[serde(rename = "responseHeader", default)]
    pub header: ResponseHeader,
    #[serde(default)]
    pub response: ResultSet,
    /// Where stock Solr reports the next cursor.
    #[serde(rename = "nextCursorMark", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor_mark: Option<String>,
}

impl SolrResponse {
    pub fn docs(&self) -> &[SolrDocument] {
        &self.response.docs
    }

    /// Next cursor token: header params first, then the top-level field.
    pub fn next_cursor(&self) -> Option<&str> {
        self.header
            .param(NEXT_CURSOR_PARAM)
            .or(self.next_cursor_mark.as_deref())
            .filter(|mark| !mark.is_empty())
    }
}

/// Text fields may be single- or multi-valued depending on the schema.
fn de_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Array(values) => values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    })
}
