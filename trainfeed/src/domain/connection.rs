//! Search-index connection descriptors.

use serde::{Deserialize, Deserializer, Serialize};

/// A registered Solr endpoint. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub id: u64,
    pub host: String,
    pub port: String,
}

impl ConnectionDescriptor {
    pub fn new(id: u64, host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            id,
            host: host.into(),
            port: port.into(),
        }
    }

    /// `http://{host}:{port}`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Accept a port given either as a JSON string or a JSON number.
pub(crate) fn de_port<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u16),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Text(s) => s.trim().to_string(),
        Port::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct PortOnly {
        #[serde(deserialize_with = "de_port")]
        port: String,
    }

    #[test]
    fn test_base_url() {
        let conn = ConnectionDescriptor::new(1, "idx", "8983");
        assert_eq!(conn.base_url(), "http://idx:8983");
    }

    #[test]
    fn test_port_accepts_string_or_number() {
        let text: PortOnly = serde_json::from_str(r#"{"port":"8983"}"#).unwrap();
        let number: PortOnly = serde_json::from_str(r#"{"port":8983}"#).unwrap();
        assert_eq!(text.port, "8983");
        assert_eq!(number.port, "8983");
    }
}
