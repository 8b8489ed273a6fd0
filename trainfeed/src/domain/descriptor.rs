//! Job descriptors submitted through the control plane.

use serde::{Deserialize, Serialize};

use super::connection::de_port;
use crate::{Error, Result};

/// Cursor token that asks Solr for the first page.
pub const START_CURSOR: &str = "*";

fn default_cursor() -> String {
    START_CURSOR.to_string()
}

/// Query and delivery parameters for one job.
///
/// Bound to a [`ConnectionDescriptor`](super::ConnectionDescriptor) through
/// `solr_id`. Only `cursor_mark` changes after submission, and only forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub solr_id: u64,
    pub collection: String,
    pub sort: String,
    #[serde(rename = "cursorMark", default = "default_cursor")]
    pub cursor_mark: String,
    pub rows: u32,
    /// Optional path prefix in front of the trainer's `/stream/*` routes.
    #[serde(default)]
    pub endpoint: String,
    pub label: String,
    pub host: String,
    #[serde(deserialize_with = "de_port")]
    pub port: String,
}

impl JobDescriptor {
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(Error::validation("collection must not be empty"));
        }
        if self.rows == 0 {
            return Err(Error::validation("rows must be greater than zero"));
        }
        if self.sort.trim().is_empty() {
            return Err(Error::validation(
                "sort must not be empty; cursor pagination needs a stable order",
            ));
        }
        if self.host.trim().is_empty() {
            return Err(Error::validation("trainer host must not be empty"));
        }
        if self.cursor_mark.is_empty() {
            return Err(Error::validation("cursorMark must not be empty"));
        }
        Ok(())
    }

    /// Base URL of the training service, including the optional prefix.
    pub fn trainer_base_url(&self) -> String {
        let prefix = self.endpoint.trim().trim_end_matches('/');
        if prefix.is_empty() {
            format!("http://{}:{}", self.host, self.port)
        } else if prefix.starts_with('/') {
            format!("http://{}:{}{}", self.host, self.port, prefix)
        } else {
            format!("http://{}:{}/{}", self.host, self.port, prefix)
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_descriptor() -> JobDescriptor {
    JobDescriptor {
        solr_id: 1,
        collection: "news".to_string(),
        sort: "id asc".to_string(),
        cursor_mark: START_CURSOR.to_string(),
        rows: 2,
        endpoint: String::new(),
        label: "pos".to_string(),
        host: "svc".to_string(),
        port: "9000".to_string(),
    }
}
