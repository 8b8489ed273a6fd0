//! HTTP access to a Solr core.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::models::SolrResponse;
use crate::domain::{ConnectionDescriptor, JobDescriptor, START_CURSOR};
use crate::{Error, Result};

/// Query matching every document.
pub const MATCH_ALL_QUERY: &str = "*:*";
/// Param that starts cursor pagination.
pub const CURSOR_PARAM: &str = "cursorMark";
/// Param that continues cursor pagination from a returned token.
pub const CONTINUE_CURSOR_PARAM: &str = "nextCursorMark";

/// Build the `/select` URL for one page.
///
/// The sentinel cursor goes out as `cursorMark`, any later token as
/// `nextCursorMark`. All values are percent-encoded.
pub fn select_url(
    connection: &ConnectionDescriptor,
    descriptor: &JobDescriptor,
    cursor: &str,
) -> Result<Url> {
    let base = connection.base_url();
    let mut url = Url::parse(&base)
        .map_err(|e| Error::config(format!("Invalid Solr address '{}': {}", base, e)))?;

    url.path_segments_mut()
        .map_err(|_| Error::config(format!("Solr address '{}' cannot take a path", base)))?
        .pop_if_empty()
        .extend(["solr", descriptor.collection.as_str(), "select"]);

    let cursor_param = if cursor == START_CURSOR {
        CURSOR_PARAM
    } else {
        CONTINUE_CURSOR_PARAM
    };

    url.query_pairs_mut()
        .append_pair("q", MATCH_ALL_QUERY)
        .append_pair("wt", "json")
        .append_pair("rows", &descriptor.rows.to_string())
        .append_pair("sort", &descriptor.sort)
        .append_pair(cursor_param, cursor);

    Ok(url)
}

/// A source of result pages.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Fetch and decode a single `/select` page.
    async fn fetch_page(&self, url: &Url) -> Result<SolrResponse>;
}

/// [`SearchIndex`] backed by Solr's JSON HTTP API.
#[derive(Debug, Clone)]
pub struct SolrClient {
    client: Client,
}

impl SolrClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SearchIndex for SolrClient {
    async fn fetch_page(&self, url: &Url) -> Result<SolrResponse> {
        debug!(%url, "Fetching Solr page");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::transport(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport(format!(
                "GET {} returned HTTP {}",
                url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::transport(format!("Reading body of {} failed: {}", url, e)))?;

        serde_json::from_slice(&body)
            .map_err(|e| Error::decode(format!("Invalid Solr response from {}: {}", url, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::descriptor::sample_descriptor;

    fn connection() -> ConnectionDescriptor {
        ConnectionDescriptor::new(1, "idx", "8983")
    }

    #[test]
    fn test_first_page_uses_cursor_mark() {
        let url = select_url(&connection(), &sample_descriptor(), START_CURSOR).unwrap();
        assert_eq!(url.path(), "/solr/news/select");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "*:*".to_string()),
                ("wt".to_string(), "json".to_string()),
                ("rows".to_string(), "2".to_string()),
                ("sort".to_string(), "id asc".to_string()),
                ("cursorMark".to_string(), "*".to_string()),
            ]
        );
    }

    #[test]
    fn test_later_pages_use_next_cursor_mark() {
        let url = select_url(&connection(), &sample_descriptor(), "AoE+Mg==").unwrap();
        let query = url.query().unwrap_or_default();
        assert!(query.contains("nextCursorMark=AoE%2BMg%3D%3D"));
        assert!(!query.contains("&cursorMark="));
        assert!(query.contains("sort=id+asc"));
    }

    #[test]
    fn test_collection_is_path_encoded() {
        let mut desc = sample_descriptor();
        desc.collection = "my core".to_string();
        let url = select_url(&connection(), &desc, START_CURSOR).unwrap();
        assert_eq!(url.path(), "/solr/my%20core/select");
    }

    #[test]
    fn test_bad_port_is_config_error() {
        let conn = ConnectionDescriptor::new(1, "idx", "not-a-port");
        let err = select_url(&conn, &sample_descriptor(), START_CURSOR).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
