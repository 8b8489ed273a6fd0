//! Solr search-index access: response model, HTTP client and cursor puller.

mod client;
mod models;
mod puller;

pub use client::{
    CONTINUE_CURSOR_PARAM, CURSOR_PARAM, MATCH_ALL_QUERY, SearchIndex, SolrClient, select_url,
};
pub use models::{NEXT_CURSOR_PARAM, ResponseHeader, ResultSet, SolrDocument, SolrResponse};
pub use puller::CursorPuller;
