//! Utility modules.

pub mod http_client;
