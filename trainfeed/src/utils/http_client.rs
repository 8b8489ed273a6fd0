use std::{sync::OnceLock, time::Duration};

use tracing::debug;

use crate::{Error, Result};

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate got there first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the client shared by every Solr and trainer call.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    install_rustls_provider();

    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(concat!("trainfeed/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))
}
