//! Process configuration from the environment.

use std::time::Duration;

use tracing::warn;

use crate::api::ApiServerConfig;
use crate::job::{DispatchConfig, DispatcherConfig};

/// Everything `main` needs to wire the service together.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api: ApiServerConfig,
    pub log_dir: String,
    pub dispatch: DispatchConfig,
    pub dispatcher: DispatcherConfig,
    pub http_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiServerConfig::default(),
            log_dir: "logs".to_string(),
            dispatch: DispatchConfig::default(),
            dispatcher: DispatcherConfig::default(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    /// Read the environment, keeping the default for anything unset or
    /// unparsable.
    ///
    /// Besides `API_BIND_ADDRESS` and `API_PORT`:
    /// - `LOG_DIR`
    /// - `TRAINFEED_BATCH_WORKERS`
    /// - `TRAINFEED_CHANNEL_CAPACITY`
    /// - `TRAINFEED_BATCH_RETRIES`
    /// - `TRAINFEED_DISPATCH_WORKERS`
    /// - `TRAINFEED_HTTP_TIMEOUT_SECS`
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self {
            api: ApiServerConfig::from_env_or_default(),
            ..Self::default()
        };

        if let Some(dir) = lookup("LOG_DIR")
            && !dir.trim().is_empty()
        {
            config.log_dir = dir.trim().to_string();
        }

        set_positive(&lookup, "TRAINFEED_BATCH_WORKERS", &mut config.dispatch.batch_workers);
        set_positive(
            &lookup,
            "TRAINFEED_CHANNEL_CAPACITY",
            &mut config.dispatch.channel_capacity,
        );
        set_positive(&lookup, "TRAINFEED_DISPATCH_WORKERS", &mut config.dispatcher.workers);

        if let Some(retries) = parse(&lookup, "TRAINFEED_BATCH_RETRIES") {
            config.dispatch.batch_retries = retries;
        }
        if let Some(secs) = parse::<u64>(&lookup, "TRAINFEED_HTTP_TIMEOUT_SECS")
            && secs > 0
        {
            config.http_timeout = Duration::from_secs(secs);
        }

        config
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring invalid configuration value");
            None
        }
    }
}

fn set_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut usize) {
    match parse::<usize>(lookup, key) {
        Some(0) => warn!(key, "Ignoring zero; a positive value is required"),
        Some(value) => *target = value,
        None => {}
    }
}
