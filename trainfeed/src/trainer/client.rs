//! HTTP access to the streaming training service.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::Batch;
use crate::{Error, Result};

pub const STATUS_PATH: &str = "/stream/status";
pub const START_PATH: &str = "/stream/start";
pub const TRAIN_PATH: &str = "/stream/train";

/// Body of `GET /stream/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingStatus {
    pub running: bool,
}

/// Outcome of one `POST /stream/train`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainResult {
    /// Batch sequence number.
    pub sequence: u64,
    /// HTTP status returned by the trainer.
    pub status: u16,
    /// Number of examples posted.
    pub examples: usize,
    /// Size of the posted JSON payload in bytes.
    pub payload_bytes: usize,
    /// Raw acknowledgement body.
    pub response: String,
}

/// The remote trainer, as seen by a job.
#[async_trait]
pub trait TrainingService: Send + Sync {
    async fn status(&self) -> Result<TrainingStatus>;

    async fn start(&self) -> Result<()>;

    async fn train(&self, batch: &Batch) -> Result<TrainResult>;
}

/// [`TrainingService`] over HTTP+JSON.
#[derive(Debug, Clone)]
pub struct TrainerClient {
    client: Client,
    base_url: String,
}

impl TrainerClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn checked_text(response: reqwest::Response, what: &str) -> Result<(u16, String)> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("Reading {} response failed: {}", what, e)))?;
        if !status.is_success() {
            return Err(Error::transport(format!(
                "{} returned HTTP {}: {}",
                what,
                status,
                body.trim()
            )));
        }
        Ok((status.as_u16(), body))
    }
}

#[async_trait]
impl TrainingService for TrainerClient {
    async fn status(&self) -> Result<TrainingStatus> {
        let url = self.url(STATUS_PATH);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::transport(format!("GET {} failed: {}", url, e)))?;
        let (_, body) = Self::checked_text(response, &format!("GET {}", url)).await?;

        serde_json::from_str(&body)
            .map_err(|e| Error::decode(format!("Invalid trainer status from {}: {}", url, e)))
    }

    async fn start(&self) -> Result<()> {
        let url = self.url(START_PATH);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| Error::transport(format!("POST {} failed: {}", url, e)))?;
        let (_, body) = Self::checked_text(response, &format!("POST {}", url)).await?;

        info!(url = %url, ack = %body.trim(), "Training service started");
        Ok(())
    }

    async fn train(&self, batch: &Batch) -> Result<TrainResult> {
        let url = self.url(TRAIN_PATH);
        let payload = serde_json::to_vec(batch)?;
        let payload_bytes = payload.len();

        debug!(
            url = %url,
            batch = batch.sequence,
            examples = batch.len(),
            bytes = payload_bytes,
            "Posting batch"
        );

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| Error::transport(format!("POST {} failed: {}", url, e)))?;
        let (status, response) = Self::checked_text(response, &format!("POST {}", url)).await?;

        Ok(TrainResult {
            sequence: batch.sequence,
            status,
            examples: batch.len(),
            payload_bytes,
            response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base_and_path() {
        let client = TrainerClient::new(crate::testing::http_client(), "http://svc:9000/");
        assert_eq!(client.url(TRAIN_PATH), "http://svc:9000/stream/train");
        assert_eq!(client.base_url(), "http://svc:9000/");
    }

    #[test]
    fn test_status_body() {
        let status: TrainingStatus = serde_json::from_str(r#"{"running":false}"#).unwrap();
        assert!(!status.running);
    }
}
