//! In-memory stand-ins for Solr and the trainer, shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::domain::{Batch, START_CURSOR};
use crate::solr::{SearchIndex, SolrResponse};
use crate::trainer::{TrainResult, TrainingService, TrainingStatus};
use crate::{Error, Result};

/// HTTP client for tests that never leave the process.
pub(crate) fn http_client() -> reqwest::Client {
    crate::utils::http_client::build_http_client(Duration::from_secs(5))
        .expect("test http client")
}

/// Serves fixed pages. Page `n` (1-based) answers cursor `c{n-1}` (`*` for
/// the first) and hands out `c{n}` as the next cursor. Past the last page it
/// answers with no docs and echoes the cursor, like Solr does.
pub(crate) struct FakeIndex {
    pages: Vec<Vec<String>>,
    no_cursor_after: Option<usize>,
    repeat_cursor_at: Option<usize>,
    fail_at: Option<String>,
    requests: Mutex<Vec<(String, String)>>,
}

impl FakeIndex {
    pub(crate) fn with_pages(pages: &[&[&str]]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|docs| docs.iter().map(|d| d.to_string()).collect())
                .collect(),
            no_cursor_after: None,
            repeat_cursor_at: None,
            fail_at: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `n` pages of `size` docs each.
    pub(crate) fn uniform(n: usize, size: usize) -> Self {
        let mut index = Self::with_pages(&[]);
        index.pages = (0..n)
            .map(|p| (0..size).map(|d| format!("doc-{p}-{d}")).collect())
            .collect();
        index
    }

    pub(crate) fn without_cursor_after(mut self, page: usize) -> Self {
        self.no_cursor_after = Some(page);
        self
    }

    pub(crate) fn repeat_cursor_at(mut self, page: usize) -> Self {
        self.repeat_cursor_at = Some(page);
        self
    }

    pub(crate) fn fail_at(mut self, cursor: &str) -> Self {
        self.fail_at = Some(cursor.to_string());
        self
    }

    /// `(param, cursor)` of every request, in order.
    pub(crate) fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SearchIndex for FakeIndex {
    async fn fetch_page(&self, url: &Url) -> Result<SolrResponse> {
        let (param, cursor) = url
            .query_pairs()
            .find(|(k, _)| k == "cursorMark" || k == "nextCursorMark")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .unwrap_or_default();
        self.requests.lock().push((param, cursor.clone()));

        if self.fail_at.as_deref() == Some(cursor.as_str()) {
            return Err(Error::transport(format!("connection refused at {cursor}")));
        }

        let idx = if cursor == START_CURSOR {
            0
        } else {
            cursor
                .strip_prefix('c')
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| Error::transport(format!("unknown cursor {cursor}")))?
        };

        let (docs, next) = match self.pages.get(idx) {
            None => (Vec::new(), Some(cursor.clone())),
            Some(docs) => {
                let page = idx + 1;
                let next = if self.no_cursor_after == Some(page) {
                    None
                } else if self.repeat_cursor_at == Some(page) {
                    Some(cursor.clone())
                } else {
                    Some(format!("c{page}"))
                };
                (docs.clone(), next)
            }
        };

        let mut params = serde_json::Map::new();
        if let Some(next) = next {
            params.insert("nextCursorMark".to_string(), next.into());
        }
        let docs: Vec<_> = docs
            .iter()
            .map(|d| serde_json::json!({"id": d, "content": d}))
            .collect();
        let found = docs.len();

        Ok(serde_json::from_value(serde_json::json!({
            "responseHeader": {"status": 0, "QTime": 1, "params": params},
            "response": {"numFound": found, "start": 0, "docs": docs}
        }))?)
    }
}

/// Records what it is sent; failures are injected per batch sequence.
#[derive(Default)]
pub(crate) struct FakeTrainer {
    running: AtomicBool,
    status_fails: bool,
    fail_sequence: Option<u64>,
    transient_failures: AtomicUsize,
    delay: Option<Duration>,
    stall: Option<Duration>,
    start_calls: AtomicUsize,
    attempts: AtomicUsize,
    posted: Mutex<Vec<Batch>>,
}

impl FakeTrainer {
    pub(crate) fn running() -> Self {
        let trainer = Self::default();
        trainer.running.store(true, Ordering::SeqCst);
        trainer
    }

    pub(crate) fn stopped() -> Self {
        Self::default()
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            status_fails: true,
            ..Self::default()
        }
    }

    pub(crate) fn failing_on(mut self, sequence: u64) -> Self {
        self.fail_sequence = Some(sequence);
        self
    }

    /// Fail the first `n` POSTs, then recover.
    pub(crate) fn flaky(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold every POST that is not set up to fail for `stall` before
    /// accepting it.
    pub(crate) fn stalling(mut self, stall: Duration) -> Self {
        self.stall = Some(stall);
        self
    }

    pub(crate) fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn posted(&self) -> Vec<Batch> {
        self.posted.lock().clone()
    }
}

#[async_trait]
impl TrainingService for FakeTrainer {
    async fn status(&self) -> Result<TrainingStatus> {
        if self.status_fails {
            return Err(Error::transport("connection refused"));
        }
        Ok(TrainingStatus {
            running: self.running.load(Ordering::SeqCst),
        })
    }

    async fn start(&self) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn train(&self, batch: &Batch) -> Result<TrainResult> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sequence == Some(batch.sequence) {
            return Err(Error::transport(format!(
                "POST /stream/train returned HTTP 500 for batch {}",
                batch.sequence
            )));
        }
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::transport("connection reset"));
        }
        self.posted.lock().push(batch.clone());
        Ok(TrainResult {
            sequence: batch.sequence,
            status: 200,
            examples: batch.len(),
            payload_bytes: 0,
            response: r#"{"status":"accepted"}"#.to_string(),
        })
    }
}
