//! Training batches.

use serde::{Deserialize, Serialize};

/// A single labelled example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainExample {
    pub text: String,
    pub label: String,
}

/// One converted page of search results.
///
/// Serialises as the trainer's `{"examples": [...]}` payload; the sequence
/// number and cursors are bookkeeping only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub examples: Vec<TrainExample>,
    /// 1-based position in cursor order.
    #[serde(skip)]
    pub sequence: u64,
    /// Cursor token of the request that produced this page.
    #[serde(skip)]
    pub cursor: String,
    /// Token Solr handed back for the following page, if any.
    #[serde(skip)]
    pub next_cursor: Option<String>,
}

impl Batch {
    pub fn new(sequence: u64, cursor: impl Into<String>, examples: Vec<TrainExample>) -> Self {
        Self {
            examples,
            sequence,
            cursor: cursor.into(),
            next_cursor: None,
        }
    }

    pub fn with_next_cursor(mut self, next_cursor: Option<String>) -> Self {
        self.next_cursor = next_cursor;
        self
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}
