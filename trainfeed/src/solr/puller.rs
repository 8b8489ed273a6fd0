//! Cursor pagination over a Solr core.

use std::sync::Arc;

use tracing::{debug, trace};

use super::client::{SearchIndex, select_url};
use crate::domain::{Batch, ConnectionDescriptor, JobDescriptor, TrainExample};
use crate::{Error, Result};

/// Walks a result set page by page, converting each page into a [`Batch`].
pub struct CursorPuller {
    index: Arc<dyn SearchIndex>,
    connection: ConnectionDescriptor,
    descriptor: JobDescriptor,
}

impl CursorPuller {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        connection: ConnectionDescriptor,
        descriptor: JobDescriptor,
    ) -> Self {
        Self {
            index,
            connection,
            descriptor,
        }
    }

    /// Fetch the page at `cursor` and convert it into batch `sequence`.
    ///
    /// An empty page fails with [`Error::NoMoreData`] carrying the number of
    /// pages before it.
    pub async fn fetch_batch(&self, cursor: &str, sequence: u64) -> Result<Batch> {
        let url = select_url(&self.connection, &self.descriptor, cursor)?;
        let page = self.index.fetch_page(&url).await?;

        if page.docs().is_empty() {
            return Err(Error::NoMoreData {
                pages: sequence.saturating_sub(1),
            });
        }

        let examples = page
            .docs()
            .iter()
            .map(|doc| TrainExample {
                text: doc.content.clone(),
                label: self.descriptor.label.clone(),
            })
            .collect();

        Ok(Batch::new(sequence, cursor, examples)
            .with_next_cursor(page.next_cursor().map(str::to_string)))
    }

    /// Pull every page starting at `start`, handing each batch to `on_batch`
    /// in cursor order.
    ///
    /// This only ever returns an error. Running out of pages yields
    /// [`Error::NoMoreData`] with the number of batches delivered, so the
    /// caller decides whether an empty result set is acceptable. A page
    /// without a fresh next cursor ends pagination the same way once it has
    /// been delivered. Fetch failures and errors from `on_batch` come back
    /// unchanged.
    pub async fn pull<F, Fut>(&self, start: &str, mut on_batch: F) -> Error
    where
        F: FnMut(Batch) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut cursor = start.to_string();
        let mut pages = 0u64;

        loop {
            let batch = match self.fetch_batch(&cursor, pages + 1).await {
                Ok(batch) => batch,
                Err(e) => return e,
            };
            let next = batch.next_cursor.clone();

            trace!(
                collection = %self.descriptor.collection,
                cursor = %cursor,
                docs = batch.len(),
                "Pulled page"
            );

            if let Err(e) = on_batch(batch).await {
                return e;
            }
            pages += 1;

            match next {
                Some(next) if next != cursor => cursor = next,
                _ => {
                    debug!(
                        collection = %self.descriptor.collection,
                        pages,
                        "Cursor did not advance; pagination finished"
                    );
                    return Error::NoMoreData { pages };
                }
            }
        }
    }
}
