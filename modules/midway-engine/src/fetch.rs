//! Fetch phase — bounded fan-out over list sources.
//!
//! Each source gets a fixed retry budget; a source that fails every
//! attempt degrades to an empty batch carrying its label and never
//! aborts its siblings. Batches are isolated — no task touches the
//! registry, so merge order cannot race.

use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use midway_common::{SourceBatch, SourceDescriptor};

use crate::retry::with_retry;
use crate::traits::SourceFetcher;

/// Fixed delay between fetch attempts for one source.
const RETRY_DELAY: Duration = Duration::from_secs(2);

pub struct FetchOrchestrator<'a> {
    fetcher: &'a dyn SourceFetcher,
    limiter: Semaphore,
    max_attempts: u32,
}

impl<'a> FetchOrchestrator<'a> {
    pub fn new(fetcher: &'a dyn SourceFetcher, concurrency: usize, max_attempts: u32) -> Self {
        Self {
            fetcher,
            limiter: Semaphore::new(concurrency.max(1)),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Fetch every source with at most `concurrency` fetches in flight.
    /// Returns one batch per source, in source order.
    pub async fn run(&self, sources: &[SourceDescriptor]) -> Vec<SourceBatch> {
        let futures = sources.iter().map(|source| async {
            let _permit = match self.limiter.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(label = source.label.as_str(), "Fetch limiter closed");
                    return SourceBatch::empty(&source.label);
                }
            };
            self.fetch_one(source).await
        });

        let batches = futures::future::join_all(futures).await;

        let empty = batches.iter().filter(|b| b.entries.is_empty()).count();
        info!(
            sources = sources.len(),
            empty_batches = empty,
            "Fetch phase complete"
        );
        batches
    }

    async fn fetch_one(&self, source: &SourceDescriptor) -> SourceBatch {
        let result = with_retry(&source.label, self.max_attempts, RETRY_DELAY, || {
            self.fetcher.fetch(source)
        })
        .await;

        match result {
            Ok(batch) => {
                info!(
                    label = source.label.as_str(),
                    entries = batch.entries.len(),
                    "Source fetched"
                );
                batch
            }
            Err(e) => {
                warn!(
                    label = source.label.as_str(),
                    error = %e,
                    "Source failed all attempts, degrading to empty batch"
                );
                SourceBatch::empty(&source.label)
            }
        }
    }
}
