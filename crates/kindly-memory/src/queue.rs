// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded background indexing.
//!
//! Jobs are sharded by user id across a fixed set of workers, so one user's
//! messages are indexed in submission order by a single worker. Submission
//! never blocks the caller: a full shard drops the job, which the watermark
//! batch job later recovers.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use kindly_config::model::IndexerConfig;
use kindly_core::Message;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::indexer::MessageIndexer;

/// Background indexing for the live message path.
///
/// Messages are sharded by user id over bounded channels, one worker per
/// shard, so a user's messages are indexed in log order. [`submit`](Self::submit)
/// never waits: a full shard drops the job and the batch indexer picks the
/// message up later from behind the watermark.
pub struct IndexQueue {
    shards: RwLock<Vec<mpsc::Sender<Message>>>,
    tracker: TaskTracker,
    shutdown_timeout: Duration,
}

impl IndexQueue {
    /// Spawn `config.workers` workers on the current runtime.
    pub fn start(indexer: Arc<MessageIndexer>, config: &IndexerConfig) -> Self {
        let workers = config.workers.max(1);
        let tracker = TaskTracker::new();
        let mut shards = Vec::with_capacity(workers);

        for worker in 0..workers {
            let (tx, mut rx) = mpsc::channel::<Message>(config.queue_capacity.max(1));
            let indexer = indexer.clone();
            tracker.spawn(async move {
                while let Some(message) = rx.recv().await {
                    if let Err(e) = indexer.index_live(&message).await {
                        warn!(
                            worker,
                            user_id = message.user_id,
                            message_id = message.id,
                            error = %e,
                            "background indexing failed, left for batch job"
                        );
                    }
                }
                debug!(worker, "index worker drained");
            });
            shards.push(tx);
        }
        tracker.close();
        info!(workers, capacity = config.queue_capacity, "index queue started");

        Self {
            shards: RwLock::new(shards),
            tracker,
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
        }
    }

    /// Enqueue a logged message for indexing. Returns `false` when the job
    /// was dropped because the shard is full or the queue is shut down.
    pub fn submit(&self, message: Message) -> bool {
        let Ok(shards) = self.shards.read() else {
            return false;
        };
        if shards.is_empty() {
            debug!(message_id = message.id, "index queue closed, job dropped");
            return false;
        }
        let shard = message.user_id.rem_euclid(shards.len() as i64) as usize;

        match shards[shard].try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                metrics::counter!("kindly_index_queue_dropped_total").increment(1);
                warn!(
                    user_id = message.user_id,
                    message_id = message.id,
                    shard,
                    "index queue full, job dropped"
                );
                false
            }
            Err(TrySendError::Closed(message)) => {
                debug!(message_id = message.id, "index worker gone, job dropped");
                false
            }
        }
    }

    /// Stop accepting jobs and wait for workers to drain what is queued.
    ///
    /// Returns `false` if the drain did not finish within the shutdown timeout.
    pub async fn shutdown(&self) -> bool {
        if let Ok(mut shards) = self.shards.write() {
            shards.clear();
        }
        match tokio::time::timeout(self.shutdown_timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("index queue drained");
                true
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.shutdown_timeout.as_secs(),
                    "index queue drain timed out"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::MemoryCompressor;
    use crate::extractor::FactExtractor;
    use crate::store::MemoryStore;
    use crate::types::MemoryKind;
    use kindly_config::model::{CompressionConfig, MemoryConfig};
    use kindly_core::MessageType;
    use kindly_storage::queries::users;
    use kindly_test_utils::TestHarness;
    use tracing_test::traced_test;

    fn indexer(h: &TestHarness) -> Arc<MessageIndexer> {
        let store = Arc::new(MemoryStore::new(
            h.db.clone(),
            h.embedder.clone(),
            MemoryConfig::default(),
        ));
        Arc::new(MessageIndexer::new(
            store.clone(),
            FactExtractor::new(h.provider.clone(), MemoryConfig::default()),
            MemoryCompressor::new(store, h.provider.clone(), CompressionConfig::default()),
            IndexerConfig::default(),
        ))
    }

    #[tokio::test]
    async fn shutdown_drains_submitted_jobs() {
        let h = TestHarness::new().await.unwrap();
        let ix = indexer(&h);
        let queue = IndexQueue::start(ix.clone(), &IndexerConfig::default());

        let a = h.log(1, MessageType::UserText, "Signed up for a salsa class").await.unwrap();
        let b = h.log(1, MessageType::UserText, "My partner stepped on my toes twice").await.unwrap();
        let c = h.log(2, MessageType::UserText, "Harvested the first zucchini").await.unwrap();
        assert!(queue.submit(a));
        assert!(queue.submit(b.clone()));
        assert!(queue.submit(c.clone()));

        assert!(queue.shutdown().await);

        assert_eq!(users::get_watermark(&h.db, 1).await.unwrap(), b.id);
        assert_eq!(users::get_watermark(&h.db, 2).await.unwrap(), c.id);
        assert_eq!(ix.store().list_by_kind(1, MemoryKind::RawSnippet).await.unwrap().len(), 2);
    }

    #[tokio::test]
    #[traced_test]
    async fn full_shard_drops_without_blocking() {
        let h = TestHarness::new().await.unwrap();
        let config = IndexerConfig {
            workers: 1,
            queue_capacity: 1,
            ..Default::default()
        };
        let queue = IndexQueue::start(indexer(&h), &config);

        let first = h.log(3, MessageType::UserText, "Learned to make sourdough").await.unwrap();
        let second = h.log(3, MessageType::UserText, "The crust came out perfect").await.unwrap();

        // The worker has not been polled yet on this single-threaded runtime.
        assert!(queue.submit(first));
        assert!(!queue.submit(second));
        assert!(logs_contain("index queue full"));

        assert!(queue.shutdown().await);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let h = TestHarness::new().await.unwrap();
        let queue = IndexQueue::start(indexer(&h), &IndexerConfig::default());
        assert!(queue.shutdown().await);

        let msg = h.log(4, MessageType::UserText, "Went birdwatching at dawn").await.unwrap();
        assert!(!queue.submit(msg));
    }

    #[tokio::test]
    async fn failed_jobs_leave_watermark_for_batch() {
        let h = TestHarness::new().await.unwrap();
        let ix = indexer(&h);
        let queue = IndexQueue::start(ix.clone(), &IndexerConfig::default());
        h.embedder.set_failing(true);

        let msg = h.log(5, MessageType::UserText, "Fixed the leaking faucet myself").await.unwrap();
        assert!(queue.submit(msg.clone()));
        assert!(queue.shutdown().await);
        assert_eq!(users::get_watermark(&h.db, 5).await.unwrap(), 0);

        h.embedder.set_failing(false);
        let report = ix.run_batch(5).await.unwrap();
        assert_eq!(report.watermark, msg.id);
    }
}
