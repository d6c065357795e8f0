// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message indexing and the watermark batch job.
//!
//! The batch job is authoritative: it walks a user's log in ascending id
//! order from the watermark and advances the watermark over the successfully
//! indexed prefix, as the last step of each page. Re-processing a message is
//! harmless because every write goes through the store's dedup.

use std::sync::Arc;

use kindly_config::model::IndexerConfig;
use kindly_core::{KindlyError, Message, UserId};
use kindly_storage::Database;
use kindly_storage::queries::{messages, users};
use tracing::{debug, info, warn};

use crate::compressor::MemoryCompressor;
use crate::extractor::FactExtractor;
use crate::store::MemoryStore;

/// Outcome of one batch run for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Messages walked past, including skipped bot replies.
    pub processed: usize,
    /// Watermark after the run.
    pub watermark: i64,
    /// First message that failed to index, if the run stopped early.
    pub stopped_at: Option<i64>,
    /// Summary written after the run, if compression triggered.
    pub summary_id: Option<i64>,
}

/// Turns logged messages into memories: extracted facts plus one raw
/// snippet per message that passes the noise prefilter.
///
/// Shared by the live index queue and the watermark batch job. Indexing the
/// same message twice is harmless because the store deduplicates.
pub struct MessageIndexer {
    store: Arc<MemoryStore>,
    extractor: FactExtractor,
    compressor: MemoryCompressor,
    config: IndexerConfig,
}

impl MessageIndexer {
    pub fn new(
        store: Arc<MemoryStore>,
        extractor: FactExtractor,
        compressor: MemoryCompressor,
        config: IndexerConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            compressor,
            config,
        }
    }

    /// The memory store writes go to.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn compressor(&self) -> &MemoryCompressor {
        &self.compressor
    }

    fn db(&self) -> &Database {
        self.store.database()
    }

    /// Index one message: a raw snippet plus any extracted facts.
    ///
    /// Bot replies and noise are skipped without touching the provider.
    /// Extraction failures yield no facts; storage and embedding failures
    /// propagate so the message stays behind the watermark.
    pub async fn index_message(&self, message: &Message) -> Result<(), KindlyError> {
        if !message.message_type.is_user_authored() {
            return Ok(());
        }
        if let Some(reason) = self.extractor.prefilter(&message.content) {
            debug!(message_id = message.id, ?reason, "message filtered as noise");
            return Ok(());
        }

        self.store.store_raw_snippet(message).await?;

        let facts = self.extractor.extract(message.id, &message.content).await;
        for fact in facts {
            self.store
                .store_fact(
                    message.user_id,
                    &fact.content,
                    fact.kind,
                    fact.confidence,
                    vec![message.id],
                )
                .await?;
        }
        Ok(())
    }

    /// Live-path job: index, advance the watermark if this message extends
    /// the contiguous indexed prefix, then give compression a chance.
    ///
    /// Returns whether the watermark moved.
    pub async fn index_live(&self, message: &Message) -> Result<bool, KindlyError> {
        self.index_message(message).await?;
        let advanced = users::advance_if_contiguous(self.db(), message.user_id, message.id).await?;
        if advanced {
            debug!(user_id = message.user_id, watermark = message.id, "watermark advanced");
        }
        self.compressor.maybe_compress(message.user_id).await;
        Ok(advanced)
    }

    /// Index everything past the user's watermark, stopping at the first
    /// message that fails.
    pub async fn run_batch(&self, user_id: UserId) -> Result<BatchReport, KindlyError> {
        let mut report = BatchReport {
            watermark: users::get_watermark(self.db(), user_id).await?,
            ..Default::default()
        };

        'pages: loop {
            let page =
                messages::messages_after(self.db(), user_id, report.watermark, self.config.batch_size)
                    .await?;
            if page.is_empty() {
                break;
            }

            let mut last_ok = None;
            for message in &page {
                if let Err(e) = self.index_message(message).await {
                    warn!(user_id, message_id = message.id, error = %e, "indexing stopped");
                    report.stopped_at = Some(message.id);
                    break;
                }
                last_ok = Some(message.id);
                report.processed += 1;
            }

            if let Some(id) = last_ok {
                report.watermark = users::advance_watermark(self.db(), user_id, id).await?;
            }
            if report.stopped_at.is_some() || page.len() < self.config.batch_size {
                break 'pages;
            }
        }

        if report.processed > 0 {
            report.summary_id = self.compressor.maybe_compress(user_id).await;
            info!(
                user_id,
                processed = report.processed,
                watermark = report.watermark,
                "batch indexed"
            );
        }
        Ok(report)
    }

    /// Run the batch job for every user with messages past their watermark.
    ///
    /// A failing user is logged and does not stop the others.
    pub async fn run_pending(&self) -> Result<Vec<(UserId, BatchReport)>, KindlyError> {
        let pending = messages::users_with_pending(self.db()).await?;
        let mut reports = Vec::with_capacity(pending.len());
        for user_id in pending {
            match self.run_batch(user_id).await {
                Ok(report) => reports.push((user_id, report)),
                Err(e) => warn!(user_id, error = %e, "batch indexing failed"),
            }
        }
        Ok(reports)
    }

    /// Rewind the watermark to zero and replay the whole log.
    pub async fn reindex(&self, user_id: UserId) -> Result<BatchReport, KindlyError> {
        users::reset_watermark(self.db(), user_id).await?;
        info!(user_id, "watermark reset for full reindex");
        self.run_batch(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryKind;
    use kindly_config::model::{CompressionConfig, MemoryConfig};
    use kindly_core::MessageType;
    use kindly_test_utils::TestHarness;

    fn indexer(h: &TestHarness, batch_size: usize) -> MessageIndexer {
        let store = Arc::new(MemoryStore::new(
            h.db.clone(),
            h.embedder.clone(),
            MemoryConfig::default(),
        ));
        let extractor = FactExtractor::new(h.provider.clone(), MemoryConfig::default());
        let compressor =
            MemoryCompressor::new(store.clone(), h.provider.clone(), CompressionConfig::default());
        MessageIndexer::new(
            store,
            extractor,
            compressor,
            IndexerConfig {
                batch_size,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn bot_replies_and_noise_cost_nothing() {
        let h = TestHarness::new().await.unwrap();
        let ix = indexer(&h, 100);
        let reply = h.log(1, MessageType::BotReply, "That sounds like a lovely afternoon").await.unwrap();
        let ack = h.log(1, MessageType::UserText, "ok").await.unwrap();

        ix.index_message(&reply).await.unwrap();
        ix.index_message(&ack).await.unwrap();

        assert_eq!(h.provider.request_count().await, 0);
        assert_eq!(h.embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn stores_snippet_and_extracted_fact() {
        let h = TestHarness::new().await.unwrap();
        h.provider
            .add_rule(
                "fact extractor",
                r#"[{"content": "User's sister Maria was promoted to manager", "kind": "person", "confidence": 0.9}]"#,
            )
            .await;
        let ix = indexer(&h, 100);
        let msg = h
            .log(1, MessageType::UserText, "My sister Maria just got promoted to manager")
            .await
            .unwrap();

        ix.index_message(&msg).await.unwrap();

        let people = ix.store().list_by_kind(1, MemoryKind::Person).await.unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].content, "User's sister Maria was promoted to manager");
        assert_eq!(people[0].source_ids, vec![msg.id]);

        let snippets = ix.store().list_by_kind(1, MemoryKind::RawSnippet).await.unwrap();
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].source_ids, vec![msg.id]);
    }

    #[tokio::test]
    async fn batch_walks_past_bot_replies_across_pages() {
        let h = TestHarness::new().await.unwrap();
        let ix = indexer(&h, 2);
        h.log(3, MessageType::UserText, "Started a pottery class this week").await.unwrap();
        h.log(3, MessageType::BotReply, "How exciting, tell me more").await.unwrap();
        h.log(3, MessageType::UserVoice, "My pottery instructor says my bowls are improving").await.unwrap();
        let last = h.log(3, MessageType::BotReply, "That must feel rewarding").await.unwrap();

        let report = ix.run_batch(3).await.unwrap();
        assert_eq!(report.processed, 4);
        assert_eq!(report.watermark, last.id);
        assert_eq!(report.stopped_at, None);
        assert_eq!(ix.store().list_by_kind(3, MemoryKind::RawSnippet).await.unwrap().len(), 2);

        let again = ix.run_batch(3).await.unwrap();
        assert_eq!(again.processed, 0);
        assert_eq!(again.watermark, last.id);
    }

    #[tokio::test]
    async fn batch_stops_at_first_failure() {
        let h = TestHarness::new().await.unwrap();
        let ix = indexer(&h, 100);
        let first = h.log(4, MessageType::UserText, "Bought a secondhand piano today").await.unwrap();
        let broken = h.log(4, MessageType::UserText, "UNEMBEDDABLE thoughts about winter").await.unwrap();
        h.log(4, MessageType::UserText, "Tried a new ramen place nearby").await.unwrap();
        h.embedder.fail_on("UNEMBEDDABLE");

        let report = ix.run_batch(4).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.watermark, first.id);
        assert_eq!(report.stopped_at, Some(broken.id));
        assert_eq!(users::get_watermark(&h.db, 4).await.unwrap(), first.id);
    }

    #[tokio::test]
    async fn failed_run_recovers_on_retry() {
        let h = TestHarness::new().await.unwrap();
        let ix = indexer(&h, 100);
        h.log(5, MessageType::UserText, "Adopted a kitten named Pixel").await.unwrap();
        let last = h.log(5, MessageType::UserText, "Pixel knocked over my coffee").await.unwrap();

        h.embedder.set_failing(true);
        let failed = ix.run_batch(5).await.unwrap();
        assert_eq!(failed.watermark, 0);
        assert!(failed.stopped_at.is_some());

        h.embedder.set_failing(false);
        let report = ix.run_batch(5).await.unwrap();
        assert_eq!(report.watermark, last.id);
        assert_eq!(report.stopped_at, None);
    }

    #[tokio::test]
    async fn reindex_is_idempotent() {
        let h = TestHarness::new().await.unwrap();
        let ix = indexer(&h, 100);
        h.log(6, MessageType::UserText, "Finished my first half marathon").await.unwrap();
        h.log(6, MessageType::UserText, "My knees are sore but I am proud").await.unwrap();

        ix.run_batch(6).await.unwrap();
        let before = ix.store().list_by_kind(6, MemoryKind::RawSnippet).await.unwrap().len();

        let report = ix.reindex(6).await.unwrap();
        assert_eq!(report.processed, 2);
        let after = ix.store().list_by_kind(6, MemoryKind::RawSnippet).await.unwrap().len();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn run_pending_visits_every_behind_user() {
        let h = TestHarness::new().await.unwrap();
        let ix = indexer(&h, 100);
        h.log(7, MessageType::UserText, "Repainted the kitchen cabinets green").await.unwrap();
        h.log(8, MessageType::UserText, "Got tickets for the jazz festival").await.unwrap();

        let reports = ix.run_pending().await.unwrap();
        let users: Vec<UserId> = reports.iter().map(|(u, _)| *u).collect();
        assert_eq!(users, vec![7, 8]);
        assert!(messages::users_with_pending(&h.db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn live_path_only_extends_contiguous_prefix() {
        let h = TestHarness::new().await.unwrap();
        let ix = indexer(&h, 100);
        let m1 = h.log(9, MessageType::UserText, "Visited the botanical garden").await.unwrap();
        let m2 = h.log(9, MessageType::UserText, "Saw a blooming corpse flower").await.unwrap();

        assert!(!ix.index_live(&m2).await.unwrap());
        assert_eq!(users::get_watermark(&h.db, 9).await.unwrap(), 0);

        assert!(ix.index_live(&m1).await.unwrap());
        assert!(ix.index_live(&m2).await.unwrap());
        assert_eq!(users::get_watermark(&h.db, 9).await.unwrap(), m2.id);
    }
}
