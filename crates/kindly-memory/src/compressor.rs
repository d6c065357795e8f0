// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Folds batches of uncovered raw snippets into summary memories.
//!
//! A summary is produced when the uncovered count reaches the batch size, or
//! when the oldest uncovered snippet is older than the age threshold and at
//! least the minimum batch exists. Each invocation writes at most one summary
//! covering the oldest snippets; repeated calls drain the backlog.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use kindly_config::model::CompressionConfig;
use kindly_core::timeout::bounded;
use kindly_core::types::{ProviderMessage, ProviderRequest};
use kindly_core::{KindlyError, ProviderAdapter, UserId};
use tracing::{debug, info, warn};

use crate::store::MemoryStore;
use crate::types::Memory;

const SUMMARY_PROMPT: &str = "You compress diary snippets into a memory summary. \
Write 2-4 sentences in the third person (\"The user ...\") that keep every concrete \
detail the user stated: names, places, dates, feelings, and plans. \
Do not add anything that is not in the snippets. Output the summary text only.";

/// Why compression did or did not run for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// At least `batch_size` snippets are uncovered.
    Count,
    /// The oldest uncovered snippet passed `max_age_hours` with at least
    /// `min_batch` waiting.
    Age,
}

/// Decide whether `uncovered` (oldest first) warrants a summary now.
pub fn trigger_for(uncovered: &[Memory], config: &CompressionConfig) -> Option<Trigger> {
    let oldest = uncovered.first()?;
    if uncovered.len() >= config.batch_size {
        return Some(Trigger::Count);
    }
    let max_age = chrono::Duration::hours(config.max_age_hours as i64);
    if Utc::now() - oldest.created_at > max_age && uncovered.len() >= config.min_batch {
        return Some(Trigger::Age);
    }
    None
}

/// Snippets to fold into the next summary. A batch never leaves behind a
/// remainder smaller than `min_batch`, which could otherwise age past the
/// threshold without ever qualifying for the age trigger.
pub fn batch_len(uncovered: usize, config: &CompressionConfig) -> usize {
    if uncovered < config.batch_size + config.min_batch {
        uncovered
    } else {
        config.batch_size
    }
}

/// Folds a user's uncovered raw snippets into summaries.
///
/// A summary records the union of its snippets' source message ids, which
/// is what marks those snippets as covered. Nothing is deleted: snippets
/// stay searchable and the summary is stored alongside them.
pub struct MemoryCompressor {
    store: Arc<MemoryStore>,
    provider: Arc<dyn ProviderAdapter>,
    config: CompressionConfig,
}

impl MemoryCompressor {
    pub fn new(
        store: Arc<MemoryStore>,
        provider: Arc<dyn ProviderAdapter>,
        config: CompressionConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Write at most one summary for `user_id`. Failures are logged and
    /// leave the backlog for the next invocation.
    ///
    /// Returns the new summary id, if one was written.
    pub async fn maybe_compress(&self, user_id: UserId) -> Option<i64> {
        match self.try_compress(user_id).await {
            Ok(id) => id,
            Err(e) => {
                warn!(user_id, error = %e, "compression failed, backlog kept for retry");
                None
            }
        }
    }

    /// Fallible form of [`maybe_compress`](Self::maybe_compress).
    pub async fn try_compress(&self, user_id: UserId) -> Result<Option<i64>, KindlyError> {
        let uncovered = self.store.uncovered_snippets(user_id).await?;
        let Some(trigger) = trigger_for(&uncovered, &self.config) else {
            debug!(user_id, uncovered = uncovered.len(), "compression not triggered");
            return Ok(None);
        };

        let batch = &uncovered[..batch_len(uncovered.len(), &self.config)];
        let summary = self.summarize(batch).await?;
        // Embed before writing: a summary is never stored without its vector.
        let embedding = self.store.embed(&summary).await?;

        let source_ids: Vec<i64> = batch
            .iter()
            .flat_map(|m| m.source_ids.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let covered: Vec<i64> = batch.iter().map(|m| m.id).collect();
        let sources = source_ids.len();

        let id = self
            .store
            .insert_summary(user_id, &summary, embedding, source_ids, covered)
            .await?;

        metrics::counter!("kindly_summaries_total").increment(1);
        info!(user_id, id, sources, ?trigger, "summary created");
        Ok(Some(id))
    }

    /// Run until no trigger fires. Returns the number of summaries written.
    pub async fn drain(&self, user_id: UserId) -> Result<usize, KindlyError> {
        let mut written = 0;
        while self.try_compress(user_id).await?.is_some() {
            written += 1;
        }
        Ok(written)
    }

    async fn summarize(&self, batch: &[Memory]) -> Result<String, KindlyError> {
        let snippets = batch
            .iter()
            .map(|m| format!("[{}] {}", m.created_at.format("%Y-%m-%d %H:%M"), m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let request = ProviderRequest {
            system_prompt: Some(SUMMARY_PROMPT.to_string()),
            messages: vec![ProviderMessage::user(snippets)],
            max_tokens: 300,
            temperature: Some(0.2),
            ..Default::default()
        };
        let timeout = Duration::from_secs(self.store.config().call_timeout_secs);
        let response = bounded(timeout, self.provider.complete(request)).await?;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(KindlyError::provider("empty summary"));
        }
        Ok(text.to_string())
    }
}
