// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anti-repetition guard.
//!
//! Compares a candidate reply against the user's most recent bot replies by
//! embedding similarity. Suppressing repetition is a quality feature, so
//! every failure reads as "not repetitive".

use std::sync::Arc;
use std::time::Duration;

use kindly_config::model::RepetitionConfig;
use kindly_core::timeout::bounded;
use kindly_core::{EmbeddingAdapter, KindlyError, UserId, embed_one};
use kindly_memory::cosine_similarity;
use kindly_storage::Database;
use kindly_storage::queries::messages;
use tracing::{debug, warn};

/// Result of comparing a candidate against recent replies.
#[derive(Debug, Clone, PartialEq)]
pub struct RepetitionCheck {
    pub repetitive: bool,
    pub max_similarity: f32,
    /// The candidate's embedding, kept so the accepted reply can be logged
    /// with it.
    pub embedding: Vec<f32>,
}

pub struct AntiRepetitionGuard {
    db: Database,
    embedder: Arc<dyn EmbeddingAdapter>,
    config: RepetitionConfig,
    timeout: Duration,
}

impl AntiRepetitionGuard {
    pub fn new(
        db: Database,
        embedder: Arc<dyn EmbeddingAdapter>,
        config: RepetitionConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            db,
            embedder,
            config,
            timeout,
        }
    }

    /// Embed `candidate` and compare it with the last `window` replies.
    pub async fn check(&self, user_id: UserId, candidate: &str) -> Result<RepetitionCheck, KindlyError> {
        let embedding = bounded(self.timeout, embed_one(self.embedder.as_ref(), candidate)).await?;
        let recent = messages::recent_reply_embeddings(&self.db, user_id, self.config.window).await?;

        let max_similarity = recent
            .iter()
            .map(|previous| cosine_similarity(&embedding, previous))
            .fold(0.0f32, f32::max);
        let repetitive = !recent.is_empty() && max_similarity >= self.config.threshold;
        debug!(user_id, compared = recent.len(), max_similarity, repetitive, "repetition check");

        Ok(RepetitionCheck {
            repetitive,
            max_similarity,
            embedding,
        })
    }

    /// Fail-open form of [`check`](Self::check).
    pub async fn is_repetitive(&self, user_id: UserId, candidate: &str) -> bool {
        match self.check(user_id, candidate).await {
            Ok(check) => check.repetitive,
            Err(e) => {
                warn!(user_id, error = %e, "repetition check failed, treating as fresh");
                false
            }
        }
    }
}
