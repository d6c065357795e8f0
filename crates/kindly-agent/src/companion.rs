// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The companion facade: log, index in the background, retrieve, reply.

use std::sync::Arc;
use std::time::Duration;

use kindly_config::model::KindlyConfig;
use kindly_context::{ContextBlock, ContextSource, QueryType, RetrievalOrchestrator};
use kindly_core::{EmbeddingAdapter, KindlyError, Message, MessageType, ProviderAdapter, UserId};
use kindly_memory::{FactExtractor, IndexQueue, MemoryCompressor, MemoryStore, MessageIndexer};
use kindly_storage::Database;
use kindly_storage::queries::messages::{NewMessage, insert_message};
use tracing::{debug, info};

use crate::composer::ReplyComposer;
use crate::guard::AntiRepetitionGuard;

/// Wire the memory pipeline (store, extractor, compressor) into an indexer.
pub fn build_indexer(
    config: &KindlyConfig,
    db: Database,
    provider: Arc<dyn ProviderAdapter>,
    embedder: Arc<dyn EmbeddingAdapter>,
) -> Arc<MessageIndexer> {
    let store = Arc::new(MemoryStore::new(db, embedder, config.memory.clone()));
    let extractor = FactExtractor::new(provider.clone(), config.memory.clone());
    let compressor = MemoryCompressor::new(store.clone(), provider, config.compression.clone());
    Arc::new(MessageIndexer::new(
        store,
        extractor,
        compressor,
        config.indexer.clone(),
    ))
}

/// A reply as delivered to the user.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    /// Log id of the stored bot reply.
    pub message_id: i64,
    /// Log id of the user message being answered.
    pub in_reply_to: i64,
    pub query_type: QueryType,
    pub attempts: usize,
    pub sources: Vec<ContextSource>,
}

/// Facade the host application talks to: one call per incoming message.
///
/// Owns the index queue workers, so call [`Companion::shutdown`] before
/// dropping it to flush pending indexing.
pub struct Companion {
    db: Database,
    indexer: Arc<MessageIndexer>,
    queue: IndexQueue,
    orchestrator: RetrievalOrchestrator,
    composer: ReplyComposer,
}

impl Companion {
    /// Build the full pipeline and start the background index workers on
    /// the current runtime.
    pub fn new(
        config: &KindlyConfig,
        db: Database,
        provider: Arc<dyn ProviderAdapter>,
        embedder: Arc<dyn EmbeddingAdapter>,
    ) -> Result<Self, KindlyError> {
        let indexer = build_indexer(config, db.clone(), provider.clone(), embedder.clone());
        let orchestrator = RetrievalOrchestrator::from_config(
            indexer.store().clone(),
            provider.clone(),
            config.retrieval.clone(),
        )?;
        let guard = AntiRepetitionGuard::new(
            db.clone(),
            embedder,
            config.repetition.clone(),
            Duration::from_secs(config.retrieval.call_timeout_secs),
        );
        let composer = ReplyComposer::new(
            provider,
            guard,
            config.provider.clone(),
            config.repetition.clone(),
        );
        let queue = IndexQueue::start(indexer.clone(), &config.indexer);

        Ok(Self {
            db,
            indexer,
            queue,
            orchestrator,
            composer,
        })
    }

    /// The message log database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn indexer(&self) -> &Arc<MessageIndexer> {
        &self.indexer
    }

    /// Handle one incoming user message end to end.
    ///
    /// The message is logged before anything else and handed to background
    /// indexing. Retrieval and repetition checks degrade silently; only a
    /// failed generation is returned as an error.
    pub async fn handle_user_message(
        &self,
        user_id: UserId,
        message_type: MessageType,
        text: &str,
    ) -> Result<Reply, KindlyError> {
        if !message_type.is_user_authored() {
            return Err(KindlyError::Internal(format!(
                "handle_user_message called with {message_type}"
            )));
        }

        let message = insert_message(&self.db, NewMessage::new(user_id, message_type, text)).await?;
        let in_reply_to = message.id;
        if !self.index_message(message) {
            debug!(user_id, message_id = in_reply_to, "left for the batch indexer");
        }

        let context = self
            .orchestrator
            .retrieve_reply_context(user_id, text, in_reply_to)
            .await;
        let composed = self.composer.compose(user_id, text, &context).await?;
        let sources = context.sources_used();

        let mut reply = NewMessage::new(user_id, MessageType::BotReply, composed.text.clone());
        reply.embedding = composed.embedding;
        reply.metadata = Some(serde_json::json!({
            "sources": sources,
            "query_type": context.query_type,
            "attempts": composed.attempts,
        }));
        let stored = insert_message(&self.db, reply).await?;

        info!(
            user_id,
            message_id = stored.id,
            query_type = %context.query_type,
            attempts = composed.attempts,
            "reply sent"
        );
        Ok(Reply {
            text: composed.text,
            message_id: stored.id,
            in_reply_to,
            query_type: context.query_type,
            attempts: composed.attempts,
            sources,
        })
    }

    /// Context for `query` from everything indexed so far for `user_id`.
    pub async fn retrieve_context(&self, user_id: UserId, query: &str) -> ContextBlock {
        self.orchestrator.retrieve_context(user_id, query).await
    }

    /// Whether `candidate` is too close to one of the user's recent replies.
    /// Fails open.
    pub async fn is_repetitive(&self, user_id: UserId, candidate: &str) -> bool {
        self.composer.guard().is_repetitive(user_id, candidate).await
    }

    /// Queue a logged message for background indexing. Never blocks.
    pub fn index_message(&self, message: Message) -> bool {
        self.queue.submit(message)
    }

    /// Run one compression pass if the user's snippet backlog warrants it.
    /// Returns the new summary id.
    pub async fn maybe_compress(&self, user_id: UserId) -> Option<i64> {
        self.indexer.compressor().maybe_compress(user_id).await
    }

    /// Drain background indexing. Returns `false` on drain timeout.
    pub async fn shutdown(&self) -> bool {
        self.queue.shutdown().await
    }
}
