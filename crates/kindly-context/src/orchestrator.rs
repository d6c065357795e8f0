// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid retrieval over memories, positive moments, and knowledge chunks.
//!
//! Stages: classify, embed the query, fan out per-source searches sized by
//! the query type, boost recent moments, enforce the character budget, and
//! emit a [`ContextBlock`]. Stateless per call; a failed query embedding
//! yields an empty block.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use kindly_config::model::RetrievalConfig;
use kindly_core::timeout::bounded;
use kindly_core::{KindlyError, ProviderAdapter, UserId, embed_one};
use kindly_memory::{MemoryKind, MemoryStore, ScoredMemory};
use kindly_storage::queries::{knowledge, moments};
use kindly_storage::{ScoredChunk, ScoredMoment};
use tracing::{debug, warn};

use crate::block::ContextBlock;
use crate::budget::{ContextItem, ContextSource, Retrieved, enforce_budget};
use crate::classifier::{QueryClassifier, QueryType};
use crate::locale::RememberMatcher;
use crate::recency::apply_recency;

/// Per-source result limits for one query type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPlan {
    /// Fact-kind memories (fact, preference, person, event, emotion).
    pub facts: usize,
    /// Compressed summaries.
    pub summaries: usize,
    /// Raw snippets when no summary matched.
    pub snippets: usize,
    /// Snippet limit once any summary was found.
    pub snippets_with_summaries: usize,
    /// Positive moments.
    pub moments: usize,
    /// Shared knowledge chunks. Always 0 for remember-queries.
    pub knowledge: usize,
}

impl SearchPlan {
    /// Limits for `query_type`. Remember-queries favour the user's own
    /// memories and never search knowledge; advice-queries take the full
    /// knowledge limit and only a taste of each memory source.
    pub fn for_query(query_type: QueryType, config: &RetrievalConfig) -> Self {
        match query_type {
            QueryType::Remember => Self {
                facts: 5,
                summaries: 3,
                snippets: 4,
                snippets_with_summaries: 4,
                moments: config.moments_limit,
                knowledge: 0,
            },
            QueryType::Personal => Self {
                facts: 3,
                summaries: 2,
                snippets: 4,
                snippets_with_summaries: 2,
                moments: config.moments_limit,
                knowledge: 3.min(config.knowledge_limit),
            },
            QueryType::Advice => Self {
                facts: 2,
                summaries: 2,
                snippets: 2,
                snippets_with_summaries: 2,
                moments: 2,
                knowledge: config.knowledge_limit,
            },
            QueryType::General => Self {
                facts: 2,
                summaries: 2,
                snippets: 2,
                snippets_with_summaries: 2,
                moments: 2,
                knowledge: 4.min(config.knowledge_limit),
            },
        }
    }
}

/// Hybrid retrieval engine.
///
/// Holds no per-call state: every [`retrieve_context`](Self::retrieve_context)
/// classifies, searches and budgets from scratch, so one orchestrator is
/// shared by all users.
pub struct RetrievalOrchestrator {
    store: Arc<MemoryStore>,
    classifier: QueryClassifier,
    config: RetrievalConfig,
}

impl RetrievalOrchestrator {
    /// Create an orchestrator with an already built classifier.
    pub fn new(store: Arc<MemoryStore>, classifier: QueryClassifier, config: RetrievalConfig) -> Self {
        Self {
            store,
            classifier,
            config,
        }
    }

    /// Wire the classifier from config. Fails if a configured locale has no
    /// remember patterns.
    pub fn from_config(
        store: Arc<MemoryStore>,
        provider: Arc<dyn ProviderAdapter>,
        config: RetrievalConfig,
    ) -> Result<Self, KindlyError> {
        let matcher = RememberMatcher::new(&config.locales)?;
        let classifier = QueryClassifier::new(
            matcher,
            provider,
            Duration::from_secs(config.call_timeout_secs),
        );
        Ok(Self::new(store, classifier, config))
    }

    /// The classifier used to route queries.
    pub fn classifier(&self) -> &QueryClassifier {
        &self.classifier
    }

    /// Assemble context for `query` from `user_id`'s memories and shared
    /// knowledge. Never fails.
    pub async fn retrieve_context(&self, user_id: UserId, query: &str) -> ContextBlock {
        self.assemble(user_id, query, None).await
    }

    /// Context for answering the logged message `message_id`.
    ///
    /// Memories derived from that message itself are left out, so the
    /// user's own words never come back as evidence while they are being
    /// answered, however far background indexing has got.
    pub async fn retrieve_reply_context(
        &self,
        user_id: UserId,
        query: &str,
        message_id: i64,
    ) -> ContextBlock {
        self.assemble(user_id, query, Some(message_id)).await
    }

    async fn assemble(&self, user_id: UserId, query: &str, exclude: Option<i64>) -> ContextBlock {
        let query_type = self.classifier.classify(query).await;
        metrics::counter!("kindly_retrievals_total", "query_type" => query_type.to_string())
            .increment(1);

        let embedding = match self.embed_query(query).await {
            Ok(e) => e,
            Err(e) => {
                warn!(user_id, error = %e, "query embedding failed, using empty context");
                return ContextBlock::empty(query_type);
            }
        };

        let mut retrieved = self.fan_out(user_id, query_type, &embedding, exclude).await;
        apply_recency(
            &mut retrieved.moments,
            Utc::now(),
            self.config.recency_max_boost,
            self.config.recency_window_days,
        );

        let evicted = enforce_budget(&mut retrieved, query_type, self.config.char_budget);
        if evicted > 0 {
            metrics::counter!("kindly_context_evictions_total").increment(evicted as u64);
            debug!(user_id, evicted, "context over budget");
        }

        let block = ContextBlock::from_retrieved(query_type, retrieved, self.config.item_char_cap);
        for section in &block.sections {
            metrics::histogram!("kindly_context_items", "source" => section.source.to_string())
                .record(section.items.len() as f64);
        }
        debug!(
            user_id,
            %query_type,
            items = block.item_count(),
            sources = ?block.sources_used(),
            "context assembled"
        );
        block
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, KindlyError> {
        let timeout = Duration::from_secs(self.config.call_timeout_secs);
        bounded(timeout, embed_one(self.store.embedder().as_ref(), query)).await
    }

    async fn fan_out(
        &self,
        user_id: UserId,
        query_type: QueryType,
        embedding: &[f32],
        exclude: Option<i64>,
    ) -> Retrieved {
        let plan = SearchPlan::for_query(query_type, &self.config);
        let floor = self.store.config().similarity_floor;
        let db = self.store.database();
        let fact_kinds = MemoryKind::fact_kinds();

        let (facts, summaries, snippets, moments, knowledge) = tokio::join!(
            self.store
                .search_excluding(user_id, embedding, &fact_kinds, plan.facts, None, exclude),
            self.store.search_excluding(
                user_id,
                embedding,
                &[MemoryKind::Summary],
                plan.summaries,
                None,
                exclude,
            ),
            self.store.search_excluding(
                user_id,
                embedding,
                &[MemoryKind::RawSnippet],
                plan.snippets,
                None,
                exclude,
            ),
            moments::search_moments(db, user_id, embedding, plan.moments, floor),
            // Remember-queries never touch shared reference material.
            async {
                if query_type == QueryType::Remember {
                    Ok(Vec::new())
                } else {
                    knowledge::search_knowledge(db, embedding, plan.knowledge, floor).await
                }
            },
        );

        let summaries = memory_items(recover(summaries, ContextSource::Summaries));
        let mut snippets = memory_items(recover(snippets, ContextSource::Snippets));
        if !summaries.is_empty() {
            snippets.truncate(plan.snippets_with_summaries);
        }

        Retrieved {
            facts: memory_items(recover(facts, ContextSource::Facts)),
            summaries,
            snippets,
            moments: moment_items(recover(moments, ContextSource::Moments)),
            knowledge: chunk_items(recover(knowledge, ContextSource::Knowledge)),
        }
    }
}

fn recover<T>(result: Result<Vec<T>, KindlyError>, source: ContextSource) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!(%source, error = %e, "source search failed, skipping");
        Vec::new()
    })
}

fn memory_items(found: Vec<ScoredMemory>) -> Vec<ContextItem> {
    found
        .into_iter()
        .map(|s| ContextItem {
            id: s.memory.id,
            content: s.memory.content,
            score: s.similarity,
            created_at: Some(s.memory.created_at),
        })
        .collect()
}

fn moment_items(found: Vec<ScoredMoment>) -> Vec<ContextItem> {
    found
        .into_iter()
        .map(|s| ContextItem {
            id: s.moment.id,
            content: s.moment.content,
            score: s.similarity,
            created_at: Some(s.moment.created_at),
        })
        .collect()
}

fn chunk_items(found: Vec<ScoredChunk>) -> Vec<ContextItem> {
    found
        .into_iter()
        .map(|s| ContextItem {
            id: s.chunk.id,
            content: s.chunk.content,
            score: s.similarity,
            created_at: None,
        })
        .collect()
}
