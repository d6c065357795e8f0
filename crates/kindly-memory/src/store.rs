// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed memory store with fingerprint and vector-similarity dedup.
//!
//! Every read and write is scoped by `user_id` in SQL. The dedup check and
//! the insert run inside one call on the single writer thread, so concurrent
//! writers cannot both insert the same content.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kindly_config::model::MemoryConfig;
use kindly_core::timeout::bounded;
use kindly_core::{EmbeddingAdapter, KindlyError, Message, UserId, embed_one};
use kindly_storage::models::{blob_to_vec, format_ts, parse_json, parse_ts, vec_to_blob};
use kindly_storage::queries::users;
use kindly_storage::{Database, database::map_tr_err};
use rusqlite::{Row, params};
use tracing::{debug, warn};

use crate::fingerprint::fingerprint;
use crate::types::{Memory, MemoryKind, ScoredMemory, SkipReason, StoreOutcome};

const MEMORY_COLUMNS: &str = "id, user_id, content, embedding, kind, importance, fingerprint, \
                              source_ids, metadata, created_at, updated_at";

/// A memory about to be written.
struct Candidate {
    user_id: UserId,
    content: String,
    kind: MemoryKind,
    importance: f32,
    fingerprint: String,
    source_ids: Vec<i64>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

/// Persistent store for user memories.
pub struct MemoryStore {
    db: Database,
    embedder: Arc<dyn EmbeddingAdapter>,
    config: MemoryConfig,
}

impl MemoryStore {
    /// Create a store over an opened, migrated database.
    pub fn new(db: Database, embedder: Arc<dyn EmbeddingAdapter>, config: MemoryConfig) -> Self {
        Self {
            db,
            embedder,
            config,
        }
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Dedup thresholds, importances and timeouts in effect.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// The embedding capability used for writes and searches.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingAdapter> {
        &self.embedder
    }

    /// Embed `text` within the configured time bound.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, KindlyError> {
        let timeout = Duration::from_secs(self.config.call_timeout_secs);
        bounded(timeout, embed_one(self.embedder.as_ref(), text)).await
    }

    /// Store an extracted fact.
    ///
    /// Skips exact duplicates (by fingerprint) and near-duplicates (cosine
    /// similarity at or above the dedup threshold against the user's other
    /// fact-kind memories). Embedding failures are returned as errors and
    /// nothing is written.
    pub async fn store_fact(
        &self,
        user_id: UserId,
        content: &str,
        kind: MemoryKind,
        confidence: f32,
        source_ids: Vec<i64>,
    ) -> Result<StoreOutcome, KindlyError> {
        if !kind.is_fact() {
            return Err(KindlyError::Internal(format!(
                "store_fact called with non-fact kind {kind}"
            )));
        }
        let candidate = Candidate {
            user_id,
            content: content.trim().to_string(),
            kind,
            importance: self.config.fact_importance,
            fingerprint: fingerprint(content),
            source_ids,
            metadata: serde_json::json!({ "confidence": confidence }),
            created_at: Utc::now(),
        };
        self.store_deduplicated(candidate).await
    }

    /// Store a qualifying user message verbatim as a raw snippet.
    ///
    /// Uses the same dedup path as facts, compared only against other raw
    /// snippets. The snippet keeps the message's timestamp so compression
    /// ages it from when it was said.
    pub async fn store_raw_snippet(&self, message: &Message) -> Result<StoreOutcome, KindlyError> {
        let candidate = Candidate {
            user_id: message.user_id,
            content: message.content.trim().to_string(),
            kind: MemoryKind::RawSnippet,
            importance: self.config.raw_snippet_importance,
            fingerprint: fingerprint(&message.content),
            source_ids: vec![message.id],
            metadata: serde_json::json!({ "message_type": message.message_type }),
            created_at: message.created_at,
        };
        self.store_deduplicated(candidate).await
    }

    async fn store_deduplicated(&self, candidate: Candidate) -> Result<StoreOutcome, KindlyError> {
        if candidate.content.is_empty() {
            return Ok(self.skipped(&candidate, SkipReason::EmptyContent));
        }

        // Cheap exact check first so duplicates never cost an embedding call.
        if self
            .fingerprint_exists(candidate.user_id, &candidate.fingerprint)
            .await?
        {
            return Ok(self.skipped(&candidate, SkipReason::DuplicateFingerprint));
        }

        let embedding = self.embed(&candidate.content).await?;
        let threshold = self.config.dedup_similarity;
        let class = kinds_json(&candidate.kind.dedup_class());
        let user_id = candidate.user_id;
        let kind = candidate.kind;
        let content_len = candidate.content.len();

        let outcome = self
            .db
            .connection()
            .call(move |conn| -> Result<StoreOutcome, rusqlite::Error> {
                let tx = conn.transaction()?;
                let blob = vec_to_blob(&embedding);

                let duplicate: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM memories WHERE user_id = ?1 AND fingerprint = ?2)",
                    params![candidate.user_id, candidate.fingerprint],
                    |row| row.get(0),
                )?;
                if duplicate {
                    return Ok(StoreOutcome::Skipped(SkipReason::DuplicateFingerprint));
                }

                let nearest: Option<f64> = tx.query_row(
                    "SELECT MAX(1.0 - vec_distance_cosine(embedding, ?2)) FROM memories
                     WHERE user_id = ?1
                       AND kind IN (SELECT value FROM json_each(?3))
                       AND length(embedding) = length(?2)",
                    params![candidate.user_id, blob, class],
                    |row| row.get(0),
                )?;
                if nearest.is_some_and(|sim| sim >= f64::from(threshold)) {
                    return Ok(StoreOutcome::Skipped(SkipReason::NearDuplicate));
                }

                let id = insert_row(&tx, &candidate, &blob)?;
                tx.commit()?;
                Ok(StoreOutcome::Stored(id))
            })
            .await
            .map_err(map_tr_err)?;

        match outcome {
            StoreOutcome::Stored(id) => {
                debug!(user_id, id, %kind, "memory stored");
                metrics::counter!("kindly_memories_stored_total", "kind" => kind.to_string())
                    .increment(1);
            }
            StoreOutcome::Skipped(reason) => {
                debug!(user_id, %kind, %reason, content_len, "memory skipped");
                metrics::counter!("kindly_memories_skipped_total", "reason" => reason.to_string())
                    .increment(1);
            }
        }
        Ok(outcome)
    }

    fn skipped(&self, candidate: &Candidate, reason: SkipReason) -> StoreOutcome {
        debug!(user_id = candidate.user_id, kind = %candidate.kind, %reason, "memory skipped");
        metrics::counter!("kindly_memories_skipped_total", "reason" => reason.to_string())
            .increment(1);
        StoreOutcome::Skipped(reason)
    }

    async fn fingerprint_exists(&self, user_id: UserId, fp: &str) -> Result<bool, KindlyError> {
        let fp = fp.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM memories WHERE user_id = ?1 AND fingerprint = ?2)",
                    params![user_id, fp],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(map_tr_err)
    }

    /// Insert a summary with a precomputed embedding.
    ///
    /// Summaries bypass content dedup: they are identified by the snippets
    /// they cover, and a rejected summary would leave its snippets uncovered.
    pub async fn insert_summary(
        &self,
        user_id: UserId,
        content: &str,
        embedding: Vec<f32>,
        source_ids: Vec<i64>,
        covered_memory_ids: Vec<i64>,
    ) -> Result<i64, KindlyError> {
        if embedding.is_empty() {
            return Err(KindlyError::Internal(
                "refusing to store a summary without an embedding".into(),
            ));
        }
        // Two batches may summarize to the same text; the covered sources
        // keep their fingerprints distinct.
        let candidate = Candidate {
            user_id,
            content: content.trim().to_string(),
            kind: MemoryKind::Summary,
            importance: self.config.summary_importance,
            fingerprint: fingerprint(&format!("{content}\u{0}{source_ids:?}")),
            source_ids,
            metadata: serde_json::json!({ "covered_memory_ids": covered_memory_ids }),
            created_at: Utc::now(),
        };
        self.db
            .connection()
            .call(move |conn| -> Result<i64, rusqlite::Error> {
                insert_row(conn, &candidate, &vec_to_blob(&embedding))
            })
            .await
            .map_err(map_tr_err)
    }

    /// Cosine-ranked search over one user's memories of the given kinds.
    ///
    /// Results below `similarity_floor` (the configured floor when `None`)
    /// are excluded. Equal similarity breaks toward higher importance, then
    /// the newer memory.
    pub async fn search(
        &self,
        user_id: UserId,
        query_embedding: &[f32],
        kinds: &[MemoryKind],
        limit: usize,
        similarity_floor: Option<f32>,
    ) -> Result<Vec<ScoredMemory>, KindlyError> {
        self.search_excluding(user_id, query_embedding, kinds, limit, similarity_floor, None)
            .await
    }

    /// [`search`](Self::search), skipping every memory derived from
    /// `exclude_message`.
    ///
    /// Used while answering a message: background indexing may already have
    /// stored that message, and it must not come back as evidence for itself.
    pub async fn search_excluding(
        &self,
        user_id: UserId,
        query_embedding: &[f32],
        kinds: &[MemoryKind],
        limit: usize,
        similarity_floor: Option<f32>,
        exclude_message: Option<i64>,
    ) -> Result<Vec<ScoredMemory>, KindlyError> {
        if limit == 0 || kinds.is_empty() || query_embedding.is_empty() {
            return Ok(Vec::new());
        }
        let floor = f64::from(similarity_floor.unwrap_or(self.config.similarity_floor));
        let blob = vec_to_blob(query_embedding);
        let kinds = kinds_json(kinds);

        self.db
            .connection()
            .call(move |conn| -> Result<Vec<ScoredMemory>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MEMORY_COLUMNS}, similarity FROM (
                         SELECT *, 1.0 - vec_distance_cosine(embedding, ?2) AS similarity
                         FROM memories
                         WHERE user_id = ?1
                           AND kind IN (SELECT value FROM json_each(?3))
                           AND length(embedding) = length(?2)
                           AND (?6 IS NULL OR NOT EXISTS (
                               SELECT 1 FROM json_each(memories.source_ids) WHERE value = ?6
                           ))
                     )
                     WHERE similarity >= ?4
                     ORDER BY similarity DESC, importance DESC, id DESC
                     LIMIT ?5"
                ))?;
                let rows = stmt.query_map(
                    params![user_id, blob, kinds, floor, limit as i64, exclude_message],
                    |row| {
                        let similarity: f64 = row.get(11)?;
                        Ok(ScoredMemory {
                            memory: row_to_memory(row)?,
                            similarity: similarity as f32,
                        })
                    },
                )?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Embed `query` and search. Embedding failure degrades to no results.
    pub async fn search_text(
        &self,
        user_id: UserId,
        query: &str,
        kinds: &[MemoryKind],
        limit: usize,
    ) -> Vec<ScoredMemory> {
        let embedding = match self.embed(query).await {
            Ok(e) => e,
            Err(e) => {
                warn!(user_id, error = %e, "query embedding failed, returning no memories");
                return Vec::new();
            }
        };
        self.search(user_id, &embedding, kinds, limit, None)
            .await
            .unwrap_or_else(|e| {
                warn!(user_id, error = %e, "memory search failed");
                Vec::new()
            })
    }

    /// Raw snippets not covered by any summary, oldest first.
    ///
    /// A snippet is covered when every message id it was derived from
    /// appears in the source set of some summary of the same user.
    pub async fn uncovered_snippets(&self, user_id: UserId) -> Result<Vec<Memory>, KindlyError> {
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<Memory>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MEMORY_COLUMNS} FROM memories s
                     WHERE s.user_id = ?1 AND s.kind = 'raw_snippet'
                       AND EXISTS (
                           SELECT 1 FROM json_each(s.source_ids) sid
                           WHERE sid.value NOT IN (
                               SELECT j.value FROM memories m, json_each(m.source_ids) j
                               WHERE m.user_id = ?1 AND m.kind = 'summary'
                           )
                       )
                     ORDER BY s.created_at ASC, s.id ASC"
                ))?;
                let rows = stmt.query_map(params![user_id], row_to_memory)?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    /// All memories of a user and kind, newest first.
    pub async fn list_by_kind(
        &self,
        user_id: UserId,
        kind: MemoryKind,
    ) -> Result<Vec<Memory>, KindlyError> {
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<Memory>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MEMORY_COLUMNS} FROM memories
                     WHERE user_id = ?1 AND kind = ?2
                     ORDER BY id DESC"
                ))?;
                let rows = stmt.query_map(params![user_id, kind.to_string()], row_to_memory)?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Monotonically advance the user's indexing watermark.
    pub async fn advance_watermark(
        &self,
        user_id: UserId,
        up_to_message_id: i64,
    ) -> Result<i64, KindlyError> {
        users::advance_watermark(&self.db, user_id, up_to_message_id).await
    }
}

fn kinds_json(kinds: &[MemoryKind]) -> String {
    serde_json::Value::from(kinds.iter().map(|k| k.to_string()).collect::<Vec<_>>()).to_string()
}

fn insert_row(
    conn: &rusqlite::Connection,
    c: &Candidate,
    embedding_blob: &[u8],
) -> Result<i64, rusqlite::Error> {
    let now = format_ts(Utc::now());
    conn.execute(
        "INSERT INTO memories
             (user_id, content, embedding, kind, importance, fingerprint, source_ids, metadata, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            c.user_id,
            c.content,
            embedding_blob,
            c.kind.to_string(),
            f64::from(c.importance),
            c.fingerprint,
            serde_json::Value::from(c.source_ids.clone()).to_string(),
            c.metadata.to_string(),
            format_ts(c.created_at),
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn row_to_memory(row: &Row<'_>) -> Result<Memory, rusqlite::Error> {
    let blob: Vec<u8> = row.get(3)?;
    let kind: String = row.get(4)?;
    let importance: f64 = row.get(5)?;
    let source_ids: String = row.get(7)?;
    let metadata: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    Ok(Memory {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        embedding: blob_to_vec(&blob),
        kind: kind.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        importance: importance as f32,
        fingerprint: row.get(6)?,
        source_ids: parse_json(7, &source_ids)?,
        metadata: parse_json(8, &metadata)?,
        created_at: parse_ts(9, &created_at)?,
        updated_at: parse_ts(10, &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindly_core::MessageType;
    use kindly_storage::queries::messages::{NewMessage, insert_message};
    use kindly_test_utils::MockEmbedder;

    async fn setup(embedder: Arc<MockEmbedder>) -> MemoryStore {
        let db = Database::open_in_memory().await.unwrap();
        MemoryStore::new(db, embedder, MemoryConfig::default())
    }

    #[tokio::test]
    async fn same_fact_twice_is_stored_once() {
        let store = setup(Arc::new(MockEmbedder::new())).await;
        let first = store
            .store_fact(1, "User loves hiking", MemoryKind::Preference, 0.9, vec![10])
            .await
            .unwrap();
        let second = store
            .store_fact(1, "user loves hiking!", MemoryKind::Preference, 0.8, vec![11])
            .await
            .unwrap();

        assert!(matches!(first, StoreOutcome::Stored(_)));
        assert_eq!(second, StoreOutcome::Skipped(SkipReason::DuplicateFingerprint));
        assert_eq!(
            store.list_by_kind(1, MemoryKind::Preference).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn paraphrase_above_threshold_is_rejected() {
        let embedder = Arc::new(
            MockEmbedder::new()
                .with_embedding("User's sister Maria was promoted", vec![1.0, 0.0, 0.0])
                .with_embedding("Maria, the user's sister, got a promotion", vec![0.98, 0.1, 0.0]),
        );
        let store = setup(embedder).await;
        store
            .store_fact(1, "User's sister Maria was promoted", MemoryKind::Person, 0.9, vec![1])
            .await
            .unwrap();
        let outcome = store
            .store_fact(
                1,
                "Maria, the user's sister, got a promotion",
                MemoryKind::Event,
                0.9,
                vec![2],
            )
            .await
            .unwrap();
        assert_eq!(outcome, StoreOutcome::Skipped(SkipReason::NearDuplicate));
    }

    #[tokio::test]
    async fn dedup_is_per_user() {
        let store = setup(Arc::new(MockEmbedder::new())).await;
        let a = store
            .store_fact(1, "Has a cat named Tom", MemoryKind::Fact, 0.9, vec![])
            .await
            .unwrap();
        let b = store
            .store_fact(2, "Has a cat named Tom", MemoryKind::Fact, 0.9, vec![])
            .await
            .unwrap();
        assert!(a.id().is_some());
        assert!(b.id().is_some());
    }

    #[tokio::test]
    async fn embedding_failure_stores_nothing() {
        let embedder = Arc::new(MockEmbedder::new());
        let store = setup(embedder.clone()).await;
        embedder.set_failing(true);
        let result = store
            .store_fact(1, "Works as a nurse", MemoryKind::Fact, 0.9, vec![])
            .await;
        assert!(result.is_err());

        embedder.set_failing(false);
        assert!(store.list_by_kind(1, MemoryKind::Fact).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_never_crosses_users() {
        let embedder = Arc::new(
            MockEmbedder::new()
                .with_embedding("mine: likes tea", vec![0.6, 0.8, 0.0])
                .with_embedding("theirs: likes coffee", vec![1.0, 0.0, 0.0]),
        );
        let store = setup(embedder).await;
        store
            .store_fact(1, "mine: likes tea", MemoryKind::Preference, 0.9, vec![])
            .await
            .unwrap();
        store
            .store_fact(2, "theirs: likes coffee", MemoryKind::Preference, 0.9, vec![])
            .await
            .unwrap();

        let hits = store
            .search(1, &[1.0, 0.0, 0.0], &MemoryKind::fact_kinds(), 10, Some(0.0))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|h| h.memory.user_id == 1));
    }

    #[tokio::test]
    async fn search_applies_floor_kinds_and_tie_break() {
        let embedder = Arc::new(
            MockEmbedder::new()
                .with_embedding("fact a", vec![1.0, 0.0])
                .with_embedding("fact b", vec![0.0, 1.0])
                .with_embedding("snippet", vec![1.0, 0.0]),
        );
        let db = Database::open_in_memory().await.unwrap();
        let mut config = MemoryConfig::default();
        // allow identical vectors across classes and within the fact class
        config.dedup_similarity = 1.1;
        let store = MemoryStore::new(db.clone(), embedder, config);

        let a = store
            .store_fact(1, "fact a", MemoryKind::Fact, 0.9, vec![])
            .await
            .unwrap()
            .id()
            .unwrap();
        store
            .store_fact(1, "fact b", MemoryKind::Fact, 0.9, vec![])
            .await
            .unwrap();
        let msg = insert_message(&db, NewMessage::new(1, MessageType::UserText, "snippet"))
            .await
            .unwrap();
        store.store_raw_snippet(&msg).await.unwrap();

        let facts = store
            .search(1, &[1.0, 0.0], &[MemoryKind::Fact], 10, None)
            .await
            .unwrap();
        assert_eq!(facts.len(), 1, "orthogonal fact is below the floor");
        assert_eq!(facts[0].memory.id, a);

        // Same similarity: the fact (importance 1.0) ranks above the snippet (0.5).
        let mixed = store
            .search(1, &[1.0, 0.0], &[MemoryKind::Fact, MemoryKind::RawSnippet], 10, None)
            .await
            .unwrap();
        assert_eq!(mixed.len(), 2);
        assert_eq!(mixed[0].memory.kind, MemoryKind::Fact);
        assert_eq!(mixed[1].memory.kind, MemoryKind::RawSnippet);
    }

    #[tokio::test]
    async fn search_excluding_skips_memories_of_that_message() {
        let embedder = Arc::new(
            MockEmbedder::new()
                .with_embedding("Did my sister call back", vec![1.0, 0.0])
                .with_embedding("My sister promised to call", vec![0.7, 0.7]),
        );
        let store = setup(embedder).await;
        let db = store.database().clone();

        let earlier = insert_message(&db, NewMessage::new(1, MessageType::UserText, "My sister promised to call"))
            .await
            .unwrap();
        let current = insert_message(&db, NewMessage::new(1, MessageType::UserText, "Did my sister call back"))
            .await
            .unwrap();
        store.store_raw_snippet(&earlier).await.unwrap();
        store.store_raw_snippet(&current).await.unwrap();

        let all = store
            .search(1, &[1.0, 0.0], &[MemoryKind::RawSnippet], 10, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let hits = store
            .search_excluding(1, &[1.0, 0.0], &[MemoryKind::RawSnippet], 10, None, Some(current.id))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.source_ids, vec![earlier.id]);
    }

    #[tokio::test]
    async fn search_text_degrades_to_empty_on_embedding_failure() {
        let embedder = Arc::new(MockEmbedder::new());
        let store = setup(embedder.clone()).await;
        store
            .store_fact(1, "Runs every morning", MemoryKind::Fact, 0.9, vec![])
            .await
            .unwrap();
        embedder.set_failing(true);
        let hits = store
            .search_text(1, "Runs every morning", &MemoryKind::fact_kinds(), 5)
            .await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn raw_snippet_keeps_message_time_and_source() {
        let store = setup(Arc::new(MockEmbedder::new())).await;
        let mut new = NewMessage::new(4, MessageType::UserVoice, "Went to the sea today");
        new.created_at = Utc::now() - chrono::Duration::hours(30);
        let msg = insert_message(store.database(), new).await.unwrap();

        let id = store.store_raw_snippet(&msg).await.unwrap().id().unwrap();
        let snippets = store.uncovered_snippets(4).await.unwrap();
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].id, id);
        assert_eq!(snippets[0].source_ids, vec![msg.id]);
        assert_eq!(snippets[0].importance, 0.5);
        assert_eq!(
            snippets[0].created_at.timestamp_millis(),
            msg.created_at.timestamp_millis()
        );

        // Re-indexing the same message is a no-op.
        assert_eq!(
            store.store_raw_snippet(&msg).await.unwrap(),
            StoreOutcome::Skipped(SkipReason::DuplicateFingerprint)
        );
    }

    #[tokio::test]
    async fn summary_covers_its_sources() {
        let store = setup(Arc::new(MockEmbedder::new())).await;
        let mut ids = Vec::new();
        for text in ["Baked bread with grandma", "Saw a rainbow on the way home"] {
            let msg = insert_message(store.database(), NewMessage::new(2, MessageType::UserText, text))
                .await
                .unwrap();
            store.store_raw_snippet(&msg).await.unwrap();
            ids.push(msg.id);
        }
        assert_eq!(store.uncovered_snippets(2).await.unwrap().len(), 2);

        store
            .insert_summary(2, "Cozy day with family and a rainbow", vec![0.5, 0.5], vec![ids[0]], vec![])
            .await
            .unwrap();
        let left = store.uncovered_snippets(2).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].source_ids, vec![ids[1]]);
    }

    #[tokio::test]
    async fn summary_without_embedding_is_refused() {
        let store = setup(Arc::new(MockEmbedder::new())).await;
        assert!(store.insert_summary(1, "x", vec![], vec![1], vec![]).await.is_err());
    }

    #[tokio::test]
    async fn store_fact_rejects_snippet_kind() {
        let store = setup(Arc::new(MockEmbedder::new())).await;
        assert!(
            store
                .store_fact(1, "text", MemoryKind::RawSnippet, 1.0, vec![])
                .await
                .is_err()
        );
    }
}
