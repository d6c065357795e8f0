// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System-wide knowledge chunks (not user-scoped).

use kindly_core::{KindlyError, KnowledgeChunk};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{ScoredChunk, vec_to_blob};

/// Insert or replace the chunk at (`document`, `chunk_index`). Returns its id.
pub async fn upsert_chunk(
    db: &Database,
    document: &str,
    chunk_index: i64,
    content: &str,
    embedding: &[f32],
) -> Result<i64, KindlyError> {
    let document = document.to_string();
    let content = content.to_string();
    let blob = vec_to_blob(embedding);
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "INSERT INTO knowledge_chunks (document, chunk_index, content, embedding)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(document, chunk_index) DO UPDATE SET
                     content = excluded.content,
                     embedding = excluded.embedding
                 RETURNING id",
                params![document, chunk_index, content, blob],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Chunks ordered by cosine similarity to `query`, highest first.
pub async fn search_knowledge(
    db: &Database,
    query: &[f32],
    limit: usize,
    min_similarity: f32,
) -> Result<Vec<ScoredChunk>, KindlyError> {
    if limit == 0 || query.is_empty() {
        return Ok(Vec::new());
    }
    let query_blob = vec_to_blob(query);
    db.connection()
        .call(move |conn| -> Result<Vec<ScoredChunk>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, document, chunk_index, content, similarity FROM (
                     SELECT *, 1.0 - vec_distance_cosine(embedding, ?1) AS similarity
                     FROM knowledge_chunks
                     WHERE length(embedding) = length(?1)
                 )
                 WHERE similarity >= ?2
                 ORDER BY similarity DESC, id ASC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(
                params![query_blob, min_similarity as f64, limit as i64],
                |row| {
                    let similarity: f64 = row.get(4)?;
                    Ok(ScoredChunk {
                        chunk: KnowledgeChunk {
                            id: row.get(0)?,
                            document: row.get(1)?,
                            chunk_index: row.get(2)?,
                            content: row.get(3)?,
                        },
                        similarity: similarity as f32,
                    })
                },
            )?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
