// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Positive moments: written by the moments service, searched during retrieval.

use chrono::{DateTime, Utc};
use kindly_core::{KindlyError, Moment, UserId};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{ScoredMoment, format_ts, parse_json, parse_ts, vec_to_blob};

/// A moment about to be recorded.
#[derive(Debug, Clone)]
pub struct NewMoment {
    pub user_id: UserId,
    pub content: String,
    pub embedding: Vec<f32>,
    pub mood_score: Option<f32>,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Record a moment and return its id.
pub async fn insert_moment(db: &Database, moment: NewMoment) -> Result<i64, KindlyError> {
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            let topics = serde_json::Value::from(moment.topics).to_string();
            conn.execute(
                "INSERT INTO moments (user_id, content, embedding, mood_score, topics, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    moment.user_id,
                    moment.content,
                    vec_to_blob(&moment.embedding),
                    moment.mood_score,
                    topics,
                    format_ts(moment.created_at),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Moments of `user_id` ordered by cosine similarity to `query`, highest first.
///
/// Rows below `min_similarity` or with a different embedding dimension are
/// excluded. Ties go to the newer moment.
pub async fn search_moments(
    db: &Database,
    user_id: UserId,
    query: &[f32],
    limit: usize,
    min_similarity: f32,
) -> Result<Vec<ScoredMoment>, KindlyError> {
    if limit == 0 || query.is_empty() {
        return Ok(Vec::new());
    }
    let query_blob = vec_to_blob(query);
    db.connection()
        .call(move |conn| -> Result<Vec<ScoredMoment>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, content, mood_score, topics, created_at, similarity FROM (
                     SELECT *, 1.0 - vec_distance_cosine(embedding, ?2) AS similarity
                     FROM moments
                     WHERE user_id = ?1 AND length(embedding) = length(?2)
                 )
                 WHERE similarity >= ?3
                 ORDER BY similarity DESC, id DESC
                 LIMIT ?4",
            )?;
            let rows = stmt.query_map(
                params![user_id, query_blob, min_similarity as f64, limit as i64],
                |row| {
                    let topics: String = row.get(4)?;
                    let created_at: String = row.get(5)?;
                    let similarity: f64 = row.get(6)?;
                    Ok(ScoredMoment {
                        moment: Moment {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            content: row.get(2)?,
                            mood_score: row.get::<_, Option<f64>>(3)?.map(|v| v as f32),
                            topics: parse_json(4, &topics)?,
                            created_at: parse_ts(5, &created_at)?,
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
