// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row models and column encoding helpers shared by the query modules.

use chrono::{DateTime, SecondsFormat, Utc};
use kindly_core::{KnowledgeChunk, Moment};

/// Encode an embedding as a little-endian `f32` BLOB (the sqlite-vec format).
pub fn vec_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a little-endian `f32` BLOB. Trailing bytes that do not form a
/// whole `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Canonical timestamp text: RFC 3339, UTC, millisecond precision.
///
/// Fixed width, so lexicographic order equals chronological order in SQL.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp column, mapping failures into a rusqlite conversion error.
pub fn parse_ts(idx: usize, text: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parse a JSON text column.
pub fn parse_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    text: &str,
) -> Result<T, rusqlite::Error> {
    serde_json::from_str(text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// A positive moment paired with its (possibly boosted) cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMoment {
    pub moment: Moment,
    pub similarity: f32,
}

/// A knowledge chunk paired with its cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: KnowledgeChunk,
    pub similarity: f32,
}
