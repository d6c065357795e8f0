// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory domain types.

use chrono::{DateTime, Utc};
use kindly_core::UserId;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// What a memory represents.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MemoryKind {
    Fact,
    Preference,
    Person,
    Project,
    Plan,
    Constraint,
    Achievement,
    Event,
    /// Verbatim qualifying user message.
    RawSnippet,
    /// Compressed batch of raw snippets.
    Summary,
}

impl MemoryKind {
    /// Kinds produced by fact extraction.
    pub fn fact_kinds() -> Vec<MemoryKind> {
        MemoryKind::iter().filter(|k| k.is_fact()).collect()
    }

    pub fn is_fact(self) -> bool {
        !matches!(self, Self::RawSnippet | Self::Summary)
    }

    /// Kinds a new memory of this kind is compared against for near-duplicates.
    pub fn dedup_class(self) -> Vec<MemoryKind> {
        match self {
            Self::RawSnippet => vec![Self::RawSnippet],
            Self::Summary => vec![Self::Summary],
            _ => Self::fact_kinds(),
        }
    }
}

/// A durable, user-scoped unit of retrievable knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub user_id: UserId,
    pub content: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub kind: MemoryKind,
    pub importance: f32,
    pub fingerprint: String,
    /// Message ids this memory was derived from.
    pub source_ids: Vec<i64>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A memory with its cosine similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub similarity: f32,
}

/// A fact returned by the extractor, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFact {
    pub content: String,
    pub kind: MemoryKind,
    pub confidence: f32,
}

/// Why a memory write was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// Same normalized content already stored for this user.
    DuplicateFingerprint,
    /// An existing memory of the same class is at or above the similarity threshold.
    NearDuplicate,
    /// Nothing left after trimming.
    EmptyContent,
}

/// Result of a memory write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored(i64),
    Skipped(SkipReason),
}

impl StoreOutcome {
    pub fn id(self) -> Option<i64> {
        match self {
            Self::Stored(id) => Some(id),
            Self::Skipped(_) => None,
        }
    }
}

/// Cosine similarity of two vectors; 0.0 for mismatched lengths or zero norms.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}
