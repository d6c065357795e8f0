// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval for the Kindly companion.
//!
//! A query is classified (remember, personal, advice, general), then
//! searched across the user's memories, their positive moments, and shared
//! knowledge chunks with per-type limits. Results are recency-boosted,
//! trimmed to a character budget, and rendered as a [`ContextBlock`].
//! Remember-queries never draw on knowledge chunks.

pub mod block;
pub mod budget;
pub mod classifier;
pub mod locale;
pub mod orchestrator;
pub mod recency;

pub use block::{ContextBlock, ContextSection, REMEMBER_DIRECTIVE};
pub use budget::{ContextItem, ContextSource, Retrieved, enforce_budget};
pub use classifier::{QueryClassifier, QueryType};
pub use locale::RememberMatcher;
pub use orchestrator::{RetrievalOrchestrator, SearchPlan};
