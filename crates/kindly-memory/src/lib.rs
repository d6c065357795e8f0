// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable, user-scoped memory for the Kindly companion.
//!
//! ## Architecture
//!
//! - **FactExtractor**: deterministic noise filter, then LLM extraction of
//!   explicitly stated personal facts
//! - **MemoryStore**: fingerprint and vector-similarity dedup, per-user
//!   vector search over facts, raw snippets, and summaries
//! - **MemoryCompressor**: folds batches of raw snippets into summaries
//! - **MessageIndexer**: per-message indexing and the watermark batch job
//! - **IndexQueue**: bounded, user-sharded background indexing workers

pub mod compressor;
pub mod extractor;
pub mod fingerprint;
pub mod indexer;
pub mod queue;
pub mod store;
pub mod types;

pub use compressor::MemoryCompressor;
pub use extractor::FactExtractor;
pub use indexer::{BatchReport, MessageIndexer};
pub use queue::IndexQueue;
pub use store::MemoryStore;
pub use types::*;
