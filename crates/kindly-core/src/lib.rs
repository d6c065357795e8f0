// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Kindly companion memory pipeline.
//!
//! This crate provides the error type, the adapter traits for the two external
//! capabilities the pipeline consumes (text generation and text embedding),
//! and the domain types shared by storage, memory, retrieval, and agent crates.

pub mod error;
pub mod timeout;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::KindlyError;
pub use types::{
    AdapterType, HealthStatus, KnowledgeChunk, Message, MessageType, Moment, UserId,
};

// Re-export all adapter traits at crate root.
pub use traits::{EmbeddingAdapter, PluginAdapter, ProviderAdapter, embed_one};
