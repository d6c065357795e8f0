// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Kindly unit and integration tests.
//!
//! Provides deterministic stand-ins for the external capabilities and a
//! harness backed by a temporary SQLite file.
//!
//! # Components
//!
//! - [`MockProvider`] - generation with rules, a FIFO queue, and failure injection
//! - [`MockEmbedder`] - hashed bag-of-words embeddings with per-text overrides
//! - [`TestHarness`] - temp database plus both mocks

pub mod harness;
pub mod mock_embedder;
pub mod mock_provider;

pub use harness::TestHarness;
pub use mock_embedder::{DIMENSIONS, MockEmbedder, basis};
pub use mock_provider::MockProvider;
