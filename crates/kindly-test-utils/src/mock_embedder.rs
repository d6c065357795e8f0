// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic mock embedding adapter.
//!
//! Each lowercase word is hashed into one of [`DIMENSIONS`] buckets, so texts
//! sharing words are similar and unrelated texts are close to orthogonal.
//! Exact-text overrides pin a vector for tests that need precise geometry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use kindly_core::types::{EmbeddingInput, EmbeddingOutput};
use kindly_core::{AdapterType, EmbeddingAdapter, HealthStatus, KindlyError, PluginAdapter};

/// Dimension of generated vectors.
pub const DIMENSIONS: usize = 256;

/// A [`DIMENSIONS`]-long vector with the given `(axis, weight)` entries.
///
/// Handy for pinning embeddings with known cosine relationships.
pub fn basis(weights: &[(usize, f32)]) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMENSIONS];
    for &(axis, weight) in weights {
        v[axis % DIMENSIONS] += weight;
    }
    v
}

pub struct MockEmbedder {
    overrides: HashMap<String, Vec<f32>>,
    failing: AtomicBool,
    calls: AtomicUsize,
    failures: Mutex<Vec<String>>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            overrides: HashMap::new(),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Return `vector` whenever exactly `text` is embedded.
    pub fn with_embedding(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.overrides.insert(text.into(), vector);
        self
    }

    /// Make every call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail only for inputs containing `needle`.
    pub fn fail_on(&self, needle: impl Into<String>) {
        if let Ok(mut f) = self.failures.lock() {
            f.push(needle.into());
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this embedder produces for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.overrides.get(text) {
            return v.clone();
        }
        bag_of_words(text)
    }

    fn should_fail(&self, text: &str) -> bool {
        self.failing.load(Ordering::SeqCst)
            || self
                .failures
                .lock()
                .map(|f| f.iter().any(|needle| text.contains(needle.as_str())))
                .unwrap_or(false)
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMENSIONS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let digest = Sha256::digest(word.to_lowercase().as_bytes());
        let bucket = u16::from_le_bytes([digest[0], digest[1]]) as usize % DIMENSIONS;
        v[bucket] += 1.0;
    }
    // Keep every vector non-zero so cosine distance stays defined.
    v[DIMENSIONS - 1] += 0.01;
    v
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, KindlyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), KindlyError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, KindlyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(bad) = input.texts.iter().find(|t| self.should_fail(t)) {
            return Err(KindlyError::Embedding(format!(
                "mock embedding failure for {} chars",
                bad.len()
            )));
        }
        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.vector_for(t)).collect(),
        })
    }
}
