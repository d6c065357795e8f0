// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::KindlyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Adapter for generating fixed-length vector embeddings from text.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    /// Generates one embedding per input text, in input order.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, KindlyError>;
}

/// Embeds a single text and returns its vector.
///
/// Fails with [`KindlyError::Embedding`] when the adapter returns no vector
/// or an empty one.
pub async fn embed_one<E>(embedder: &E, text: &str) -> Result<Vec<f32>, KindlyError>
where
    E: EmbeddingAdapter + ?Sized,
{
    let output = embedder
        .embed(EmbeddingInput {
            texts: vec![text.to_string()],
        })
        .await?;

    match output.embeddings.into_iter().next() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(KindlyError::Embedding(
            "embedding adapter returned no vector".into(),
        )),
    }
}
