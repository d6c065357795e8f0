// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Kindly pipeline.

use thiserror::Error;

/// The primary error type used across all Kindly crates.
///
/// Public pipeline operations convert these into their documented fallback
/// values at the boundary; internal helpers propagate them with `?`.
#[derive(Debug, Error)]
pub enum KindlyError {
    /// Configuration errors (invalid values, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Text generation provider errors (API failure, malformed response).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Embedding capability errors (API failure, empty or mis-sized vector).
    #[error("embedding error: {0}")]
    Embedding(String),

    /// An external call exceeded its time bound.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KindlyError {
    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any storage-layer error.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// True for failures of an external capability (generation, embedding, timeouts).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::Embedding(_) | Self::Timeout { .. }
        )
    }
}
