// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Kindly pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier of the user owning messages, memories, and moments.
pub type UserId = i64;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Embedding,
    Storage,
}

// --- Provider types ---

/// Role of a message sent to the generation capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single turn in a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
}

impl ProviderMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A request to the text generation capability.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    /// Model override; adapters use their configured model when `None`.
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub messages: Vec<ProviderMessage>,
    pub max_tokens: u32,
    /// Sampling temperature; adapters use their configured default when `None`.
    pub temperature: Option<f32>,
    /// Ask the provider for a JSON-only answer where supported.
    pub json_output: bool,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A response from the text generation capability.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub id: String,
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}

// --- Embedding types ---

/// Input for embedding generation.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    pub texts: Vec<String>,
}

/// Output from embedding generation, one vector per input text.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
}

// --- Conversation log types ---

/// Tag of an entry in the append-only message log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
    /// Typed user message.
    UserText,
    /// Transcribed voice message.
    UserVoice,
    /// Reply produced by the bot.
    BotReply,
}

impl MessageType {
    /// Only user-authored messages are indexed into memory.
    pub fn is_user_authored(self) -> bool {
        matches!(self, Self::UserText | Self::UserVoice)
    }
}

/// An immutable row of the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub user_id: UserId,
    pub message_type: MessageType,
    pub content: String,
    /// JSON metadata, e.g. the retrieval sources behind a bot reply.
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A user-reported positive experience, retrieved as a context source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moment {
    pub id: i64,
    pub user_id: UserId,
    pub content: String,
    pub mood_score: Option<f32>,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A system-wide passage from a reference document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: i64,
    pub document: String,
    pub chunk_index: i64,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        assert_eq!(Role::User.to_string(), "user");
    }

    #[test]
    fn message_type_serde_matches_display() {
        let json = serde_json::to_string(&MessageType::UserVoice).unwrap();
        assert_eq!(json, format!("\"{}\"", MessageType::UserVoice));
    }

    #[test]
    fn provider_request_default_is_empty() {
        let req = ProviderRequest::default();
        assert!(req.messages.is_empty());
        assert!(req.temperature.is_none());
        assert!(!req.json_output);
    }
}
