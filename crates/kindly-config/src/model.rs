// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Kindly configuration.
///
/// Every section is optional and defaults to the values the pipeline was
/// tuned with.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KindlyConfig {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Generation and embedding endpoint settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Fact extraction and memory store settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Raw-snippet compression triggers.
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Background indexing queue and batch job settings.
    #[serde(default)]
    pub indexer: IndexerConfig,

    /// Retrieval orchestrator limits and budget.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Anti-repetition guard settings.
    #[serde(default)]
    pub repetition: RepetitionConfig,
}

/// Process identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "kindly".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("kindly").join("kindly.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("kindly.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// OpenAI-compatible endpoint used for both generation and embeddings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key. `None` falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Maximum tokens for a generated reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature for first-attempt replies.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_max_tokens() -> u32 {
    600
}

fn default_temperature() -> f32 {
    0.7
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Fact extraction and memory store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Messages shorter than this (in characters, after trimming) are noise.
    #[serde(default = "default_min_message_chars")]
    pub min_message_chars: usize,

    #[serde(default = "default_max_facts_per_message")]
    pub max_facts_per_message: usize,

    /// Cosine similarity at or above which a new memory is a near-duplicate.
    #[serde(default = "default_dedup_similarity")]
    pub dedup_similarity: f32,

    /// Search results below this cosine similarity are dropped.
    #[serde(default = "default_similarity_floor")]
    pub similarity_floor: f32,

    #[serde(default = "default_fact_importance")]
    pub fact_importance: f32,

    #[serde(default = "default_raw_snippet_importance")]
    pub raw_snippet_importance: f32,

    #[serde(default = "default_summary_importance")]
    pub summary_importance: f32,

    /// Time bound for each extraction or embedding call, in seconds.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            min_message_chars: default_min_message_chars(),
            max_facts_per_message: default_max_facts_per_message(),
            dedup_similarity: default_dedup_similarity(),
            similarity_floor: default_similarity_floor(),
            fact_importance: default_fact_importance(),
            raw_snippet_importance: default_raw_snippet_importance(),
            summary_importance: default_summary_importance(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

fn default_min_message_chars() -> usize {
    12
}

fn default_max_facts_per_message() -> usize {
    3
}

fn default_dedup_similarity() -> f32 {
    0.92
}

fn default_similarity_floor() -> f32 {
    0.40
}

fn default_fact_importance() -> f32 {
    1.0
}

fn default_raw_snippet_importance() -> f32 {
    0.5
}

fn default_summary_importance() -> f32 {
    1.5
}

fn default_call_timeout_secs() -> u64 {
    20
}

/// Raw-snippet compression triggers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompressionConfig {
    /// Uncovered snippet count that triggers a summary regardless of age.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Minimum uncovered count for the age trigger.
    #[serde(default = "default_min_batch")]
    pub min_batch: usize,

    /// Age of the oldest uncovered snippet that arms the age trigger.
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            min_batch: default_min_batch(),
            max_age_hours: default_max_age_hours(),
        }
    }
}

fn default_batch_size() -> usize {
    12
}

fn default_min_batch() -> usize {
    8
}

fn default_max_age_hours() -> u64 {
    24
}

/// Background indexing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IndexerConfig {
    /// Number of index workers (user shards).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Pending jobs per worker before new jobs are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Messages read per page by the watermark batch job.
    #[serde(default = "default_index_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            batch_size: default_index_batch_size(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_workers() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    256
}

fn default_index_batch_size() -> usize {
    100
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

/// Retrieval orchestrator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Upper bound on the summed content length of a context block.
    #[serde(default = "default_char_budget")]
    pub char_budget: usize,

    /// Each rendered item is truncated to this many characters.
    #[serde(default = "default_item_char_cap")]
    pub item_char_cap: usize,

    /// Full limit for positive moments.
    #[serde(default = "default_moments_limit")]
    pub moments_limit: usize,

    /// Full limit for knowledge chunks.
    #[serde(default = "default_knowledge_limit")]
    pub knowledge_limit: usize,

    #[serde(default = "default_recency_max_boost")]
    pub recency_max_boost: f32,

    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: u32,

    /// Locales whose "remember" phrases are matched before classification.
    #[serde(default = "default_locales")]
    pub locales: Vec<String>,

    /// Time bound for each classifier or embedding call, in seconds.
    #[serde(default = "default_call_timeout_secs_retrieval")]
    pub call_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            char_budget: default_char_budget(),
            item_char_cap: default_item_char_cap(),
            moments_limit: default_moments_limit(),
            knowledge_limit: default_knowledge_limit(),
            recency_max_boost: default_recency_max_boost(),
            recency_window_days: default_recency_window_days(),
            locales: default_locales(),
            call_timeout_secs: default_call_timeout_secs_retrieval(),
        }
    }
}

fn default_char_budget() -> usize {
    4500
}

fn default_item_char_cap() -> usize {
    600
}

fn default_moments_limit() -> usize {
    5
}

fn default_knowledge_limit() -> usize {
    5
}

fn default_recency_max_boost() -> f32 {
    0.05
}

fn default_recency_window_days() -> u32 {
    7
}

fn default_locales() -> Vec<String> {
    vec!["en".to_string(), "ru".to_string()]
}

fn default_call_timeout_secs_retrieval() -> u64 {
    10
}

/// Anti-repetition guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RepetitionConfig {
    /// Number of recent bot replies compared against.
    #[serde(default = "default_window")]
    pub window: usize,

    /// Maximum cosine similarity at or above which a reply is repetitive.
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Total generation attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Sampling temperature for regenerated replies.
    #[serde(default = "default_retry_temperature")]
    pub retry_temperature: f32,
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            threshold: default_threshold(),
            max_attempts: default_max_attempts(),
            retry_temperature: default_retry_temperature(),
        }
    }
}

fn default_window() -> usize {
    10
}

fn default_threshold() -> f32 {
    0.85
}

fn default_max_attempts() -> usize {
    2
}

fn default_retry_temperature() -> f32 {
    1.0
}
