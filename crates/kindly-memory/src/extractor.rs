// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fact extraction from single user messages.
//!
//! A deterministic, stateless pre-filter rejects noise before any network
//! call. Surviving messages go to the generation capability, which must
//! return a JSON array of explicitly stated facts. Provider errors,
//! timeouts, and malformed output all yield an empty list.

use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use kindly_config::model::MemoryConfig;
use kindly_core::timeout::bounded;
use kindly_core::types::{ProviderMessage, ProviderRequest};
use kindly_core::ProviderAdapter;
use regex::Regex;
use serde::Deserialize;
use strum::Display;
use tracing::{debug, warn};

use crate::types::{ExtractedFact, MemoryKind};

/// Single acknowledgement words and short stock replies, in every supported language.
static ACKNOWLEDGEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(ok(ay)?|k|kk|thanks?|thank you( so much)?|thx|ty|lol|lmao|haha+|hehe+|yes|yeah|yep|yup|no|nope|sure|cool|nice|great|good|fine|alright|hmm+|wow|ок|окей|хорошо|спасибо|да|нет|ага|угу|понятно|ясно|ладно|класс|супер)[\s\p{P}\p{S}]*$",
    )
    .expect("acknowledgement pattern is valid")
});

const EXTRACTION_PROMPT: &str = r#"You are a fact extractor for a supportive companion app.
Extract only facts the user EXPLICITLY states about themselves or people and things in their life.
Never infer, guess, or generalize. If nothing is explicitly stated, return [].

Return a JSON array (at most {max} items). Each item:
- "content": the fact as a standalone sentence about the user (e.g. "User's dog is named Max")
- "kind": one of fact, preference, person, project, plan, constraint, achievement, event
- "confidence": number between 0 and 1

Output JSON only, no explanation."#;

/// Why a message was rejected before extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum NoiseReason {
    TooShort,
    PunctuationOnly,
    EmojiOnly,
    Acknowledgement,
}

/// Classify `text` as noise, or `None` if it qualifies for indexing.
pub fn noise_reason(text: &str, min_chars: usize) -> Option<NoiseReason> {
    let trimmed = text.trim();
    if !trimmed.chars().any(char::is_alphanumeric) {
        let punctuation_only = trimmed
            .chars()
            .all(|c| c.is_ascii_punctuation() || c.is_whitespace());
        return Some(if punctuation_only {
            NoiseReason::PunctuationOnly
        } else {
            NoiseReason::EmojiOnly
        });
    }
    if ACKNOWLEDGEMENT.is_match(trimmed) {
        return Some(NoiseReason::Acknowledgement);
    }
    if trimmed.chars().count() < min_chars {
        return Some(NoiseReason::TooShort);
    }
    None
}

#[derive(Debug, Deserialize)]
struct RawFact {
    content: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawExtraction {
    List(Vec<RawFact>),
    Wrapped { facts: Vec<RawFact> },
}

/// Parse the model's answer into at most `max` facts.
///
/// Accepts a bare array, an object with a `facts` array, markdown code
/// fences, and surrounding prose. Items with empty content are dropped;
/// unknown or non-fact kinds fall back to `fact`. Anything unparseable
/// yields an empty list.
pub fn parse_extraction_response(response: &str, max: usize) -> Vec<ExtractedFact> {
    let trimmed = response.trim();
    let parsed = serde_json::from_str::<RawExtraction>(trimmed).or_else(|_| {
        let start = trimmed.find('[').unwrap_or(0);
        let end = trimmed.rfind(']').map(|i| i + 1).unwrap_or(trimmed.len());
        serde_json::from_str::<RawExtraction>(trimmed.get(start..end).unwrap_or_default())
    });

    let raw = match parsed {
        Ok(RawExtraction::List(facts)) | Ok(RawExtraction::Wrapped { facts }) => facts,
        Err(e) => {
            warn!(error = %e, "malformed extraction response, treating as nothing extracted");
            debug!(response, "raw extraction response");
            return Vec::new();
        }
    };

    raw.into_iter()
        .filter_map(|f| {
            let content = f.content.trim().to_string();
            if content.is_empty() {
                return None;
            }
            let kind = f
                .kind
                .as_deref()
                .and_then(|k| MemoryKind::from_str(k.trim()).ok())
                .filter(|k| k.is_fact())
                .unwrap_or(MemoryKind::Fact);
            let confidence = f.confidence.unwrap_or(0.5).clamp(0.0, 1.0);
            Some(ExtractedFact {
                content,
                kind,
                confidence,
            })
        })
        .take(max)
        .collect()
}

/// Turns one user utterance into zero to `max_facts_per_message` facts.
pub struct FactExtractor {
    provider: Arc<dyn ProviderAdapter>,
    config: MemoryConfig,
}

impl FactExtractor {
    pub fn new(provider: Arc<dyn ProviderAdapter>, config: MemoryConfig) -> Self {
        Self { provider, config }
    }

    /// Cheap local check run before any network call.
    pub fn prefilter(&self, text: &str) -> Option<NoiseReason> {
        noise_reason(text, self.config.min_message_chars)
    }

    /// Extract facts from message `message_id`. Never fails.
    pub async fn extract(&self, message_id: i64, text: &str) -> Vec<ExtractedFact> {
        if let Some(reason) = self.prefilter(text) {
            debug!(message_id, %reason, "message rejected by pre-filter");
            return Vec::new();
        }

        let max = self.config.max_facts_per_message;
        let request = ProviderRequest {
            system_prompt: Some(EXTRACTION_PROMPT.replace("{max}", &max.to_string())),
            messages: vec![ProviderMessage::user(text)],
            max_tokens: 400,
            temperature: Some(0.0),
            json_output: true,
            ..Default::default()
        };

        let timeout = Duration::from_secs(self.config.call_timeout_secs);
        match bounded(timeout, self.provider.complete(request)).await {
            Ok(response) => {
                let facts = parse_extraction_response(&response.content, max);
                debug!(message_id, count = facts.len(), "facts extracted");
                facts
            }
            Err(e) => {
                warn!(message_id, error = %e, "fact extraction failed, treating as nothing extracted");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindly_test_utils::MockProvider;

    #[test]
    fn prefilter_rejects_noise() {
        assert_eq!(noise_reason("ok", 12), Some(NoiseReason::Acknowledgement));
        assert_eq!(noise_reason("Thank you so much!!!", 12), Some(NoiseReason::Acknowledgement));
        assert_eq!(noise_reason("Спасибо!", 12), Some(NoiseReason::Acknowledgement));
        assert_eq!(noise_reason("?!...", 12), Some(NoiseReason::PunctuationOnly));
        assert_eq!(noise_reason("😂😂🎉", 12), Some(NoiseReason::EmojiOnly));
        assert_eq!(noise_reason("cat food", 12), Some(NoiseReason::TooShort));
    }

    #[test]
    fn prefilter_accepts_real_messages() {
        assert_eq!(
            noise_reason("My sister Maria just got promoted to manager", 12),
            None
        );
        assert_eq!(noise_reason("ok so today I finally ran 10k", 12), None);
    }

    #[test]
    fn prefilter_is_deterministic() {
        let text = "yeah";
        assert_eq!(noise_reason(text, 12), noise_reason(text, 12));
    }

    #[test]
    fn parse_valid_array() {
        let facts = parse_extraction_response(
            r#"[{"content": "User's sister Maria was promoted to manager", "kind": "person", "confidence": 0.9}]"#,
            3,
        );
        assert_eq!(
            facts,
            vec![ExtractedFact {
                content: "User's sister Maria was promoted to manager".into(),
                kind: MemoryKind::Person,
                confidence: 0.9,
            }]
        );
    }

    #[test]
    fn parse_wrapped_fenced_and_prose() {
        let wrapped = parse_extraction_response(r#"{"facts": [{"content": "Likes tea"}]}"#, 3);
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0].kind, MemoryKind::Fact);

        let fenced = parse_extraction_response(
            "```json\n[{\"content\": \"Lives in Berlin\", \"kind\": \"fact\"}]\n```",
            3,
        );
        assert_eq!(fenced[0].content, "Lives in Berlin");

        let prose = parse_extraction_response(
            "Here you go:\n[{\"content\": \"Plans a trip to Rome\", \"kind\": \"plan\"}]\nDone.",
            3,
        );
        assert_eq!(prose[0].kind, MemoryKind::Plan);
    }

    #[test]
    fn parse_caps_and_sanitizes() {
        let response = r#"[
            {"content": "a1", "kind": "summary", "confidence": 4},
            {"content": "  ", "kind": "fact"},
            {"content": "a2", "kind": "nonsense"},
            {"content": "a3"},
            {"content": "a4"}
        ]"#;
        let facts = parse_extraction_response(response, 3);
        assert_eq!(facts.len(), 3);
        assert_eq!(facts[0].kind, MemoryKind::Fact);
        assert_eq!(facts[0].confidence, 1.0);
        assert_eq!(facts[1].content, "a2");
    }

    #[test]
    fn parse_malformed_returns_empty() {
        assert!(parse_extraction_response("I could not find anything.", 3).is_empty());
        assert!(parse_extraction_response("[{\"content\": ", 3).is_empty());
    }

    #[tokio::test]
    async fn noise_never_reaches_provider() {
        let provider = Arc::new(MockProvider::new());
        let extractor = FactExtractor::new(provider.clone(), MemoryConfig::default());
        assert!(extractor.extract(1, "lol").await.is_empty());
        assert_eq!(provider.request_count().await, 0);
    }

    #[tokio::test]
    async fn provider_failure_is_swallowed() {
        let provider = Arc::new(MockProvider::new());
        provider.set_failing(true);
        let extractor = FactExtractor::new(provider.clone(), MemoryConfig::default());
        let facts = extractor
            .extract(501, "My sister Maria just got promoted to manager")
            .await;
        assert!(facts.is_empty());
        assert_eq!(provider.request_count().await, 1);
    }

    #[tokio::test]
    async fn extracts_through_provider() {
        let provider = Arc::new(MockProvider::with_responses(vec![
            r#"[{"content": "User's sister Maria was promoted to manager", "kind": "person", "confidence": 0.9}]"#.into(),
        ]));
        let extractor = FactExtractor::new(provider.clone(), MemoryConfig::default());
        let facts = extractor
            .extract(501, "My sister Maria just got promoted to manager")
            .await;
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].kind, MemoryKind::Person);

        let sent = provider.requests().await;
        assert!(sent[0].json_output);
        assert!(sent[0].system_prompt.as_deref().unwrap().contains("fact extractor"));
    }
}
