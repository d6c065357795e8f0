// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply generation with a bounded regeneration loop.

use std::sync::Arc;
use std::time::Duration;

use kindly_config::model::{ProviderConfig, RepetitionConfig};
use kindly_context::ContextBlock;
use kindly_core::timeout::bounded;
use kindly_core::types::{ProviderMessage, ProviderRequest};
use kindly_core::{KindlyError, ProviderAdapter, UserId};
use tracing::{debug, info};

use crate::guard::AntiRepetitionGuard;

const PERSONA_PROMPT: &str = "You are Kindly, a warm and attentive companion. \
Keep replies short and personal, ask at most one question, and never lecture.";

const REPHRASE_INSTRUCTION: &str = "Your previous draft repeated something you already said \
to this user. Phrase this differently: use new wording and a fresh angle.";

/// A generated reply and how it was reached.
#[derive(Debug, Clone)]
pub struct ComposedReply {
    pub text: String,
    /// Generation attempts used, at least 1.
    pub attempts: usize,
    /// Embedding of the accepted reply, when the guard could produce one.
    pub embedding: Option<Vec<f32>>,
}

/// Generates replies in the companion persona and keeps them from echoing
/// the user's recent replies.
///
/// Each generation is bounded by the provider's `request_timeout_secs`.
pub struct ReplyComposer {
    provider: Arc<dyn ProviderAdapter>,
    guard: AntiRepetitionGuard,
    provider_config: ProviderConfig,
    config: RepetitionConfig,
}

impl ReplyComposer {
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        guard: AntiRepetitionGuard,
        provider_config: ProviderConfig,
        config: RepetitionConfig,
    ) -> Self {
        Self {
            provider,
            guard,
            provider_config,
            config,
        }
    }

    /// The repetition guard replies are checked against.
    pub fn guard(&self) -> &AntiRepetitionGuard {
        &self.guard
    }

    /// Generate a reply to `user_text`, regenerating while the draft repeats
    /// a recent reply, up to `max_attempts` in total. The last draft is
    /// accepted once the cap is reached.
    ///
    /// Only a generation failure is an error.
    pub async fn compose(
        &self,
        user_id: UserId,
        user_text: &str,
        context: &ContextBlock,
    ) -> Result<ComposedReply, KindlyError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let text = self.generate(user_text, context, attempt > 1).await?;

            // A failed check reads as fresh and leaves no embedding to store.
            let (repetitive, embedding) = match self.guard.check(user_id, &text).await {
                Ok(check) => (check.repetitive, Some(check.embedding)),
                Err(e) => {
                    debug!(user_id, error = %e, "repetition check unavailable");
                    (false, None)
                }
            };

            if !repetitive || attempt >= max_attempts {
                if repetitive {
                    info!(user_id, attempts = attempt, "accepting repetitive reply at retry cap");
                }
                return Ok(ComposedReply {
                    text,
                    attempts: attempt,
                    embedding,
                });
            }

            metrics::counter!("kindly_reply_regenerations_total").increment(1);
            debug!(user_id, attempt, "reply too similar to a recent one, regenerating");
            attempt += 1;
        }
    }

    async fn generate(
        &self,
        user_text: &str,
        context: &ContextBlock,
        rephrase: bool,
    ) -> Result<String, KindlyError> {
        let mut system = PERSONA_PROMPT.to_string();
        let rendered = context.render();
        if !rendered.is_empty() {
            system.push_str("\n\n");
            system.push_str(&rendered);
        }
        if rephrase {
            system.push_str("\n\n");
            system.push_str(REPHRASE_INSTRUCTION);
        }

        let temperature = if rephrase {
            self.config.retry_temperature
        } else {
            self.provider_config.temperature
        };
        let request = ProviderRequest {
            model: Some(self.provider_config.chat_model.clone()),
            system_prompt: Some(system),
            messages: vec![ProviderMessage::user(user_text)],
            max_tokens: self.provider_config.max_tokens,
            temperature: Some(temperature),
            ..Default::default()
        };
        let timeout = Duration::from_secs(self.provider_config.request_timeout_secs);
        let response = bounded(timeout, self.provider.complete(request)).await?;
        let text = response.content.trim();
        if text.is_empty() {
            return Err(KindlyError::provider("empty reply"));
        }
        Ok(text.to_string())
    }
}
