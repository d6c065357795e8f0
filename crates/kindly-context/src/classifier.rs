// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query type classification.
//!
//! Remember-queries are detected by the locale pattern table before any
//! network call. Everything else goes to the provider with a one-letter
//! answer format; any failure falls back to [`QueryType::General`].

use std::sync::Arc;
use std::time::Duration;

use kindly_core::timeout::bounded;
use kindly_core::types::{ProviderMessage, ProviderRequest};
use kindly_core::{KindlyError, ProviderAdapter};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use crate::locale::RememberMatcher;

/// How a query is routed through retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum QueryType {
    /// "Do you remember ..." questions. Never answered from knowledge chunks.
    #[strum(serialize = "R")]
    #[serde(rename = "R")]
    Remember,
    /// Personal or emotional sharing.
    #[strum(serialize = "A")]
    #[serde(rename = "A")]
    Personal,
    /// Seeking advice or a technique.
    #[strum(serialize = "B")]
    #[serde(rename = "B")]
    Advice,
    /// Anything else.
    #[strum(serialize = "C")]
    #[serde(rename = "C")]
    General,
}

const CLASSIFIER_PROMPT: &str = "You are a query classifier for a supportive companion. \
Answer with exactly one letter:\n\
A - the user shares something personal or emotional\n\
B - the user asks for advice, a technique, or an exercise\n\
C - anything else\n\
Reply with the letter only.";

/// The A/B/C label of a classifier reply.
///
/// Accepts a lone letter in either case, optionally wrapped in quotes or
/// punctuation. Anything longer, like "Answer: B", is unrecognized.
pub fn parse_label(response: &str) -> Option<QueryType> {
    let mut letters = response.trim().trim_matches(|c: char| c.is_ascii_punctuation()).chars();
    let letter = letters.next()?;
    if letters.next().is_some() {
        return None;
    }
    match letter.to_ascii_uppercase() {
        'A' => Some(QueryType::Personal),
        'B' => Some(QueryType::Advice),
        'C' => Some(QueryType::General),
        _ => None,
    }
}

/// Routes a query to one of the four retrieval plans.
///
/// "Do you remember" phrasing is matched locally and never reaches the
/// provider; everything else costs one single-token completion.
pub struct QueryClassifier {
    matcher: RememberMatcher,
    provider: Arc<dyn ProviderAdapter>,
    timeout: Duration,
}

impl QueryClassifier {
    pub fn new(
        matcher: RememberMatcher,
        provider: Arc<dyn ProviderAdapter>,
        timeout: Duration,
    ) -> Self {
        Self {
            matcher,
            provider,
            timeout,
        }
    }

    /// Classify `query`. Never fails.
    pub async fn classify(&self, query: &str) -> QueryType {
        if let Some(locale) = self.matcher.matched_locale(query) {
            debug!(locale, "remember pattern matched");
            return QueryType::Remember;
        }
        match self.ask_provider(query).await {
            Ok(Some(t)) => t,
            Ok(None) => {
                debug!("unrecognized classifier answer, using general");
                QueryType::General
            }
            Err(e) => {
                warn!(error = %e, "query classification failed, using general");
                QueryType::General
            }
        }
    }

    async fn ask_provider(&self, query: &str) -> Result<Option<QueryType>, KindlyError> {
        let request = ProviderRequest {
            system_prompt: Some(CLASSIFIER_PROMPT.to_string()),
            messages: vec![ProviderMessage::user(query)],
            max_tokens: 1,
            temperature: Some(0.0),
            ..Default::default()
        };
        let response = bounded(self.timeout, self.provider.complete(request)).await?;
        Ok(parse_label(&response.content))
    }
}
