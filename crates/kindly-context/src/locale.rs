// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-locale "remember" phrase table.
//!
//! Each locale contributes case-insensitive patterns that mark a query as
//! a question about what the user said before. Supporting a new language
//! means adding a row to [`REMEMBER_PATTERNS`].

use kindly_core::KindlyError;
use regex::{Regex, RegexBuilder};

/// `(locale, patterns)` rows. Patterns are matched anywhere in the query.
pub const REMEMBER_PATTERNS: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            r"\b(do|did) you remember\b",
            r"\bremember (when|what|that|how|who)\b",
            r"\bremind me\b",
            r"\bi (told|mentioned to|said to) you\b",
            r"\bdid i (tell|mention|say)\b",
            r"\bhave i (told|mentioned)\b",
            r"\bwhat did (we|i) (discuss|talk about|say)\b",
            r"\bwhat do you know about me\b",
            r"\blast time (we|i)\b",
        ],
    ),
    (
        "ru",
        &[
            r"\bты помнишь\b",
            r"\bпомнишь( ли)?\b",
            r"\bя (тебе )?(говорил|говорила|рассказывал|рассказывала)\b",
            r"\bнапомни\b",
            r"\bо ч[её]м мы (говорили|разговаривали)\b",
            r"\bчто ты знаешь обо мне\b",
        ],
    ),
];

/// Compiled remember patterns for the configured locales.
#[derive(Debug)]
pub struct RememberMatcher {
    patterns: Vec<(String, Regex)>,
}

impl RememberMatcher {
    /// Compile the patterns of `locales`. An unknown locale is a
    /// configuration error.
    pub fn new(locales: &[String]) -> Result<Self, KindlyError> {
        let mut patterns = Vec::new();
        for locale in locales {
            let (_, rows) = REMEMBER_PATTERNS
                .iter()
                .find(|(code, _)| code == locale)
                .ok_or_else(|| {
                    KindlyError::Config(format!(
                        "no remember patterns for locale '{locale}' (known: {})",
                        known_locales().join(", ")
                    ))
                })?;
            for pattern in rows.iter() {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| KindlyError::Internal(format!("bad pattern {pattern}: {e}")))?;
                patterns.push((locale.clone(), regex));
            }
        }
        Ok(Self { patterns })
    }

    /// The locale whose pattern matched `query`, if any.
    pub fn matched_locale(&self, query: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(query))
            .map(|(locale, _)| locale.as_str())
    }

    pub fn is_remember(&self, query: &str) -> bool {
        self.matched_locale(query).is_some()
    }
}

pub fn known_locales() -> Vec<&'static str> {
    REMEMBER_PATTERNS.iter().map(|(code, _)| *code).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> RememberMatcher {
        RememberMatcher::new(&["en".to_string(), "ru".to_string()]).unwrap()
    }

    #[test]
    fn english_phrases() {
        let m = matcher();
        assert!(m.is_remember("remind me what I told you about Maria"));
        assert!(m.is_remember("Do you remember my cat's name?"));
        assert!(m.is_remember("What did we discuss yesterday"));
        assert!(m.is_remember("did I mention my new job?"));
        assert!(!m.is_remember("How do I stop procrastinating?"));
        assert!(!m.is_remember("I had a great day at the park"));
    }

    #[test]
    fn russian_phrases() {
        let m = matcher();
        assert_eq!(m.matched_locale("Ты помнишь, как зовут мою сестру?"), Some("ru"));
        assert!(m.is_remember("напомни, о чём мы говорили"));
        assert!(!m.is_remember("Как справиться со стрессом?"));
    }

    #[test]
    fn only_configured_locales_match() {
        let en_only = RememberMatcher::new(&["en".to_string()]).unwrap();
        assert!(!en_only.is_remember("ты помнишь мой день рождения?"));
    }

    #[test]
    fn unknown_locale_is_rejected() {
        let err = RememberMatcher::new(&["xx".to_string()]).unwrap_err();
        assert!(matches!(err, KindlyError::Config(_)));
        assert!(err.to_string().contains("xx"));
    }

    #[test]
    fn every_pattern_compiles() {
        let all: Vec<String> = known_locales().into_iter().map(String::from).collect();
        assert!(RememberMatcher::new(&all).is_ok());
    }
}
