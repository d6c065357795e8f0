// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every violation instead of failing on the first.

use crate::diagnostic::ConfigError;
use crate::model::KindlyConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &KindlyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.provider.base_url.trim().is_empty() {
        errors.push(ConfigError::validation("provider.base_url must not be empty"));
    }

    check_unit_interval(&mut errors, "memory.dedup_similarity", config.memory.dedup_similarity);
    check_unit_interval(&mut errors, "memory.similarity_floor", config.memory.similarity_floor);
    check_unit_interval(&mut errors, "repetition.threshold", config.repetition.threshold);
    check_unit_interval(
        &mut errors,
        "retrieval.recency_max_boost",
        config.retrieval.recency_max_boost,
    );

    if config.memory.max_facts_per_message == 0 {
        errors.push(ConfigError::validation(
            "memory.max_facts_per_message must be at least 1",
        ));
    }

    for (key, value) in [
        ("memory.fact_importance", config.memory.fact_importance),
        ("memory.raw_snippet_importance", config.memory.raw_snippet_importance),
        ("memory.summary_importance", config.memory.summary_importance),
    ] {
        if !(value.is_finite() && value >= 0.0) {
            errors.push(ConfigError::validation(format!(
                "{key} must be a non-negative number, got {value}"
            )));
        }
    }

    if config.compression.min_batch == 0 {
        errors.push(ConfigError::validation(
            "compression.min_batch must be at least 1",
        ));
    }
    if config.compression.min_batch > config.compression.batch_size {
        errors.push(ConfigError::validation(format!(
            "compression.min_batch ({}) must not exceed compression.batch_size ({})",
            config.compression.min_batch, config.compression.batch_size
        )));
    }

    if config.indexer.workers == 0 {
        errors.push(ConfigError::validation("indexer.workers must be at least 1"));
    }
    if config.indexer.queue_capacity == 0 {
        errors.push(ConfigError::validation(
            "indexer.queue_capacity must be at least 1",
        ));
    }
    if config.indexer.batch_size == 0 {
        errors.push(ConfigError::validation("indexer.batch_size must be at least 1"));
    }

    if config.retrieval.char_budget == 0 {
        errors.push(ConfigError::validation(
            "retrieval.char_budget must be at least 1",
        ));
    }
    if config.retrieval.item_char_cap == 0 {
        errors.push(ConfigError::validation(
            "retrieval.item_char_cap must be at least 1",
        ));
    }
    if config.retrieval.recency_window_days == 0 {
        errors.push(ConfigError::validation(
            "retrieval.recency_window_days must be at least 1",
        ));
    }
    for locale in &config.retrieval.locales {
        let well_formed = (2..=3).contains(&locale.len())
            && locale.chars().all(|c| c.is_ascii_lowercase());
        if !well_formed {
            errors.push(ConfigError::validation(format!(
                "retrieval.locales entry `{locale}` is not a lowercase language code"
            )));
        }
    }

    if config.repetition.max_attempts == 0 {
        errors.push(ConfigError::validation(
            "repetition.max_attempts must be at least 1",
        ));
    }
    if config.repetition.window == 0 {
        errors.push(ConfigError::validation("repetition.window must be at least 1"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_unit_interval(errors: &mut Vec<ConfigError>, key: &str, value: f32) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ConfigError::validation(format!(
            "{key} must be between 0.0 and 1.0, got {value}"
        )));
    }
}
