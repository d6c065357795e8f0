// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Kindly configuration system.

use kindly_config::diagnostic::ConfigError;
use kindly_config::{load_and_validate_str, load_config_from_path, load_config_from_str};

/// A file touching every section deserializes with its overrides applied.
#[test]
fn full_toml_overrides_defaults() {
    let toml = r#"
[agent]
name = "kindly-test"
log_level = "debug"

[storage]
database_path = "/tmp/kindly-test.db"
wal_mode = false

[provider]
base_url = "http://localhost:8080/v1"
api_key = "sk-test"
chat_model = "small-chat"
embedding_model = "small-embed"

[memory]
dedup_similarity = 0.9
similarity_floor = 0.35

[compression]
batch_size = 10
min_batch = 5
max_age_hours = 12

[indexer]
workers = 4

[retrieval]
char_budget = 3000
locales = ["en"]

[repetition]
window = 5
threshold = 0.8
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.name, "kindly-test");
    assert_eq!(config.storage.database_path, "/tmp/kindly-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.provider.chat_model, "small-chat");
    assert_eq!(config.memory.dedup_similarity, 0.9);
    assert_eq!(config.compression.min_batch, 5);
    assert_eq!(config.indexer.workers, 4);
    assert_eq!(config.retrieval.char_budget, 3000);
    assert_eq!(config.retrieval.locales, vec!["en"]);
    assert_eq!(config.repetition.window, 5);
    // untouched keys keep their defaults
    assert_eq!(config.memory.raw_snippet_importance, 0.5);
    assert_eq!(config.repetition.max_attempts, 2);
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.agent.name, "kindly");
    assert_eq!(config.retrieval.char_budget, 4500);
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[retrieval]
char_budgte = 100
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown key");
    let suggestion = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey { key, suggestion, .. } if key == "char_budgte" => {
            suggestion.clone()
        }
        _ => None,
    });
    assert_eq!(suggestion.as_deref(), Some("char_budget"));
}

#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[telegram]
bot_token = "x"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[repetition]
window = "ten"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject wrong type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. }))
    );
}

#[test]
fn semantic_validation_runs_after_parse() {
    let toml = r#"
[compression]
batch_size = 4
min_batch = 8
"#;

    let errors = load_and_validate_str(toml).expect_err("min_batch > batch_size");
    assert!(
        errors
            .iter()
            .any(|e| e.to_string().contains("compression.min_batch"))
    );
}

#[test]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            r#"
[provider]
chat_model = "from-file"

[retrieval]
char_budget = 2000
"#,
        )?;
        jail.set_env("KINDLY_PROVIDER_CHAT_MODEL", "from-env");
        jail.set_env("KINDLY_MEMORY_SIMILARITY_FLOOR", "0.5");

        let config = load_config_from_path(std::path::Path::new("custom.toml"))
            .map_err(|e| e.to_string())?;
        assert_eq!(config.provider.chat_model, "from-env");
        assert_eq!(config.memory.similarity_floor, 0.5);
        assert_eq!(config.retrieval.char_budget, 2000);
        Ok(())
    });
}
