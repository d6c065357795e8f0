// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kindly doctor` command implementation.

use std::time::{Duration, Instant};

use kindly_config::KindlyConfig;
use kindly_config::model::ProviderConfig;
use kindly_context::RememberMatcher;
use kindly_core::{HealthStatus, KindlyError, PluginAdapter};
use kindly_openai::{OpenAiProvider, resolve_api_key};
use kindly_storage::SqliteStorage;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed.
    Pass,
    /// Usable, but needs attention. Does not fail the run.
    Warn,
    /// Check failed. The command exits non-zero.
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Short label printed in the report.
    pub name: String,
    pub status: CheckStatus,
    /// One-line detail shown after the label.
    pub message: String,
    /// How long the check took.
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run every check and print one line per result.
///
/// Returns an error when any check failed so the process exits non-zero.
pub async fn run_doctor(config: &KindlyConfig) -> Result<(), KindlyError> {
    let results = vec![
        check_config(),
        check_locales(&config.retrieval.locales),
        check_database(config).await,
        check_provider(&config.provider).await,
    ];

    println!();
    println!("  kindly doctor");
    println!("  {}", "-".repeat(50));

    for result in &results {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        println!(
            "    {tag} {:<20} {} ({}ms)",
            result.name,
            result.message,
            result.duration.as_millis()
        );
    }
    println!();

    let fail_count = results.iter().filter(|r| r.status == CheckStatus::Fail).count();
    let warn_count = results.iter().filter(|r| r.status == CheckStatus::Warn).count();
    let issues = fail_count + warn_count;
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    }
    println!();

    if fail_count > 0 {
        return Err(KindlyError::Internal(format!("{fail_count} check(s) failed")));
    }
    Ok(())
}

/// Check configuration loads without errors.
fn check_config() -> CheckResult {
    let start = Instant::now();
    match kindly_config::load_and_validate() {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Every configured locale needs a remember pattern.
fn check_locales(locales: &[String]) -> CheckResult {
    let start = Instant::now();
    match RememberMatcher::new(locales) {
        Ok(_) => CheckResult::new("Locales", CheckStatus::Pass, locales.join(", "), start),
        Err(e) => CheckResult::new("Locales", CheckStatus::Fail, e.to_string(), start),
    }
}

/// Open the database, run migrations, and verify integrity.
async fn check_database(config: &KindlyConfig) -> CheckResult {
    let start = Instant::now();
    let path = &config.storage.database_path;

    if !std::path::Path::new(path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {path} (will be created on first run)"),
            start,
        );
    }

    let storage = match SqliteStorage::open(config.storage.clone()).await {
        Ok(storage) => storage,
        Err(e) => {
            return CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start);
        }
    };
    let result = health_result("Database", storage.health_check().await, start);
    let _ = storage.shutdown().await;
    result
}

/// Probe the provider's model listing.
async fn check_provider(config: &ProviderConfig) -> CheckResult {
    let start = Instant::now();

    if resolve_api_key(&config.api_key).is_err() {
        return CheckResult::new("Provider", CheckStatus::Warn, "no API key configured", start);
    }

    match OpenAiProvider::new(config) {
        Ok(provider) => health_result("Provider", provider.health_check().await, start),
        Err(e) => CheckResult::new("Provider", CheckStatus::Fail, e.to_string(), start),
    }
}

fn health_result(
    name: &str,
    health: Result<HealthStatus, KindlyError>,
    start: Instant,
) -> CheckResult {
    match health {
        Ok(HealthStatus::Healthy) => CheckResult::new(name, CheckStatus::Pass, "healthy", start),
        Ok(HealthStatus::Degraded(msg)) => CheckResult::new(name, CheckStatus::Warn, msg, start),
        Ok(HealthStatus::Unhealthy(msg)) => CheckResult::new(name, CheckStatus::Fail, msg, start),
        Err(e) => CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_with_db(path: &std::path::Path) -> KindlyConfig {
        let mut config = KindlyConfig::default();
        config.storage.database_path = path.to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn missing_database_warns() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_db(&dir.path().join("absent.db"));
        let result = check_database(&config).await;
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("will be created"));
    }

    #[tokio::test]
    async fn existing_database_passes() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_db(&dir.path().join("kindly.db"));
        SqliteStorage::open(config.storage.clone()).await.unwrap();

        let result = check_database(&config).await;
        assert_eq!(result.status, CheckStatus::Pass, "{}", result.message);
    }

    #[test]
    fn unknown_locale_fails() {
        let result = check_locales(&["en".to_string(), "xx".to_string()]);
        assert_eq!(result.status, CheckStatus::Fail);
        assert!(result.message.contains("xx"));
        assert_eq!(check_locales(&["en".to_string()]).status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn reachable_provider_passes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"object":"list","data":[]}"#))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            base_url: server.uri(),
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        assert_eq!(check_provider(&config).await.status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn rejected_key_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            base_url: server.uri(),
            api_key: Some("sk-wrong".into()),
            ..Default::default()
        };
        let result = check_provider(&config).await;
        assert_eq!(result.status, CheckStatus::Fail);
        assert!(result.message.contains("401"));
    }
}
