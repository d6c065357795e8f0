// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock text generation adapter for deterministic testing.
//!
//! Resolution order for each request:
//! 1. the first rule whose key occurs in the system prompt,
//! 2. the next queued response (or queued failure),
//! 3. the fallback text (default `"mock response"`).
//!
//! Delays registered with [`MockProvider::add_delay`] are applied before the
//! answer is resolved, to simulate a slow capability.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use kindly_core::types::{ProviderRequest, ProviderResponse, TokenUsage};
use kindly_core::{AdapterType, HealthStatus, KindlyError, PluginAdapter, ProviderAdapter};

/// A mock provider with rule, queue, and failure controls.
pub struct MockProvider {
    rules: Arc<Mutex<Vec<(String, String)>>>,
    queue: Arc<Mutex<VecDeque<Result<String, String>>>>,
    fallback: Arc<Mutex<String>>,
    delays: Arc<Mutex<Vec<(String, Duration)>>>,
    failing: AtomicBool,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            rules: Arc::new(Mutex::new(Vec::new())),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new("mock response".to_string())),
            delays: Arc::new(Mutex::new(Vec::new())),
            failing: AtomicBool::new(false),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock provider pre-loaded with the given responses.
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(responses.into_iter().map(Ok).collect())),
            ..Self::new()
        }
    }

    /// Answer every request whose system prompt contains `key` with `response`.
    pub async fn add_rule(&self, key: impl Into<String>, response: impl Into<String>) {
        self.rules.lock().await.push((key.into(), response.into()));
    }

    /// Hold every request whose system prompt contains `key` for `delay`.
    pub async fn add_delay(&self, key: impl Into<String>, delay: Duration) {
        self.delays.lock().await.push((key.into(), delay));
    }

    pub async fn add_response(&self, text: impl Into<String>) {
        self.queue.lock().await.push_back(Ok(text.into()));
    }

    /// Queue a single failing call.
    pub async fn add_error(&self, message: impl Into<String>) {
        self.queue.lock().await.push_back(Err(message.into()));
    }

    /// Text returned when neither a rule nor the queue answers.
    pub async fn set_fallback(&self, text: impl Into<String>) {
        *self.fallback.lock().await = text.into();
    }

    /// Make every call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All requests received so far.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn resolve(&self, request: &ProviderRequest) -> Result<String, String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("mock provider failure".to_string());
        }
        let system = request.system_prompt.as_deref().unwrap_or_default();
        if let Some((_, response)) = self
            .rules
            .lock()
            .await
            .iter()
            .find(|(key, _)| system.contains(key.as_str()))
        {
            return Ok(response.clone());
        }
        if let Some(next) = self.queue.lock().await.pop_front() {
            return next;
        }
        Ok(self.fallback.lock().await.clone())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, KindlyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), KindlyError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, KindlyError> {
        self.requests.lock().await.push(request.clone());
        let n = self.requests.lock().await.len();
        let system = request.system_prompt.as_deref().unwrap_or_default();
        let delay = self
            .delays
            .lock()
            .await
            .iter()
            .find(|(key, _)| system.contains(key.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.resolve(&request).await {
            Ok(content) => Ok(ProviderResponse {
                id: format!("mock-resp-{n}"),
                content,
                model: request.model.unwrap_or_else(|| "mock-model".to_string()),
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 20,
                },
            }),
            Err(message) => Err(KindlyError::provider(message)),
        }
    }
}
