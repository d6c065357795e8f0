// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible adapter for Kindly.
//!
//! [`OpenAiProvider`] implements both [`ProviderAdapter`] (chat completions)
//! and [`EmbeddingAdapter`] (embeddings) against any server speaking the
//! OpenAI REST dialect.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use kindly_config::model::ProviderConfig;
use kindly_core::types::{
    AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus, ProviderRequest,
    ProviderResponse, TokenUsage,
};
use kindly_core::{EmbeddingAdapter, KindlyError, PluginAdapter, ProviderAdapter};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, ResponseFormat,
};

/// Resolves the API key: config first, then `OPENAI_API_KEY`.
pub fn resolve_api_key(configured: &Option<String>) -> Result<String, KindlyError> {
    if let Some(key) = configured.as_ref().filter(|k| !k.is_empty()) {
        return Ok(key.clone());
    }
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            KindlyError::Config(
                "no API key: set provider.api_key, KINDLY_PROVIDER_API_KEY or OPENAI_API_KEY".into(),
            )
        })
}

pub struct OpenAiProvider {
    client: OpenAiClient,
    chat_model: String,
    embedding_model: String,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, KindlyError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = OpenAiClient::new(
            &config.base_url,
            &api_key,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        info!(
            base_url = %config.base_url,
            chat_model = %config.chat_model,
            embedding_model = %config.embedding_model,
            "OpenAI-compatible provider initialized"
        );
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: OpenAiClient, config: &ProviderConfig) -> Self {
        Self {
            client,
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
        }
    }

    fn to_chat_request(&self, request: ProviderRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system_prompt {
            messages.push(ChatMessage {
                role: "system".into(),
                content: Some(system),
            });
        }
        messages.extend(request.messages.into_iter().map(|m| ChatMessage {
            role: m.role.to_string(),
            content: Some(m.content),
        }));

        ChatRequest {
            model: request.model.unwrap_or_else(|| self.chat_model.clone()),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_output.then(ResponseFormat::json_object),
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, KindlyError> {
        match self.client.probe("models").await {
            Ok(status) if status.is_success() => Ok(HealthStatus::Healthy),
            Ok(status) => Ok(HealthStatus::Unhealthy(format!("models endpoint returned {status}"))),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), KindlyError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, KindlyError> {
        let body = self.to_chat_request(request);
        let response: ChatResponse = self.client.post_json("chat/completions", &body).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| KindlyError::provider("completion had no message content"))?;
        let usage = response.usage.unwrap_or_default();
        debug!(
            model = %response.model,
            input_tokens = usage.prompt_tokens,
            output_tokens = usage.completion_tokens,
            "completion received"
        );

        Ok(ProviderResponse {
            id: response.id,
            content,
            model: response.model,
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAiProvider {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, KindlyError> {
        if input.texts.is_empty() {
            return Ok(EmbeddingOutput {
                embeddings: Vec::new(),
            });
        }
        let expected = input.texts.len();
        let body = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: input.texts,
        };
        let response: EmbeddingResponse = self
            .client
            .post_json("embeddings", &body)
            .await
            .map_err(|e| KindlyError::Embedding(e.to_string()))?;

        let mut data = response.data;
        if data.len() != expected {
            return Err(KindlyError::Embedding(format!(
                "expected {expected} embeddings, got {}",
                data.len()
            )));
        }
        data.sort_by_key(|d| d.index);
        Ok(EmbeddingOutput {
            embeddings: data.into_iter().map(|d| d.embedding).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindly_core::embed_one;
    use kindly_core::types::ProviderMessage;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenAiProvider {
        let config = ProviderConfig {
            base_url: server.uri(),
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let client = OpenAiClient::new(&server.uri(), "sk-test", Duration::from_secs(5))
            .unwrap()
            .with_retry_delay(Duration::from_millis(10));
        OpenAiProvider::with_client(client, &config)
    }

    fn chat_body(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        })
    }

    #[tokio::test]
    async fn complete_maps_system_prompt_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("hi!")))
            .expect(1)
            .mount(&server)
            .await;

        let response = provider(&server)
            .complete(ProviderRequest {
                system_prompt: Some("be brief".into()),
                messages: vec![ProviderMessage::user("hello")],
                max_tokens: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.content, "hi!");
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 3);
    }

    #[tokio::test]
    async fn json_output_requests_json_object_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"response_format": {"type": "json_object"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("{\"facts\": []}")))
            .expect(1)
            .mount(&server)
            .await;

        let response = provider(&server)
            .complete(ProviderRequest {
                messages: vec![ProviderMessage::user("extract")],
                max_tokens: 50,
                json_output: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.content, "{\"facts\": []}");
    }

    #[tokio::test]
    async fn missing_content_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "x", "model": "m", "choices": []
            })))
            .mount(&server)
            .await;

        let result = provider(&server)
            .complete(ProviderRequest {
                messages: vec![ProviderMessage::user("hello")],
                max_tokens: 5,
                ..Default::default()
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn embeddings_are_returned_in_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({"model": "text-embedding-3-small"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let out = provider(&server)
            .embed(EmbeddingInput {
                texts: vec!["a".into(), "b".into()],
            })
            .await
            .unwrap();
        assert_eq!(out.embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn embedding_failures_are_embedding_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = embed_one(&provider(&server), "hello").await.unwrap_err();
        assert!(matches!(err, KindlyError::Embedding(_)));
    }

    #[tokio::test]
    async fn health_check_probes_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;
        assert_eq!(provider(&server).health_check().await.unwrap(), HealthStatus::Healthy);

        let down = MockServer::start().await;
        assert!(matches!(
            provider(&down).health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[test]
    fn configured_key_wins() {
        assert_eq!(resolve_api_key(&Some("sk-config".into())).unwrap(), "sk-config");
    }

    #[test]
    #[serial_test::serial]
    fn falls_back_to_environment() {
        // SAFETY: serialized with every other test touching OPENAI_API_KEY.
        unsafe { std::env::set_var("OPENAI_API_KEY", "sk-env") };
        assert_eq!(resolve_api_key(&None).unwrap(), "sk-env");
        assert_eq!(resolve_api_key(&Some(String::new())).unwrap(), "sk-env");

        unsafe { std::env::remove_var("OPENAI_API_KEY") };
        assert!(matches!(resolve_api_key(&None), Err(KindlyError::Config(_))));
    }
}
