//! OpenAI-compatible chat-completion client used as the text classifier

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{Result, TrackerError};
use crate::pipeline::TextClassifier;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Single-turn chat-completion client
pub struct ChatCompletionClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatCompletionClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextClassifier for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            // Keep key fragments echoed by the provider out of the logs
            let body = if status.as_u16() == 401 || status.as_u16() == 403 {
                format!("authentication failed (HTTP {})", status.as_u16())
            } else {
                response
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("<body read error: {}>", e))
            };

            return Err(if status.as_u16() == 429 {
                TrackerError::QuotaExceeded(body)
            } else {
                TrackerError::LlmApiError {
                    status: status.as_u16(),
                    body,
                }
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(TrackerError::EmptyLlmResponse)?
            .message
            .content
            .unwrap_or_default();

        debug!("LLM reply ({} chars) from {}", content.chars().count(), self.model);
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> LlmConfig {
        LlmConfig {
            api_base: format!("{}/v1/", server.uri()),
            api_key: "sk-test".to_string(),
            model: "test-model".to_string(),
            timeout_secs: 5,
            ..LlmConfig::default()
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "max_tokens": 2000,
                "messages": [{ "role": "user", "content": "Is this a job email?" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("yes")))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(&config_for(&server)).unwrap();
        assert!(client.endpoint().ends_with("/v1/chat/completions"));

        let reply = client.complete("Is this a job email?").await.unwrap();
        assert_eq!(reply, "yes");
    }

    #[tokio::test]
    async fn test_no_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(&config_for(&server)).unwrap();
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, TrackerError::EmptyLlmResponse));
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_quota() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(&config_for(&server)).unwrap();
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, TrackerError::QuotaExceeded(ref body) if body == "slow down"));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_keeps_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(&config_for(&server)).unwrap();
        match client.complete("hi").await.unwrap_err() {
            TrackerError::LlmApiError { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_auth_failure_body_is_redacted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key sk-test"))
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(&config_for(&server)).unwrap();
        let err = client.complete("hi").await.unwrap_err();
        assert!(!err.to_string().contains("sk-test"));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("yes"))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.timeout_secs = 1;
        let client = ChatCompletionClient::new(&config).unwrap();

        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, TrackerError::NetworkError(_)));
    }
}
