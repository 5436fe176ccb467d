use crate::config::toml_config::GeoConfig;
use crate::domain::ports::ReasoningService;
use crate::utils::error::{GeoError, ReasoningFailure, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gemini `generateContent` REST 客戶端
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &GeoConfig) -> Result<Self> {
        if !config.reasoning_enabled() {
            return Err(GeoError::MissingConfigError {
                field: "reasoning.api_key".to_string(),
            });
        }
        let api_key = config.reasoning.api_key.clone().unwrap_or_default();
        Self::new(
            &config.reasoning.endpoint,
            &config.reasoning.model,
            api_key,
            config.reasoning_timeout(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[async_trait]
impl ReasoningService for GeminiClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> std::result::Result<String, ReasoningFailure> {
        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![RequestPart {
                    text: system_prompt,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![RequestPart { text: user_prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        tracing::debug!("Calling reasoning model {}", self.model);
        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ReasoningFailure::Status {
                code: status.as_u16(),
                body: text,
            });
        }

        let envelope: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| ReasoningFailure::Envelope(e.to_string()))?;

        envelope
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ReasoningFailure::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new(server.base_url(), "gemini-2.0-flash", "test-key", Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_extracts_first_candidate_text() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent")
                .header("x-goog-api-key", "test-key")
                .body_contains("\"responseMimeType\":\"application/json\"")
                .body_contains("\"systemInstruction\"");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "candidates": [{
                        "content": {"role": "model", "parts": [{"text": "{\"lat_offset\": 0.0001}"}]}
                    }]
                }));
        });

        let text = client_for(&server).generate("system", "user").await.unwrap();

        api_mock.assert();
        assert_eq!(text, "{\"lat_offset\": 0.0001}");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(429).body("quota exhausted");
        });

        let err = client_for(&server).generate("s", "u").await.unwrap_err();
        assert_eq!(
            err,
            ReasoningFailure::Status {
                code: 429,
                body: "quota exhausted".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"candidates": []}));
        });

        let err = client_for(&server).generate("s", "u").await.unwrap_err();
        assert_eq!(err, ReasoningFailure::EmptyResponse);
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = GeoConfig::default();
        assert!(matches!(
            GeminiClient::from_config(&config),
            Err(GeoError::MissingConfigError { .. })
        ));
    }
}
