//! Gemini client via the Generative Language API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::llm::Generator;
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::retry::retry_with_backoff;

/// Returned when the API answers without any candidate
pub const NO_ANSWER: &str = "No answer available from Gemini.";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini `generateContent` client authenticated with an API key
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_retries: u32,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("Gemini requires llm.api_key".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.model().to_string(),
            api_key,
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn request_answer(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::external("gemini", format!("request failed: {}", e.without_url())))?;

        if !response.status().is_success() {
            return Err(Error::from_response("gemini", response).await);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| {
                Error::external_permanent("gemini", format!("unreadable response: {}", e.without_url()))
            })?;

        Ok(first_candidate_text(body).unwrap_or_else(|| NO_ANSWER.to_string()))
    }
}

fn first_candidate_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::info!("Generating answer with Gemini model {}", self.model);
        retry_with_backoff("Gemini generation", self.max_retries, move || {
            self.request_answer(prompt)
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        match self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: "Question : oil?" }],
            }],
            generation_config: GenerationConfig { temperature: 0.5 },
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["text"], "Question : oil?");
        assert_eq!(json["generationConfig"]["temperature"], 0.5);
    }

    #[test]
    fn test_first_candidate_text() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Change it every 10,000 km."},{"text":"ignored"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(first_candidate_text(body).as_deref(), Some("Change it every 10,000 km."));

        let empty: GenerateResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert_eq!(first_candidate_text(empty), None);
    }

    #[test]
    fn test_requires_api_key() {
        let config = LlmConfig {
            api_key: None,
            ..LlmConfig::default()
        };
        assert!(matches!(GeminiClient::new(&config), Err(Error::Config(_))));

        let config = LlmConfig {
            api_key: Some("k".into()),
            gemini_base_url: "https://example.test/v1beta/".into(),
            ..LlmConfig::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-1.5-flash-latest:generateContent"
        );
    }
}
