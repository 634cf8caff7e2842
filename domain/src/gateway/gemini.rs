use super::TextGenerator;
use crate::error::{DomainErrorKind, Error, ExternalErrorKind};
use async_trait::async_trait;
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use service::config::Config;

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        Ok(Self {
            client: reqwest::Client::builder().use_rustls_tls().build()?,
            base_url: config.gemini_base_url().trim_end_matches('/').to_string(),
            model: config.gemini_model().to_string(),
            api_key: config.gemini_api_key(),
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String, Error> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::config("GEMINI_API_KEY is not set"))?;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"maxOutputTokens": max_output_tokens}
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Gemini responded {status}: {error_text}");
            return Err(Error {
                source: Some(format!("Gemini responded {status}").into()),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Other(error_text)),
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        let text = text.trim();
        if text.is_empty() {
            return Err(Error {
                source: None,
                error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                    "Gemini returned no text".to_string(),
                )),
            });
        }
        Ok(text.to_string())
    }
}
