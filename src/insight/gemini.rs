use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{build_prompt, InsightError, InsightGenerator};
use crate::config::GeminiConfig;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
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

/// `generateContent` REST adapter for Google's Gemini models.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    /// Fails when `config.api_key` is unset.
    pub fn new(config: &GeminiConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .context("GEMINI_API_KEY is not configured")?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl InsightGenerator for GeminiClient {
    #[instrument(skip_all, fields(chars = content.len()))]
    async fn analyze(&self, content: &str) -> Result<String, InsightError> {
        let prompt = build_prompt(content);
        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: &prompt }],
            }],
        };

        let res = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e.without_url(), "gemini request failed");
                InsightError::Unavailable("request failed".into())
            })?;

        let status = res.status();
        if !status.is_success() {
            warn!(%status, "gemini returned non-success status");
            return Err(InsightError::Unavailable(format!("status {status}")));
        }

        let bytes = res.bytes().await.map_err(|e| {
            warn!(error = %e.without_url(), "gemini body read failed");
            InsightError::Unavailable("response body could not be read".into())
        })?;
        let text = extract_text(&bytes)?;
        debug!(chars = text.len(), "insight generated");
        Ok(text)
    }
}

/// Pulls `candidates[0].content.parts[0].text` out of a response body.
fn extract_text(body: &[u8]) -> Result<String, InsightError> {
    let parsed: GenerateResponse = serde_json::from_slice(body)
        .map_err(|e| InsightError::Malformed(format!("invalid JSON: {e}")))?;
    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| InsightError::Malformed("no candidate text".into()))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(InsightError::Malformed("empty candidate text".into()));
    }
    Ok(text.to_string())
}
