//! Language-model completion backends.

use crate::error::{ConnectError, Result};
use async_trait::async_trait;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::Ollama;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:latest";

#[async_trait]
pub trait CompletionService: Send + Sync {
    fn model(&self) -> &str;

    /// Sends one instruction and returns the model's free-form reply.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ReqPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ReqContent<'a> {
    parts: Vec<ReqPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GenCfg {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GeminiReq<'a> {
    contents: Vec<ReqContent<'a>>,
    generation_config: GenCfg,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiResp {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}

#[derive(Debug, Deserialize)]
struct RespPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    #[serde(default)]
    message: String,
}

/// Joins the text parts of the first candidate.
fn candidate_text(resp: GeminiResp) -> Option<String> {
    let parts = resp.candidates.into_iter().next()?.content?.parts;
    let text = parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect::<Vec<_>>()
        .join("\n");
    text.chars().any(|c| !c.is_whitespace()).then_some(text)
}

/// Gemini `generateContent` over REST.
pub struct GeminiCompletion {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiCompletion {
    pub fn new(client: Client, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl CompletionService for GeminiCompletion {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(ConnectError::MissingCredential("GEMINI_API_KEY"))?;

        let req = GeminiReq {
            contents: vec![ReqContent {
                parts: vec![ReqPart { text: prompt }],
            }],
            generation_config: GenCfg { temperature: 0.2 },
        };
        let url = format!(
            "{base}/v1beta/models/{model}:generateContent",
            base = self.base_url.trim_end_matches('/'),
            model = self.model
        );
        debug!(model = %self.model, prompt_chars = prompt.len(), "Calling Gemini");

        let response = self
            .client
            .post(url)
            .query(&[("key", key)])
            .json(&req)
            .send()
            .await?;
        let status = response.status();
        let body: GeminiResp = response.json().await.unwrap_or_default();

        if !status.is_success() {
            let message = body
                .error
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| status.to_string());
            warn!(%status, "Gemini request failed");
            return Err(ConnectError::upstream("Gemini", message));
        }

        candidate_text(body).ok_or_else(|| ConnectError::upstream("Gemini", "empty response"))
    }
}

/// A model served by a local Ollama daemon.
pub struct OllamaCompletion {
    ollama: Ollama,
    model: String,
}

impl OllamaCompletion {
    pub fn new(host: &str, port: u16, model: impl Into<String>) -> Self {
        Self {
            ollama: Ollama::new(host.to_string(), port),
            model: model.into(),
        }
    }
}

#[async_trait]
impl CompletionService for OllamaCompletion {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerationRequest::new(self.model.clone(), prompt.to_string());
        match self.ollama.generate(request).await {
            Ok(response) => Ok(response.response.trim().to_string()),
            Err(e) => Err(ConnectError::upstream("Ollama", e)),
        }
    }
}
