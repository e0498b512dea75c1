//! Ollama REST client with streaming generation.
//!
//! Talks to the two endpoints the debate needs: `/api/tags` to list the
//! installed models and `/api/generate` for token-by-token completions.
//! Generation responses arrive as newline-delimited JSON objects.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DebateError;

/// A request for one streamed completion.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub options: GenerateOptions,
    pub stream: bool,
}

/// Sampling options forwarded to the model.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub top_k: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

/// One parsed fragment of a streamed completion.
#[derive(Debug, Clone)]
pub struct GenerateChunk {
    /// The text fragment, possibly empty on the final object.
    pub response: String,
    /// Set on the terminating object of the stream.
    pub done: bool,
}

/// A finite stream of completion fragments, terminated by a `done` chunk or
/// an error item.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<GenerateChunk, DebateError>> + Send>>;

/// The text-generation capability the session depends on.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<TokenStream, DebateError>;
}

#[derive(Debug, Deserialize)]
struct RawChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Splits a byte stream into newline-delimited JSON chunks, buffering the
/// trailing partial line between feeds.
#[derive(Debug, Default)]
struct NdjsonDecoder {
    buf: Vec<u8>,
}

impl NdjsonDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<Result<GenerateChunk, DebateError>> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            out.push(parse_line(line));
        }
        out
    }
}

fn parse_line(line: &str) -> Result<GenerateChunk, DebateError> {
    let raw: RawChunk = serde_json::from_str(line)
        .map_err(|e| DebateError::MalformedChunk(format!("{e} in line: {line}")))?;
    if let Some(message) = raw.error {
        return Err(DebateError::Server(message));
    }
    Ok(GenerateChunk {
        response: raw.response,
        done: raw.done,
    })
}

/// HTTP client for a single Ollama server.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, DebateError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(300))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the server; Ok if `/api/tags` answers.
    pub async fn check_connection(&self) -> Result<(), DebateError> {
        self.http
            .get(self.endpoint("/api/tags"))
            .timeout(Duration::from_secs(5))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>, DebateError> {
        let tags: TagsResponse = self
            .http
            .get(self.endpoint("/api/tags"))
            .timeout(Duration::from_secs(5))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        debug!(count = names.len(), "listed installed models");
        Ok(names)
    }
}

#[async_trait]
impl GenerationBackend for OllamaClient {
    async fn generate(&self, request: GenerateRequest) -> Result<TokenStream, DebateError> {
        debug!(
            model = %request.model,
            prompt_chars = request.prompt.chars().count(),
            "dispatching generation request"
        );
        let response = self
            .http
            .post(self.endpoint("/api/generate"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DebateError::Server(format!(
                "{status}: {}",
                body.trim()
            )));
        }

        let mut decoder = NdjsonDecoder::default();
        let chunks = response.bytes_stream().flat_map(move |next| {
            let items = match next {
                Ok(bytes) => decoder.feed(&bytes),
                Err(e) => vec![Err(DebateError::Http(e))],
            };
            stream::iter(items)
        });
        Ok(Box::pin(chunks))
    }
}
