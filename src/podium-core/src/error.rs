//! Error types for the debate system.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DebateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ollama server error: {0}")]
    Server(String),

    #[error("Malformed streaming response: {0}")]
    MalformedChunk(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
