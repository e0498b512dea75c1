//! Podium Core Library
//!
//! Provides the debate session orchestration, the streaming Ollama client,
//! the shared transcript, and configuration handling.

pub mod agent;
pub mod config;
pub mod error;
pub mod ollama;
pub mod prompt;
pub mod session;
pub mod transcript;

pub use agent::AgentConfig;
pub use config::{Config, DebateConfig, ServerConfig, default_config};
pub use error::DebateError;
pub use ollama::{
    GenerateChunk, GenerateOptions, GenerateRequest, GenerationBackend, OllamaClient, TokenStream,
};
pub use session::{
    DebateCallback, DebateEvent, DebateSession, RunOutcome, RunState, SessionControls,
};
pub use transcript::{Transcript, TranscriptEntry};
