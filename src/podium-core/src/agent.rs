//! Debate agent definitions.
//!
//! Represents an individual AI debater with its model and sampling settings.

use serde::{Deserialize, Serialize};

use crate::error::DebateError;

/// An AI agent participating in the debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Display name for this agent.
    pub name: String,
    /// Persona prompt prepended to every one of this agent's turns.
    #[serde(default)]
    pub system_prompt: String,
    /// The Ollama model to use (e.g., "llama3:8b").
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Sampling top-k.
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    /// How much conversation history this agent sees, in characters.
    #[serde(default = "default_memory_chars")]
    pub memory_chars: usize,
}

fn default_temperature() -> f32 {
    1.0
}

fn default_top_k() -> u32 {
    40
}

fn default_memory_chars() -> usize {
    2000
}

impl AgentConfig {
    /// Create a new agent with the given name and model.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: String::new(),
            model: model.into(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            memory_chars: default_memory_chars(),
        }
    }

    /// Set the persona prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the sampling top-k.
    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the history budget in characters.
    pub fn with_memory_chars(mut self, memory_chars: usize) -> Self {
        self.memory_chars = memory_chars;
        self
    }

    /// Check that the agent is usable for a run.
    pub fn validate(&self) -> Result<(), DebateError> {
        if self.model.trim().is_empty() {
            return Err(DebateError::ConfigError(format!(
                "agent '{}' has no model selected",
                self.name
            )));
        }
        if self.memory_chars == 0 {
            return Err(DebateError::ConfigError(format!(
                "agent '{}' has a zero memory budget",
                self.name
            )));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(DebateError::ConfigError(format!(
                "agent '{}' has an invalid temperature {}",
                self.name, self.temperature
            )));
        }
        Ok(())
    }
}
