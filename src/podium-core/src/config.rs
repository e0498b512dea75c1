//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::agent::AgentConfig;
use crate::error::DebateError;

/// Default Ollama server URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub debate: DebateConfig,
    pub agents: Vec<AgentConfig>,
}

/// Connection settings for the inference server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Settings shared by both agents for the duration of a run.
#[derive(Debug, Clone, Deserialize)]
pub struct DebateConfig {
    /// The topic being debated.
    pub topic: String,
    /// Behavioral constraints applied to every agent's prompt.
    #[serde(default = "default_stage_rules")]
    pub stage_rules: String,
    /// Upper bound on turns before the run stops on its own.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

fn default_stage_rules() -> String {
    "Stay on topic and keep your responses short.".to_string()
}

fn default_max_turns() -> u32 {
    1000
}

impl DebateConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            stage_rules: default_stage_rules(),
            max_turns: default_max_turns(),
        }
    }

    pub fn with_stage_rules(mut self, rules: impl Into<String>) -> Self {
        self.stage_rules = rules.into();
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::ConfigError(format!("Failed to read config: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Load configuration from string content.
    pub fn from_toml(content: &str) -> Result<Self, DebateError> {
        toml::from_str(content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Check that the configuration describes a runnable debate.
    pub fn validate(&self) -> Result<(), DebateError> {
        if self.agents.len() != 2 {
            return Err(DebateError::ConfigError(format!(
                "a debate needs exactly 2 agents, got {}",
                self.agents.len()
            )));
        }
        for agent in &self.agents {
            agent.validate()?;
        }
        if self.server.base_url.trim().is_empty() {
            return Err(DebateError::ConfigError(
                "server base_url is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The two agents as a fixed-size pair.
    pub fn agent_pair(&self) -> Result<[AgentConfig; 2], DebateError> {
        <[AgentConfig; 2]>::try_from(self.agents.clone()).map_err(|v: Vec<_>| {
            DebateError::ConfigError(format!("a debate needs exactly 2 agents, got {}", v.len()))
        })
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config {
        server: ServerConfig::default(),
        debate: DebateConfig::new("Climate change"),
        agents: vec![
            AgentConfig::new("Climate Scientist", "").with_system_prompt(
                "You are a knowledgeable climate scientist advocating for immediate \
                 action to combat climate change.",
            ),
            AgentConfig::new("Conservative Farmer", "").with_system_prompt(
                "You are a conservative farmer skeptical about the impact of human \
                 activities on climate change.",
            ),
        ],
    }
}
