//! Prompt assembly for a single debate turn.

use crate::agent::AgentConfig;
use crate::config::DebateConfig;
use crate::transcript::Transcript;

/// Build the full prompt for an agent's turn: persona, stage rules, topic,
/// then as much recent history as the agent's memory budget allows, ending
/// with the agent's own name so the model continues as that speaker.
pub fn compose(agent: &AgentConfig, debate: &DebateConfig, transcript: &Transcript) -> String {
    let memory = transcript.render_tail(agent.memory_chars);
    format!(
        "{}\n\n{}\n\nTopic: {}\n\n{}{}:",
        agent.system_prompt.trim(),
        debate.stage_rules.trim(),
        debate.topic.trim(),
        memory,
        agent.name,
    )
}

/// Stop sequence that keeps a model from speaking for its opponent.
pub fn stop_marker(opponent: &AgentConfig) -> String {
    format!("{}:", opponent.name)
}
