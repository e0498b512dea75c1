//! Debate session orchestration.
//!
//! Drives the alternation between the two agents: builds each turn's prompt
//! from the shared transcript, streams the completion through the event
//! callback as fragments arrive, and appends the finished turn. The session
//! is the only writer of the transcript and the run state; the presentation
//! layer observes both through the callback and the read accessors.
//!
//! Cancellation is cooperative. The stop flag is checked at every turn
//! boundary and between fragments; a stop observed mid-stream abandons the
//! in-flight turn and discards its partial text, so a partial turn is never
//! committed to the transcript. The interrupted agent retakes the whole
//! turn on resume.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use tracing::{debug, warn};

use crate::agent::AgentConfig;
use crate::config::DebateConfig;
use crate::error::DebateError;
use crate::ollama::{GenerateOptions, GenerateRequest, GenerationBackend};
use crate::prompt;
use crate::transcript::{Transcript, TranscriptEntry};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run has happened since creation or the last reset.
    Idle,
    /// Turns are being taken.
    Running,
    /// Paused by the user, a fault, or the turn limit; resumable.
    Stopped,
}

/// How a call to [`DebateSession::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The stop flag was observed.
    Stopped,
    /// The configured turn limit was reached.
    TurnLimit,
    /// A turn failed; the error was delivered through the callback.
    Faulted,
}

/// Events delivered to the display sink.
#[derive(Debug, Clone)]
pub enum DebateEvent {
    /// An agent is about to speak.
    TurnStart { speaker: usize, speaker_name: String },
    /// A text fragment arrived; relayed as-is, in order.
    TurnToken { speaker: usize, text: String },
    /// The turn finished and was appended to the transcript.
    TurnComplete { entry: TranscriptEntry },
    /// The turn was interrupted by stop; its partial text was discarded.
    TurnAborted { speaker: usize },
    /// A turn failed. Exactly one of these is emitted per failed run.
    RunError { message: String },
    /// The run loop returned.
    RunEnded { outcome: RunOutcome },
}

/// Callback for debate events.
pub type DebateCallback = Box<dyn Fn(DebateEvent) + Send + Sync>;

/// Clonable handle that lets the presentation layer stop a running session.
#[derive(Clone, Default)]
pub struct SessionControls {
    stop: Arc<AtomicBool>,
}

impl SessionControls {
    /// Ask the session to stop at the next safe point.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }
}

enum TurnEnd {
    Completed,
    Interrupted,
}

/// Orchestrates a debate between two agents.
pub struct DebateSession {
    debate: DebateConfig,
    agents: [AgentConfig; 2],
    backend: Arc<dyn GenerationBackend>,
    transcript: Transcript,
    state: RunState,
    controls: SessionControls,
    callback: Option<DebateCallback>,
}

impl DebateSession {
    /// Create a new session. Both agent configurations are validated.
    pub fn new(
        debate: DebateConfig,
        agents: [AgentConfig; 2],
        backend: Arc<dyn GenerationBackend>,
    ) -> Result<Self, DebateError> {
        for agent in &agents {
            agent.validate()?;
        }
        Ok(Self {
            debate,
            agents,
            backend,
            transcript: Transcript::new(),
            state: RunState::Idle,
            controls: SessionControls::default(),
            callback: None,
        })
    }

    /// Set a callback for debate events.
    pub fn with_callback(mut self, callback: DebateCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Handle for stopping the session from another task.
    pub fn controls(&self) -> SessionControls {
        self.controls.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Replace both agents between runs. The next turn picks up the new
    /// configuration.
    pub fn set_agents(&mut self, agents: [AgentConfig; 2]) -> Result<(), DebateError> {
        for agent in &agents {
            agent.validate()?;
        }
        self.agents = agents;
        Ok(())
    }

    /// Replace the shared debate settings between runs.
    pub fn set_debate(&mut self, debate: DebateConfig) {
        self.debate = debate;
    }

    /// Start or resume the debate, alternating turns from wherever the
    /// transcript left off, until stopped, faulted, or the turn limit.
    pub async fn run(&mut self) -> RunOutcome {
        self.controls.clear();
        self.state = RunState::Running;
        debug!(topic = %self.debate.topic, turns = self.transcript.len(), "debate running");

        let outcome = loop {
            if self.controls.should_stop() {
                break RunOutcome::Stopped;
            }
            if self.transcript.len() as u32 >= self.debate.max_turns {
                break RunOutcome::TurnLimit;
            }
            match self.take_turn().await {
                Ok(TurnEnd::Completed) => {}
                Ok(TurnEnd::Interrupted) => break RunOutcome::Stopped,
                Err(err) => {
                    warn!(error = %err, "turn failed");
                    self.emit(DebateEvent::RunError {
                        message: err.to_string(),
                    });
                    break RunOutcome::Faulted;
                }
            }
        };

        self.state = RunState::Stopped;
        self.emit(DebateEvent::RunEnded { outcome });
        debug!(?outcome, turns = self.transcript.len(), "debate paused");
        outcome
    }

    /// Clear the transcript and return to the initial state.
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.state = RunState::Idle;
        self.controls.clear();
    }

    async fn take_turn(&mut self) -> Result<TurnEnd, DebateError> {
        let speaker = self.transcript.next_speaker();
        let agent = self.agents[speaker].clone();
        let opponent = &self.agents[1 - speaker];

        let request = GenerateRequest {
            model: agent.model.clone(),
            prompt: prompt::compose(&agent, &self.debate, &self.transcript),
            options: GenerateOptions {
                temperature: agent.temperature,
                top_k: agent.top_k,
                stop: vec![prompt::stop_marker(opponent)],
            },
            stream: true,
        };

        self.emit(DebateEvent::TurnStart {
            speaker,
            speaker_name: agent.name.clone(),
        });
        debug!(speaker = %agent.name, model = %agent.model, "turn started");

        let mut stream = self.backend.generate(request).await?;
        let mut buffer = String::new();
        while let Some(item) = stream.next().await {
            let chunk = item?;
            if !chunk.response.is_empty() {
                buffer.push_str(&chunk.response);
                self.emit(DebateEvent::TurnToken {
                    speaker,
                    text: chunk.response,
                });
            }
            if chunk.done {
                break;
            }
            if self.controls.should_stop() {
                debug!(speaker = %agent.name, "turn interrupted, partial text discarded");
                self.emit(DebateEvent::TurnAborted { speaker });
                return Ok(TurnEnd::Interrupted);
            }
        }

        let entry = TranscriptEntry {
            speaker,
            speaker_name: agent.name,
            text: buffer.trim().to_string(),
        };
        self.transcript.push(entry.clone());
        self.emit(DebateEvent::TurnComplete { entry });
        Ok(TurnEnd::Completed)
    }

    fn emit(&self, event: DebateEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::{GenerateChunk, TokenStream};

    use async_trait::async_trait;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type ScriptedTurn = Vec<Result<GenerateChunk, DebateError>>;

    /// Backend that replays pre-scripted token streams, one per turn.
    struct ScriptedBackend {
        turns: Mutex<VecDeque<ScriptedTurn>>,
    }

    impl ScriptedBackend {
        fn new(turns: Vec<ScriptedTurn>) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(turns.into()),
            })
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn generate(&self, _request: GenerateRequest) -> Result<TokenStream, DebateError> {
            let turn = self
                .turns
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| vec![Err(DebateError::Server("script exhausted".into()))]);
            Ok(Box::pin(stream::iter(turn)))
        }
    }

    fn token(text: &str) -> Result<GenerateChunk, DebateError> {
        Ok(GenerateChunk {
            response: text.to_string(),
            done: false,
        })
    }

    fn done() -> Result<GenerateChunk, DebateError> {
        Ok(GenerateChunk {
            response: String::new(),
            done: true,
        })
    }

    fn text_turn(words: &[&str]) -> ScriptedTurn {
        let mut turn: ScriptedTurn = words.iter().map(|w| token(w)).collect();
        turn.push(done());
        turn
    }

    fn agents() -> [AgentConfig; 2] {
        [
            AgentConfig::new("Alice", "llama3:8b"),
            AgentConfig::new("Bob", "mistral:7b"),
        ]
    }

    fn session_with(
        turns: Vec<ScriptedTurn>,
        max_turns: u32,
    ) -> (DebateSession, Arc<Mutex<Vec<DebateEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let session = DebateSession::new(
            DebateConfig::new("Tea vs coffee").with_max_turns(max_turns),
            agents(),
            ScriptedBackend::new(turns),
        )
        .unwrap()
        .with_callback(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        }));
        (session, events)
    }

    fn count_errors(events: &[DebateEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, DebateEvent::RunError { .. }))
            .count()
    }

    #[test]
    fn test_new_session_is_idle() {
        let (session, _) = session_with(vec![], 4);
        assert_eq!(session.state(), RunState::Idle);
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_agent() {
        let backend = ScriptedBackend::new(vec![]);
        let result = DebateSession::new(
            DebateConfig::new("t"),
            [AgentConfig::new("A", ""), AgentConfig::new("B", "m")],
            backend,
        );
        assert!(matches!(result, Err(DebateError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_turns_alternate_between_agents() {
        let (mut session, _) = session_with(
            vec![
                text_turn(&["Tea ", "is best."]),
                text_turn(&["Coffee ", "is best."]),
                text_turn(&["No, tea."]),
                text_turn(&["No, coffee."]),
            ],
            4,
        );

        let outcome = session.run().await;
        assert_eq!(outcome, RunOutcome::TurnLimit);
        assert_eq!(session.state(), RunState::Stopped);

        let entries = session.transcript().entries();
        assert_eq!(entries.len(), 4);
        let speakers: Vec<usize> = entries.iter().map(|e| e.speaker).collect();
        assert_eq!(speakers, vec![0, 1, 0, 1]);
        assert_eq!(entries[0].text, "Tea is best.");
        assert_eq!(entries[0].speaker_name, "Alice");
        assert_eq!(entries[1].text, "Coffee is best.");
    }

    #[tokio::test]
    async fn test_tokens_are_relayed_before_turn_completes() {
        let (mut session, events) = session_with(vec![text_turn(&["a", "b", "c"])], 1);
        session.run().await;

        let events = events.lock().unwrap();
        let tokens: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                DebateEvent::TurnToken { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(tokens, vec!["a", "b", "c"]);

        let complete_at = events
            .iter()
            .position(|e| matches!(e, DebateEvent::TurnComplete { .. }))
            .unwrap();
        let last_token_at = events
            .iter()
            .rposition(|e| matches!(e, DebateEvent::TurnToken { .. }))
            .unwrap();
        assert!(last_token_at < complete_at);
    }

    #[tokio::test]
    async fn test_stop_at_turn_boundary_then_resume_switches_speaker() {
        let (mut session, events) = session_with(
            vec![
                text_turn(&["one"]),
                text_turn(&["two"]),
                text_turn(&["three"]),
            ],
            3,
        );

        // The display sink doubles as the stop button: stop after two turns.
        let controls = session.controls();
        let counter = Arc::new(Mutex::new(0usize));
        let sink_events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sink_events);
        session = session.with_callback(Box::new(move |event| {
            if matches!(event, DebateEvent::TurnComplete { .. }) {
                let mut n = counter.lock().unwrap();
                *n += 1;
                if *n == 2 {
                    controls.stop();
                }
            }
            sink.lock().unwrap().push(event);
        }));
        drop(events);

        let outcome = session.run().await;
        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(session.state(), RunState::Stopped);
        assert_eq!(session.transcript().len(), 2);
        let before: Vec<String> = session
            .transcript()
            .entries()
            .iter()
            .map(|e| e.text.clone())
            .collect();

        // Resume: the agent that did not speak second takes the next turn.
        assert_eq!(session.transcript().next_speaker(), 0);
        let outcome = session.run().await;
        assert_eq!(outcome, RunOutcome::TurnLimit);
        let entries = session.transcript().entries();
        assert_eq!(entries[2].speaker, 0);
        assert_eq!(entries[2].text, "three");
        // Earlier entries are untouched, in order.
        assert_eq!(entries[0].text, before[0]);
        assert_eq!(entries[1].text, before[1]);
    }

    #[tokio::test]
    async fn test_midstream_failure_keeps_prior_turns_and_stops() {
        let (mut session, events) = session_with(
            vec![
                text_turn(&["one"]),
                text_turn(&["two"]),
                vec![token("par"), Err(DebateError::Server("boom".into()))],
            ],
            100,
        );

        let outcome = session.run().await;
        assert_eq!(outcome, RunOutcome::Faulted);
        assert_eq!(session.state(), RunState::Stopped);
        // The failed turn is not committed, not even partially.
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(count_errors(&events.lock().unwrap()), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_before_first_token() {
        let (mut session, events) =
            session_with(vec![vec![Err(DebateError::Server("unreachable".into()))]], 10);

        let outcome = session.run().await;
        assert_eq!(outcome, RunOutcome::Faulted);
        assert!(session.transcript().is_empty());
        assert_eq!(count_errors(&events.lock().unwrap()), 1);
    }

    #[tokio::test]
    async fn test_stop_midstream_discards_partial_turn() {
        let (mut session, _) = session_with(
            vec![text_turn(&["one"]), text_turn(&["this ", "never ", "lands"])],
            100,
        );

        let controls = session.controls();
        let sink_events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sink_events);
        session = session.with_callback(Box::new(move |event| {
            // Press stop while the second turn is streaming.
            if let DebateEvent::TurnToken { speaker: 1, .. } = &event {
                controls.stop();
            }
            sink.lock().unwrap().push(event);
        }));

        let outcome = session.run().await;
        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(session.transcript().len(), 1);

        let events = sink_events.lock().unwrap();
        assert!(
            events
                .iter()
                .any(|e| matches!(e, DebateEvent::TurnAborted { speaker: 1 }))
        );

        // The interrupted agent retakes the whole turn on resume.
        assert_eq!(session.transcript().next_speaker(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_transcript_and_returns_to_idle() {
        let (mut session, _) = session_with(vec![text_turn(&["one"]), text_turn(&["two"])], 2);
        session.run().await;
        assert_eq!(session.transcript().len(), 2);

        session.reset();
        assert_eq!(session.state(), RunState::Idle);
        assert!(session.transcript().is_empty());
        assert_eq!(session.transcript().next_speaker(), 0);
    }

    #[tokio::test]
    async fn test_reset_after_midstream_stop_leaves_nothing_behind() {
        let (mut session, _) = session_with(vec![text_turn(&["a", "b", "c", "d"])], 10);

        let controls = session.controls();
        session = session.with_callback(Box::new(move |event| {
            if matches!(event, DebateEvent::TurnToken { .. }) {
                controls.stop();
            }
        }));

        session.run().await;
        session.reset();
        assert_eq!(session.state(), RunState::Idle);
        assert!(session.transcript().is_empty());

        // A fresh run starts the alternation over from the first agent with
        // nothing left over from the abandoned turn.
        let outcome = session.run().await;
        assert_eq!(outcome, RunOutcome::Faulted); // script exhausted
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_turn_limit_stops_the_run() {
        let (mut session, _) = session_with(vec![text_turn(&["one"]), text_turn(&["two"])], 1);
        let outcome = session.run().await;
        assert_eq!(outcome, RunOutcome::TurnLimit);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.state(), RunState::Stopped);
    }

    #[tokio::test]
    async fn test_updated_agents_apply_on_resume() {
        let (mut session, _) = session_with(vec![text_turn(&["one"]), text_turn(&["two"])], 100);

        let controls = session.controls();
        session = session.with_callback(Box::new(move |event| {
            if matches!(event, DebateEvent::TurnComplete { .. }) {
                controls.stop();
            }
        }));
        session.run().await;
        assert_eq!(session.transcript().len(), 1);

        let renamed = [
            AgentConfig::new("Alice", "llama3:8b"),
            AgentConfig::new("Robert", "mistral:7b"),
        ];
        session.set_agents(renamed).unwrap();
        let _ = session.run().await;
        assert_eq!(session.transcript().entries()[1].speaker_name, "Robert");
    }
}
