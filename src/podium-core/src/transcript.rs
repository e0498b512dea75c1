//! The shared debate transcript.
//!
//! Append-only while a run is in progress, cleared entirely on reset. The
//! session is the only writer; the display reads it through `entries()`.

use serde::{Deserialize, Serialize};

/// One completed turn in the debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Index of the speaker (0 or 1).
    pub speaker: usize,
    /// Speaker's display name.
    pub speaker_name: String,
    /// The full text of the turn.
    pub text: String,
}

/// Ordered conversation history.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Which agent speaks next: the one that did not speak last, or agent 0
    /// when the transcript is empty.
    pub fn next_speaker(&self) -> usize {
        match self.entries.last() {
            None => 0,
            Some(entry) => 1 - entry.speaker,
        }
    }

    /// Render the whole transcript as `Name: text` lines.
    pub fn render(&self) -> String {
        self.entries.iter().map(render_line).collect()
    }

    /// Render the most recent part of the transcript, capped at `max_chars`
    /// characters. Whole oldest entries are dropped first; if the newest
    /// entry alone exceeds the cap, its oldest characters are dropped so the
    /// result is always a suffix of the rendered history.
    pub fn render_tail(&self, max_chars: usize) -> String {
        let mut kept: Vec<String> = Vec::new();
        let mut used = 0usize;
        for entry in self.entries.iter().rev() {
            let line = render_line(entry);
            let len = line.chars().count();
            if used + len > max_chars {
                if kept.is_empty() && max_chars > 0 {
                    kept.push(char_tail(&line, max_chars));
                }
                break;
            }
            used += len;
            kept.push(line);
        }
        kept.reverse();
        kept.concat()
    }
}

fn render_line(entry: &TranscriptEntry) -> String {
    format!("{}: {}\n", entry.speaker_name, entry.text)
}

/// The last `max_chars` characters of `text`.
fn char_tail(text: &str, max_chars: usize) -> String {
    let len = text.chars().count();
    text.chars().skip(len.saturating_sub(max_chars)).collect()
}
