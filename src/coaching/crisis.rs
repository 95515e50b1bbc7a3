//! Keyword screen for crisis language.
//!
//! A best-effort safety net: case-insensitive substring membership over a fixed
//! phrase list. A hit never blocks the chat; it makes the caller render the
//! crisis resources next to the reply.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const SUICIDE_PREVENTION_LIFELINE: &str = "988";
pub const CRISIS_TEXT_LINE: &str = "Text HOME to 741741";
pub const EMERGENCY_MESSAGE: &str =
    "If you are in immediate danger, please call 911 or go to your nearest emergency room.";

const DEFAULT_PHRASES: &[&str] = &[
    "suicide",
    "kill myself",
    "end it all",
    "want to die",
    "no reason to live",
    "self harm",
    "hurt myself",
    "cut myself",
    "overdose",
    "hopeless",
    "can't go on",
    "better off dead",
    "harm others",
    "kill someone",
    "revenge",
    "make them pay",
];

static DEFAULT_DETECTOR: Lazy<CrisisDetector> =
    Lazy::new(|| CrisisDetector::with_phrases(DEFAULT_PHRASES.iter().copied()));

/// Resources surfaced to the presentation layer whenever a message trips the detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisResources {
    pub suicide_prevention_lifeline: String,
    pub crisis_text_line: String,
    pub message: String,
}

impl CrisisResources {
    pub fn standard() -> Self {
        Self {
            suicide_prevention_lifeline: SUICIDE_PREVENTION_LIFELINE.to_string(),
            crisis_text_line: CRISIS_TEXT_LINE.to_string(),
            message: EMERGENCY_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrisisDetector {
    /// Lowercased phrases.
    phrases: Vec<String>,
}

impl Default for CrisisDetector {
    fn default() -> Self {
        DEFAULT_DETECTOR.clone()
    }
}

impl CrisisDetector {
    pub fn with_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut phrases: Vec<String> = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        phrases.sort_unstable();
        phrases.dedup();
        Self { phrases }
    }

    /// Default phrase list extended with `extra`.
    pub fn extended<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra: Vec<String> = extra.into_iter().map(|p| p.as_ref().to_string()).collect();
        Self::with_phrases(
            DEFAULT_PHRASES
                .iter()
                .map(|p| p.to_string())
                .chain(extra),
        )
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    pub fn detect(&self, message: &str) -> bool {
        let lowered = message.to_lowercase();
        self.phrases.iter().any(|phrase| lowered.contains(phrase.as_str()))
    }
}
