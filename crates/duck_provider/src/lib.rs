//! Minimal contract between the rubber-duck session engine and a duck.
//!
//! A duck receives one source line plus its surroundings and answers with an
//! observation and a follow-up question. Transport details live in the
//! implementing crates; this crate only defines the shapes that cross the
//! boundary.

use std::fmt;
use std::sync::{atomic::AtomicBool, Arc};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shared cancellation flag for one query.
pub type CancelSignal = Arc<AtomicBool>;

/// Label prefixed to replies that did not come from a real duck.
pub const LOCAL_FALLBACK_LABEL: &str = "[local fallback]";

/// How hard the duck should look at the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    Observe,
    Deeper,
}

impl Depth {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Observe => "observe",
            Self::Deeper => "deeper",
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for one duck query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuckQuery {
    pub line_num: usize,
    pub line_content: String,
    pub language: String,
    pub preceding_context: Vec<String>,
    pub depth: Depth,
}

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOrigin {
    Duck,
    LocalFallback,
}

/// Observation plus follow-up question for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuckReply {
    pub observation: String,
    pub question: String,
    pub origin: ReplyOrigin,
}

impl DuckReply {
    /// Reply produced by a real duck.
    #[must_use]
    pub fn new(observation: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            observation: observation.into(),
            question: question.into(),
            origin: ReplyOrigin::Duck,
        }
    }

    /// Reply computed locally because no duck answered.
    #[must_use]
    pub fn local(observation: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            origin: ReplyOrigin::LocalFallback,
            ..Self::new(observation, question)
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.origin == ReplyOrigin::LocalFallback
    }

    /// Text recorded in the conversation log. Degraded replies stay labelled.
    #[must_use]
    pub fn transcript_text(&self) -> String {
        let body = if self.question.trim().is_empty() {
            self.observation.clone()
        } else {
            format!("{}\n{}", self.observation, self.question)
        };

        if self.is_degraded() {
            format!("{LOCAL_FALLBACK_LABEL} {body}")
        } else {
            body
        }
    }
}

/// Failure of a single query. All variants are recoverable through the local fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuckError {
    Unavailable(String),
    Timeout(Duration),
    Cancelled,
    InvalidReply(String),
}

impl fmt::Display for DuckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "duck unavailable: {reason}"),
            Self::Timeout(after) => write!(f, "duck timed out after {}s", after.as_secs_f32()),
            Self::Cancelled => f.write_str("duck query cancelled"),
            Self::InvalidReply(reason) => write!(f, "duck returned an invalid reply: {reason}"),
        }
    }
}

impl std::error::Error for DuckError {}

/// Error returned while constructing a provider before any query runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuckInitError {
    message: String,
}

impl DuckInitError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DuckInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DuckInitError {}

impl From<String> for DuckInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for DuckInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Immutable metadata describing a duck provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuckProfile {
    pub provider_id: String,
    pub description: String,
}

/// Provider interface for answering one line at a time.
pub trait DuckProvider: Send + Sync + 'static {
    fn profile(&self) -> DuckProfile;

    /// Answers one query. Implementations should check `cancel` between steps
    /// and return [`DuckError::Cancelled`] once it is set.
    fn query(&self, query: &DuckQuery, cancel: CancelSignal) -> Result<DuckReply, DuckError>;
}
