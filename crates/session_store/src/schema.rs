use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// One persisted turn: what the duck said about a line and how the user answered.
///
/// Serialized as exactly one camelCase JSON object per log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConversationEntry {
    pub line_num: usize,
    pub line_hash: String,
    pub line_content: String,
    pub duck: String,
    pub user_response: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryValidationError {
    #[error("lineNum must be 1 or greater")]
    ZeroLineNumber,
    #[error("lineContent must not be empty")]
    EmptyLineContent,
    #[error("duck text must not be empty")]
    EmptyDuck,
    #[error("lineHash must not be empty")]
    EmptyLineHash,
    #[error("timestamp is not RFC3339: {0}")]
    InvalidTimestamp(String),
}

impl ConversationEntry {
    /// Checks the required fields; the same rules apply on append and on load.
    pub fn validate(&self) -> Result<(), EntryValidationError> {
        if self.line_num == 0 {
            return Err(EntryValidationError::ZeroLineNumber);
        }
        if self.line_content.is_empty() {
            return Err(EntryValidationError::EmptyLineContent);
        }
        if self.duck.trim().is_empty() {
            return Err(EntryValidationError::EmptyDuck);
        }
        if self.line_hash.is_empty() {
            return Err(EntryValidationError::EmptyLineHash);
        }
        if OffsetDateTime::parse(&self.timestamp, &Rfc3339).is_err() {
            return Err(EntryValidationError::InvalidTimestamp(
                self.timestamp.clone(),
            ));
        }

        Ok(())
    }
}
