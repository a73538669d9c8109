//! Pure session state: a cursor over the watched file plus the conversation so far.
//!
//! Every transition borrows the current state and returns a new one, so a failed
//! transition always leaves the caller's state untouched.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use session_store::{ConversationEntry, EntryValidationError};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("already at the last line ({total_lines})")]
    EndOfFile { total_lines: usize },
    #[error("already before the first line")]
    StartOfFile,
    #[error("line {requested} is outside 0..={total_lines}")]
    OutOfRange { requested: usize, total_lines: usize },
    #[error("the session has ended")]
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("entry for line {line_num} is invalid: {source}")]
    Invalid {
        line_num: usize,
        #[source]
        source: EntryValidationError,
    },
    #[error("entry for line {line_num} is past the last line ({total_lines})")]
    BeyondEndOfFile { line_num: usize, total_lines: usize },
    #[error("the session has ended")]
    Ended,
}

/// Coverage derived purely from recorded history.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub lines_visited: usize,
    pub total_lines: usize,
    pub coverage_percent: f64,
    /// `(line, duck text)` in the order the lines were discussed.
    pub observations: Vec<(usize, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    file_path: PathBuf,
    current_line_num: usize,
    total_lines: usize,
    is_active: bool,
    conversation_history: Vec<ConversationEntry>,
    file_content_hash: Option<String>,
    started_at: OffsetDateTime,
}

impl SessionState {
    /// Fresh state with the cursor before the first line.
    #[must_use]
    pub fn create(
        file_path: impl Into<PathBuf>,
        total_lines: usize,
        file_content_hash: Option<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            current_line_num: 0,
            total_lines,
            is_active: true,
            conversation_history: Vec::new(),
            file_content_hash,
            started_at: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    #[must_use]
    pub fn current_line_num(&self) -> usize {
        self.current_line_num
    }

    #[must_use]
    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn conversation_history(&self) -> &[ConversationEntry] {
        &self.conversation_history
    }

    #[must_use]
    pub fn file_content_hash(&self) -> Option<&str> {
        self.file_content_hash.as_deref()
    }

    #[must_use]
    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub fn next_line(&self) -> Result<Self, NavigationError> {
        self.ensure_active()?;
        if self.current_line_num >= self.total_lines {
            return Err(NavigationError::EndOfFile {
                total_lines: self.total_lines,
            });
        }

        Ok(self.with_cursor(self.current_line_num + 1))
    }

    pub fn previous_line(&self) -> Result<Self, NavigationError> {
        self.ensure_active()?;
        if self.current_line_num == 0 {
            return Err(NavigationError::StartOfFile);
        }

        Ok(self.with_cursor(self.current_line_num - 1))
    }

    pub fn jump_to_line(&self, line_num: usize) -> Result<Self, NavigationError> {
        self.ensure_active()?;
        if line_num > self.total_lines {
            return Err(NavigationError::OutOfRange {
                requested: line_num,
                total_lines: self.total_lines,
            });
        }

        Ok(self.with_cursor(line_num))
    }

    #[must_use]
    pub fn has_line_been_covered(&self, line_num: usize) -> bool {
        self.conversation_history
            .iter()
            .any(|entry| entry.line_num == line_num)
    }

    /// Most recent entry recorded for `line_num`.
    #[must_use]
    pub fn latest_entry_for(&self, line_num: usize) -> Option<&ConversationEntry> {
        self.conversation_history
            .iter()
            .rev()
            .find(|entry| entry.line_num == line_num)
    }

    pub fn add_entry(&self, entry: ConversationEntry) -> Result<Self, EntryError> {
        if !self.is_active {
            return Err(EntryError::Ended);
        }
        entry.validate().map_err(|source| EntryError::Invalid {
            line_num: entry.line_num,
            source,
        })?;
        if entry.line_num > self.total_lines {
            return Err(EntryError::BeyondEndOfFile {
                line_num: entry.line_num,
                total_lines: self.total_lines,
            });
        }

        let mut next = self.clone();
        next.conversation_history.push(entry);
        Ok(next)
    }

    /// Coverage counts only lines that still exist; `observations` keeps every entry.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        let visited: BTreeSet<usize> = self
            .conversation_history
            .iter()
            .map(|entry| entry.line_num)
            .filter(|line_num| (1..=self.total_lines).contains(line_num))
            .collect();
        let coverage_percent = if self.total_lines == 0 {
            0.0
        } else {
            (visited.len() * 100) as f64 / self.total_lines as f64
        };

        SessionSummary {
            lines_visited: visited.len(),
            total_lines: self.total_lines,
            coverage_percent,
            observations: self
                .conversation_history
                .iter()
                .map(|entry| (entry.line_num, entry.duck.clone()))
                .collect(),
        }
    }

    /// Terminal: an ended session accepts no further transitions.
    #[must_use]
    pub fn end_session(&self) -> Self {
        Self {
            is_active: false,
            ..self.clone()
        }
    }

    /// Seeds history from a persisted log and resumes at the last discussed line.
    ///
    /// The cursor is clamped to `total_lines` when the file shrank since the entry
    /// was written.
    pub fn load_history(&self, prior_entries: Vec<ConversationEntry>) -> Result<Self, EntryError> {
        if !self.is_active {
            return Err(EntryError::Ended);
        }
        for entry in &prior_entries {
            entry.validate().map_err(|source| EntryError::Invalid {
                line_num: entry.line_num,
                source,
            })?;
        }

        let current_line_num = prior_entries
            .last()
            .map_or(self.current_line_num, |entry| {
                entry.line_num.min(self.total_lines)
            });

        Ok(Self {
            current_line_num,
            conversation_history: prior_entries,
            ..self.clone()
        })
    }

    fn ensure_active(&self) -> Result<(), NavigationError> {
        if self.is_active {
            Ok(())
        } else {
            Err(NavigationError::Ended)
        }
    }

    fn with_cursor(&self, current_line_num: usize) -> Self {
        Self {
            current_line_num,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use session_store::line_hash;

    use super::*;

    fn entry(line_num: usize) -> ConversationEntry {
        let line_content = format!("line {line_num}");
        ConversationEntry {
            line_num,
            line_hash: line_hash(&line_content, line_num),
            line_content,
            duck: format!("observation {line_num}"),
            user_response: "next".to_string(),
            timestamp: "2026-02-14T00:00:01Z".to_string(),
        }
    }

    fn state(total_lines: usize) -> SessionState {
        SessionState::create("src/lib.rs", total_lines, Some("feedface".to_string()))
    }

    #[test]
    fn create_starts_before_first_line() {
        let state = state(10);
        assert_eq!(state.current_line_num(), 0);
        assert!(state.is_active());
        assert!(state.conversation_history().is_empty());
        assert_eq!(state.file_content_hash(), Some("feedface"));
    }

    #[test]
    fn next_line_fails_at_end_and_leaves_state_unchanged() {
        let at_end = state(10).jump_to_line(10).expect("jump to last line");
        let before = at_end.clone();

        assert_eq!(
            at_end.next_line(),
            Err(NavigationError::EndOfFile { total_lines: 10 })
        );
        assert_eq!(at_end, before);
    }

    #[test]
    fn previous_line_fails_at_start() {
        let start = state(3);
        assert_eq!(start.previous_line(), Err(NavigationError::StartOfFile));
        assert_eq!(start.current_line_num(), 0);

        let moved = start.next_line().and_then(|s| s.next_line()).expect("advance");
        assert_eq!(moved.previous_line().expect("back").current_line_num(), 1);
    }

    #[test]
    fn jump_to_line_validates_range() {
        let state = state(5);
        assert_eq!(state.jump_to_line(0).expect("zero is valid").current_line_num(), 0);
        assert_eq!(state.jump_to_line(5).expect("last is valid").current_line_num(), 5);
        assert_eq!(
            state.jump_to_line(6),
            Err(NavigationError::OutOfRange {
                requested: 6,
                total_lines: 5
            })
        );
    }

    #[test]
    fn add_entry_appends_and_tracks_coverage() {
        let state = state(10);
        let next = state.add_entry(entry(2)).expect("valid entry");

        assert!(state.conversation_history().is_empty());
        assert!(next.has_line_been_covered(2));
        assert!(!next.has_line_been_covered(3));
    }

    #[test]
    fn add_entry_rejects_missing_fields() {
        let mut invalid = entry(2);
        invalid.duck.clear();

        assert!(matches!(
            state(10).add_entry(invalid),
            Err(EntryError::Invalid { line_num: 2, .. })
        ));
    }

    #[test]
    fn add_entry_rejects_lines_past_end_of_file() {
        let state = state(2);
        assert_eq!(
            state.add_entry(entry(9)),
            Err(EntryError::BeyondEndOfFile {
                line_num: 9,
                total_lines: 2
            })
        );
        assert!(state.add_entry(entry(2)).is_ok());
    }

    #[test]
    fn summary_reports_distinct_lines_and_coverage() {
        let mut state = state(10);
        for line_num in [1, 2, 3, 2] {
            state = state.add_entry(entry(line_num)).expect("valid entry");
        }

        let summary = state.summary();
        assert_eq!(summary.lines_visited, 3);
        assert_eq!(summary.coverage_percent, 30.0);
        let lines: Vec<usize> = summary.observations.iter().map(|(line, _)| *line).collect();
        assert_eq!(lines, vec![1, 2, 3, 2]);
    }

    #[test]
    fn summary_ignores_lines_past_end_of_shrunk_file() {
        let loaded = state(2)
            .load_history((1..=5).map(entry).collect())
            .expect("valid history");

        let summary = loaded.summary();
        assert_eq!(summary.lines_visited, 2);
        assert_eq!(summary.coverage_percent, 100.0);
        assert_eq!(summary.observations.len(), 5);
    }

    #[test]
    fn summary_of_empty_file_is_zero() {
        assert_eq!(state(0).summary().coverage_percent, 0.0);
    }

    #[test]
    fn load_history_resumes_at_last_discussed_line() {
        let loaded = state(10)
            .load_history(vec![entry(1), entry(4), entry(3)])
            .expect("valid history");

        assert_eq!(loaded.current_line_num(), 3);
        assert_eq!(loaded.summary().lines_visited, 3);
        assert_eq!(
            loaded.latest_entry_for(4).map(|entry| entry.line_num),
            Some(4)
        );
    }

    #[test]
    fn load_history_clamps_cursor_when_file_shrank() {
        let loaded = state(2)
            .load_history(vec![entry(1), entry(9)])
            .expect("valid history");
        assert_eq!(loaded.current_line_num(), 2);
    }

    #[test]
    fn ended_session_is_terminal() {
        let ended = state(3).end_session();
        assert!(!ended.is_active());
        assert_eq!(ended.next_line(), Err(NavigationError::Ended));
        assert_eq!(ended.add_entry(entry(1)), Err(EntryError::Ended));
    }
}
