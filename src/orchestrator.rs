//! Interactive loop binding storage, session state and the duck.
//!
//! The orchestrator is driven one input at a time through
//! [`Orchestrator::handle_input`]; everything the user should see is reported
//! through the `emit` callback as [`SessionEvent`]s. Entries are appended to the
//! log on `next`, `stop` and `close` before the call returns.

use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use duck_provider::{CancelSignal, Depth, DuckError, DuckProvider, DuckQuery, DuckReply};
use duck_provider_local::{generate_fallback_deeper, generate_fallback_observation};
use session_store::{line_hash, ConversationEntry, SessionStore, SessionStoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::{parse_command, DuckCommand};
use crate::config::{DEFAULT_CONTEXT_LINES, DEFAULT_TIMEOUT_SECS};
use crate::registry::{SessionClaim, SessionRegistry};
use crate::source::SourceFile;
use crate::state::{EntryError, NavigationError, SessionState, SessionSummary};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("a session for this file is already active ({path})")]
    AlreadyActive { path: PathBuf },
    #[error(transparent)]
    Storage(#[from] SessionStoreError),
    #[error(transparent)]
    Entry(#[from] EntryError),
    #[error("the session has ended")]
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    AwaitingObservation,
    AwaitingCommand,
    Ended,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started {
        file: PathBuf,
        total_lines: usize,
        language: &'static str,
        provider: String,
    },
    Resumed {
        entries: usize,
        line_num: usize,
    },
    /// Logged lines whose text changed, or that no longer exist, since they were discussed.
    Drift {
        changed_lines: Vec<usize>,
        missing_lines: Vec<usize>,
    },
    EmptyFile,
    Observation {
        line_num: usize,
        line_content: String,
        reply: DuckReply,
        depth: Depth,
    },
    Replay {
        line_num: usize,
        line_content: String,
        entry: ConversationEntry,
        drifted: bool,
    },
    Degraded {
        line_num: usize,
        reason: String,
    },
    BlankLine {
        line_num: usize,
    },
    Persisted {
        line_num: usize,
    },
    Noted {
        line_num: usize,
        persisted: bool,
    },
    Discarded {
        line_num: usize,
    },
    Refused {
        reason: String,
    },
    EndOfFile {
        total_lines: usize,
    },
    Summary(SessionSummary),
    Help,
    Archived {
        path: PathBuf,
    },
    Ended {
        entries: usize,
        archived: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    pub query_timeout: Duration,
    pub context_lines: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

/// What has been said about the current line since the cursor arrived.
///
/// Only a turn holding at least one duck reply is written to the log.
#[derive(Debug, Clone, Default)]
struct Turn {
    line_num: usize,
    line_content: String,
    replies: Vec<String>,
    answers: Vec<String>,
}

impl Turn {
    fn at(line_num: usize, line_content: &str) -> Self {
        Self {
            line_num,
            line_content: line_content.to_string(),
            ..Self::default()
        }
    }

    fn is_pending(&self) -> bool {
        !self.replies.is_empty()
    }
}

pub struct Orchestrator {
    store: SessionStore,
    provider: Arc<dyn DuckProvider>,
    source: SourceFile,
    options: OrchestratorOptions,
    state: SessionState,
    phase: Phase,
    turn: Option<Turn>,
    _claim: SessionClaim,
}

impl Orchestrator {
    /// Loads or resumes the session for `source` and presents the first line.
    pub fn start(
        store: SessionStore,
        provider: Arc<dyn DuckProvider>,
        registry: &Arc<SessionRegistry>,
        source: SourceFile,
        options: OrchestratorOptions,
        emit: &mut dyn FnMut(SessionEvent),
    ) -> Result<Self, OrchestratorError> {
        let log_path = store.log_path(source.path())?;
        let claim = registry
            .claim(&log_path)
            .ok_or_else(|| OrchestratorError::AlreadyActive {
                path: log_path.clone(),
            })?;

        let prior_entries = store.load_session(source.path())?;
        let mut state = SessionState::create(
            source.path(),
            source.total_lines(),
            Some(source.content_hash().to_string()),
        );

        if prior_entries.is_empty() {
            emit(SessionEvent::Started {
                file: source.path().to_path_buf(),
                total_lines: source.total_lines(),
                language: source.language(),
                provider: provider.profile().provider_id,
            });
        } else {
            let drift = detect_drift(&source, &prior_entries);
            state = state.load_history(prior_entries)?;
            info!(
                log = %log_path.display(),
                entries = state.conversation_history().len(),
                line_num = state.current_line_num(),
                "resuming rubber duck session"
            );
            emit(SessionEvent::Resumed {
                entries: state.conversation_history().len(),
                line_num: state.current_line_num(),
            });
            if let Some(drift) = drift {
                emit(drift);
            }
        }

        let mut orchestrator = Self {
            store,
            provider,
            source,
            options,
            state,
            phase: Phase::Initializing,
            turn: None,
            _claim: claim,
        };

        if orchestrator.source.total_lines() == 0 {
            emit(SessionEvent::EmptyFile);
            orchestrator.finish(None, emit);
            return Ok(orchestrator);
        }

        if orchestrator.state.current_line_num() == 0 {
            orchestrator.state = orchestrator
                .state
                .next_line()
                .map_err(|_| OrchestratorError::Ended)?;
        }
        orchestrator.visit_current_line(emit);
        Ok(orchestrator)
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.phase == Phase::Ended
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    /// Handles one line of user input.
    ///
    /// A storage failure is returned with the state left exactly as it was after
    /// the last successful append, so the same command can be retried.
    pub fn handle_input(
        &mut self,
        input: &str,
        emit: &mut dyn FnMut(SessionEvent),
    ) -> Result<(), OrchestratorError> {
        if self.is_ended() {
            return Err(OrchestratorError::Ended);
        }

        match parse_command(input) {
            DuckCommand::Next => self.next(emit)?,
            DuckCommand::Back => self.back(emit),
            DuckCommand::Goto(line_num) => self.goto(line_num, emit),
            DuckCommand::Deeper => self.deeper(emit),
            DuckCommand::Summary => emit(SessionEvent::Summary(self.state.summary())),
            DuckCommand::Stop => self.stop(emit)?,
            DuckCommand::Close => self.close(emit)?,
            DuckCommand::Help | DuckCommand::Empty => emit(SessionEvent::Help),
            DuckCommand::Reply(text) => self.note_answer(text, emit),
            DuckCommand::Invalid { reason, .. } => {
                emit(SessionEvent::Refused { reason });
                emit(SessionEvent::Help);
            }
        }
        Ok(())
    }

    fn next(&mut self, emit: &mut dyn FnMut(SessionEvent)) -> Result<(), OrchestratorError> {
        self.commit_turn("next", emit)?;
        match self.state.next_line() {
            Ok(next) => {
                self.state = next;
                self.visit_current_line(emit);
            }
            Err(NavigationError::EndOfFile { total_lines }) => {
                emit(SessionEvent::EndOfFile { total_lines });
                emit(SessionEvent::Summary(self.state.summary()));
            }
            Err(error) => emit(SessionEvent::Refused {
                reason: error.to_string(),
            }),
        }
        Ok(())
    }

    fn back(&mut self, emit: &mut dyn FnMut(SessionEvent)) {
        match self.state.previous_line() {
            Ok(previous) if previous.current_line_num() > 0 => self.move_to(previous, emit),
            Ok(_) | Err(NavigationError::StartOfFile) => emit(SessionEvent::Refused {
                reason: "already at the first line".to_string(),
            }),
            Err(error) => emit(SessionEvent::Refused {
                reason: error.to_string(),
            }),
        }
    }

    fn goto(&mut self, line_num: usize, emit: &mut dyn FnMut(SessionEvent)) {
        if line_num == 0 {
            emit(SessionEvent::Refused {
                reason: format!("line numbers start at 1 (1..={})", self.state.total_lines()),
            });
            return;
        }
        match self.state.jump_to_line(line_num) {
            Ok(jumped) => self.move_to(jumped, emit),
            Err(error) => emit(SessionEvent::Refused {
                reason: error.to_string(),
            }),
        }
    }

    /// Leaves the current line without writing anything for it.
    fn move_to(&mut self, target: SessionState, emit: &mut dyn FnMut(SessionEvent)) {
        if let Some(turn) = self.turn.take() {
            if turn.is_pending() {
                debug!(line_num = turn.line_num, "discarding uncommitted turn");
                emit(SessionEvent::Discarded {
                    line_num: turn.line_num,
                });
            }
        }
        self.state = target;
        self.visit_current_line(emit);
    }

    fn deeper(&mut self, emit: &mut dyn FnMut(SessionEvent)) {
        let line_num = self.state.current_line_num();
        let line_content = self.current_line_content();
        if line_content.trim().is_empty() {
            emit(SessionEvent::Refused {
                reason: format!("line {line_num} is blank; there is nothing deeper to find"),
            });
            return;
        }

        let reply = self.ask_duck(line_num, &line_content, Depth::Deeper, emit);
        self.turn
            .get_or_insert_with(|| Turn::at(line_num, &line_content))
            .replies
            .push(reply.transcript_text());
        emit(SessionEvent::Observation {
            line_num,
            line_content,
            reply,
            depth: Depth::Deeper,
        });
    }

    fn note_answer(&mut self, text: String, emit: &mut dyn FnMut(SessionEvent)) {
        let line_num = self.state.current_line_num();
        let line_content = self.current_line_content();
        let turn = self
            .turn
            .get_or_insert_with(|| Turn::at(line_num, &line_content));
        turn.answers.push(text);
        emit(SessionEvent::Noted {
            line_num,
            persisted: turn.is_pending(),
        });
        emit(SessionEvent::Help);
    }

    fn stop(&mut self, emit: &mut dyn FnMut(SessionEvent)) -> Result<(), OrchestratorError> {
        self.commit_turn("stop", emit)?;
        if self.state.conversation_history().is_empty() {
            self.store.delete_session_if_empty(self.source.path())?;
        }
        self.finish(None, emit);
        Ok(())
    }

    fn close(&mut self, emit: &mut dyn FnMut(SessionEvent)) -> Result<(), OrchestratorError> {
        self.commit_turn("close", emit)?;
        if self.state.conversation_history().is_empty() {
            self.store.delete_session_if_empty(self.source.path())?;
        }
        let archived = self.store.archive_session(self.source.path())?;
        if let Some(path) = &archived {
            emit(SessionEvent::Archived { path: path.clone() });
        }
        self.finish(archived, emit);
        Ok(())
    }

    fn finish(&mut self, archived: Option<PathBuf>, emit: &mut dyn FnMut(SessionEvent)) {
        self.turn = None;
        self.state = self.state.end_session();
        self.set_phase(Phase::Ended);
        let entries = self.state.conversation_history().len();
        info!(
            file = %self.source.path().display(),
            entries,
            archived = archived.is_some(),
            "rubber duck session ended"
        );
        emit(SessionEvent::Ended { entries, archived });
    }

    /// Appends the pending turn, if any, and records it in the session state.
    fn commit_turn(
        &mut self,
        command_word: &str,
        emit: &mut dyn FnMut(SessionEvent),
    ) -> Result<(), OrchestratorError> {
        let Some(turn) = self.turn.as_ref().filter(|turn| turn.is_pending()) else {
            return Ok(());
        };

        let duck = turn.replies.join("\n\n");
        let user_response = if turn.answers.is_empty() {
            command_word.to_string()
        } else {
            turn.answers.join("\n")
        };
        let entry = self.store.append_entry(
            self.source.path(),
            turn.line_num,
            &turn.line_content,
            &duck,
            &user_response,
        )?;
        let line_num = entry.line_num;
        self.state = self.state.add_entry(entry)?;
        if let Some(turn) = self.turn.as_mut() {
            turn.replies.clear();
            turn.answers.clear();
        }
        emit(SessionEvent::Persisted { line_num });
        Ok(())
    }

    /// Replays the logged entry for the current line, or asks the duck about it.
    fn visit_current_line(&mut self, emit: &mut dyn FnMut(SessionEvent)) {
        let line_num = self.state.current_line_num();
        let line_content = self.current_line_content();
        self.turn = Some(Turn::at(line_num, &line_content));

        if let Some(entry) = self.state.latest_entry_for(line_num) {
            let drifted = entry.line_hash != line_hash(&line_content, line_num);
            emit(SessionEvent::Replay {
                line_num,
                line_content,
                entry: entry.clone(),
                drifted,
            });
            self.set_phase(Phase::AwaitingCommand);
            return;
        }

        if line_content.trim().is_empty() {
            emit(SessionEvent::BlankLine { line_num });
            self.set_phase(Phase::AwaitingCommand);
            return;
        }

        self.set_phase(Phase::AwaitingObservation);
        let reply = self.ask_duck(line_num, &line_content, Depth::Observe, emit);
        if let Some(turn) = self.turn.as_mut() {
            turn.replies.push(reply.transcript_text());
        }
        emit(SessionEvent::Observation {
            line_num,
            line_content,
            reply,
            depth: Depth::Observe,
        });
        self.set_phase(Phase::AwaitingCommand);
    }

    fn ask_duck(
        &self,
        line_num: usize,
        line_content: &str,
        depth: Depth,
        emit: &mut dyn FnMut(SessionEvent),
    ) -> DuckReply {
        let query = DuckQuery {
            line_num,
            line_content: line_content.to_string(),
            language: self.source.language().to_string(),
            preceding_context: self
                .source
                .preceding_context(line_num, self.options.context_lines),
            depth,
        };

        let outcome = query_with_timeout(
            Arc::clone(&self.provider),
            query,
            self.options.query_timeout,
        )
        .and_then(|reply| {
            if reply.observation.trim().is_empty() {
                Err(DuckError::InvalidReply("empty observation".to_string()))
            } else {
                Ok(reply)
            }
        });

        match outcome {
            Ok(reply) => reply,
            Err(error) => {
                warn!(line_num, %depth, %error, "duck query failed; using local fallback");
                emit(SessionEvent::Degraded {
                    line_num,
                    reason: error.to_string(),
                });
                match depth {
                    Depth::Observe => generate_fallback_observation(line_num, line_content),
                    Depth::Deeper => generate_fallback_deeper(line_num, line_content),
                }
            }
        }
    }

    fn current_line_content(&self) -> String {
        self.source
            .line(self.state.current_line_num())
            .unwrap_or_default()
            .to_string()
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "orchestrator phase change");
            self.phase = phase;
        }
    }
}

/// Runs one query on a worker thread and gives up after `timeout`.
///
/// On timeout the query's cancel flag is raised and the worker is abandoned;
/// its late reply is dropped with the channel.
fn query_with_timeout(
    provider: Arc<dyn DuckProvider>,
    query: DuckQuery,
    timeout: Duration,
) -> Result<DuckReply, DuckError> {
    let cancel: CancelSignal = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let (sender, receiver) = mpsc::channel();

    thread::Builder::new()
        .name(format!("rubber-duck-query-{}", query.line_num))
        .spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| provider.query(&query, worker_cancel)));
            let result = outcome
                .unwrap_or_else(|_| Err(DuckError::Unavailable("duck provider panicked".to_string())));
            let _ = sender.send(result);
        })
        .map_err(|error| DuckError::Unavailable(format!("failed to spawn query worker: {error}")))?;

    match receiver.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            cancel.store(true, Ordering::SeqCst);
            Err(DuckError::Timeout(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => Err(DuckError::Unavailable(
            "query worker exited without replying".to_string(),
        )),
    }
}

fn detect_drift(source: &SourceFile, entries: &[ConversationEntry]) -> Option<SessionEvent> {
    let mut changed_lines = BTreeSet::new();
    let mut missing_lines = BTreeSet::new();
    for entry in entries {
        match source.line(entry.line_num) {
            Some(current) if line_hash(current, entry.line_num) != entry.line_hash => {
                changed_lines.insert(entry.line_num);
            }
            Some(_) => {}
            None => {
                missing_lines.insert(entry.line_num);
            }
        }
    }

    if changed_lines.is_empty() && missing_lines.is_empty() {
        return None;
    }
    warn!(
        changed = changed_lines.len(),
        missing = missing_lines.len(),
        "watched file drifted since the last session"
    );
    Some(SessionEvent::Drift {
        changed_lines: changed_lines.into_iter().collect(),
        missing_lines: missing_lines.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingDuck;

    impl DuckProvider for PanickingDuck {
        fn profile(&self) -> duck_provider::DuckProfile {
            duck_provider::DuckProfile {
                provider_id: "panicking".to_string(),
                description: "always panics".to_string(),
            }
        }

        fn query(&self, _query: &DuckQuery, _cancel: CancelSignal) -> Result<DuckReply, DuckError> {
            panic!("duck exploded");
        }
    }

    struct SleepyDuck;

    impl DuckProvider for SleepyDuck {
        fn profile(&self) -> duck_provider::DuckProfile {
            duck_provider::DuckProfile {
                provider_id: "sleepy".to_string(),
                description: "answers too late".to_string(),
            }
        }

        fn query(&self, _query: &DuckQuery, cancel: CancelSignal) -> Result<DuckReply, DuckError> {
            while !cancel.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(5));
            }
            Err(DuckError::Cancelled)
        }
    }

    fn query() -> DuckQuery {
        DuckQuery {
            line_num: 1,
            line_content: "x = 1".to_string(),
            language: "python".to_string(),
            preceding_context: Vec::new(),
            depth: Depth::Observe,
        }
    }

    #[test]
    fn panicking_provider_is_reported_as_unavailable() {
        let result = query_with_timeout(Arc::new(PanickingDuck), query(), Duration::from_secs(5));
        assert_eq!(
            result,
            Err(DuckError::Unavailable("duck provider panicked".to_string()))
        );
    }

    #[test]
    fn slow_provider_times_out() {
        let timeout = Duration::from_millis(50);
        let result = query_with_timeout(Arc::new(SleepyDuck), query(), timeout);
        assert_eq!(result, Err(DuckError::Timeout(timeout)));
    }

    #[test]
    fn drift_reports_changed_and_missing_lines() {
        let source = SourceFile::from_content("a.py", "x = 1\ny = 3\n");
        let entry = |line_num: usize, content: &str| ConversationEntry {
            line_num,
            line_hash: line_hash(content, line_num),
            line_content: content.to_string(),
            duck: "noted".to_string(),
            user_response: "next".to_string(),
            timestamp: "2026-02-14T00:00:01Z".to_string(),
        };

        let drift = detect_drift(
            &source,
            &[entry(1, "x = 1"), entry(2, "y = 2"), entry(5, "z = 9")],
        );
        assert_eq!(
            drift,
            Some(SessionEvent::Drift {
                changed_lines: vec![2],
                missing_lines: vec![5],
            })
        );
        assert_eq!(detect_drift(&source, &[entry(1, "x = 1")]), None);
    }
}
