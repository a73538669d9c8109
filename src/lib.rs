//! Rubber-duck review sessions: walk a source file line by line with a duck
//! that observes each line and asks a follow-up question.
//!
//! Conversations are appended to `<workspace>/.rhizome/vscodestate/rubber/` as
//! one JSON line per discussed line, so an interrupted session resumes at the
//! last discussed line.
//!
//! ## Environment
//!
//! - `RUBBER_DUCK_PROVIDER=local` (default) answers with built-in heuristics.
//! - `RUBBER_DUCK_PROVIDER=process` runs `RUBBER_DUCK_COMMAND` once per query,
//!   writing the query as JSON to its stdin and reading
//!   `{"observation": "...", "question": "..."}` from its stdout.
//! - `RUBBER_DUCK_TIMEOUT_SEC` bounds each query (default 30, must be > 0).
//!   A query that fails or times out falls back to a local observation that is
//!   labelled `[local fallback]` in the log.
//! - `RUBBER_DUCK_CONTEXT_LINES` preceding lines sent with each query (default 5).
//! - `RUBBER_DUCK_ARCHIVE_RETENTION_DAYS` age after which `prune` deletes
//!   archived logs. Unset keeps them forever.
//! - `RUBBER_DUCK_LOG` tracing filter for diagnostics on stderr (default `warn`).

pub mod commands;
pub mod config;
pub mod console;
pub mod logging;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod render;
pub mod source;
pub mod state;

pub use crate::orchestrator::{Orchestrator, OrchestratorError, OrchestratorOptions, Phase, SessionEvent};
pub use crate::registry::SessionRegistry;
pub use crate::source::SourceFile;
pub use crate::state::SessionState;
