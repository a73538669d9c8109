//! Plain-text rendering of session events for the terminal front end.

use std::fmt::Write as _;

use duck_provider::{Depth, LOCAL_FALLBACK_LABEL};

use crate::commands::COMMAND_HELP;
use crate::orchestrator::SessionEvent;
use crate::state::SessionSummary;

#[must_use]
pub fn render_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Started {
            file,
            total_lines,
            language,
            provider,
        } => format!(
            "Reviewing {} ({total_lines} lines, {language}) with the {provider} duck.",
            file.display()
        ),
        SessionEvent::Resumed { entries, line_num } => format!(
            "Resuming: {entries} earlier {} on file, continuing at line {line_num}.",
            plural(*entries, "entry", "entries")
        ),
        SessionEvent::Drift {
            changed_lines,
            missing_lines,
        } => {
            let mut out = String::from("The file changed since the last session:");
            if !changed_lines.is_empty() {
                let _ = write!(out, " lines {} were edited", join_numbers(changed_lines));
            }
            if !missing_lines.is_empty() {
                if !changed_lines.is_empty() {
                    out.push(';');
                }
                let _ = write!(
                    out,
                    " lines {} no longer exist",
                    join_numbers(missing_lines)
                );
            }
            out.push('.');
            out
        }
        SessionEvent::EmptyFile => "The file is empty; there is nothing to review.".to_string(),
        SessionEvent::Observation {
            line_num,
            line_content,
            reply,
            depth,
        } => {
            let mut out = match depth {
                Depth::Observe => format!("{line_num:>5} | {line_content}\n"),
                Depth::Deeper => String::new(),
            };
            let label = if reply.is_degraded() {
                format!("{LOCAL_FALLBACK_LABEL} ")
            } else {
                String::new()
            };
            let _ = write!(out, "duck: {label}{}", reply.observation);
            if !reply.question.trim().is_empty() {
                let _ = write!(out, "\nduck: {}", reply.question);
            }
            out
        }
        SessionEvent::Replay {
            line_num,
            line_content,
            entry,
            drifted,
        } => {
            let mut out = format!("{line_num:>5} | {line_content}\n(already discussed");
            if *drifted {
                out.push_str("; the line has changed since");
            }
            let _ = write!(out, ")\nduck: {}\nyou: {}", entry.duck, entry.user_response);
            out
        }
        SessionEvent::Degraded { line_num, reason } => {
            format!("The duck could not answer for line {line_num} ({reason}); using a local observation.")
        }
        SessionEvent::BlankLine { line_num } => format!("{line_num:>5} |\n(blank line)"),
        SessionEvent::Persisted { line_num } => format!("Saved line {line_num}."),
        SessionEvent::Noted {
            line_num,
            persisted: true,
        } => format!("Noted your answer for line {line_num}."),
        SessionEvent::Noted {
            line_num,
            persisted: false,
        } => format!(
            "Noted, but line {line_num} was already discussed; use deeper to reopen it before your answer is saved."
        ),
        SessionEvent::Discarded { line_num } => {
            format!("Left line {line_num} without saving it.")
        }
        SessionEvent::Refused { reason } => format!("Can't do that: {reason}."),
        SessionEvent::EndOfFile { total_lines } => {
            format!("End of file ({total_lines} lines). Type close to archive, stop to pause, or back to revisit.")
        }
        SessionEvent::Summary(summary) => render_summary(summary),
        SessionEvent::Help => COMMAND_HELP.to_string(),
        SessionEvent::Archived { path } => format!("Archived to {}.", path.display()),
        SessionEvent::Ended { entries, archived } => {
            let mut out = format!(
                "Session ended with {entries} {}",
                plural(*entries, "entry", "entries")
            );
            if archived.is_some() {
                out.push_str(" (archived)");
            }
            out.push('.');
            out
        }
    }
}

#[must_use]
pub fn render_summary(summary: &SessionSummary) -> String {
    let mut out = format!(
        "Covered {} of {} lines ({:.0}%).",
        summary.lines_visited, summary.total_lines, summary.coverage_percent
    );
    for (line_num, duck) in &summary.observations {
        let first = duck.lines().next().unwrap_or_default();
        let _ = write!(out, "\n{line_num:>5}: {first}");
    }
    out
}

fn join_numbers(numbers: &[usize]) -> String {
    numbers
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn plural(count: usize, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 {
        one
    } else {
        many
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use duck_provider::DuckReply;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn degraded_observation_is_labelled() {
        let text = render_event(&SessionEvent::Observation {
            line_num: 3,
            line_content: "return x".to_string(),
            reply: DuckReply::local("Line 3 is a return.", "What leaves here?"),
            depth: Depth::Observe,
        });
        assert_eq!(
            text,
            "    3 | return x\nduck: [local fallback] Line 3 is a return.\nduck: What leaves here?"
        );
    }

    #[test]
    fn summary_lists_first_line_of_each_observation() {
        let text = render_summary(&SessionSummary {
            lines_visited: 1,
            total_lines: 4,
            coverage_percent: 25.0,
            observations: vec![(2, "Assigns x.\nWhy 1?".to_string())],
        });
        assert_eq!(text, "Covered 1 of 4 lines (25%).\n    2: Assigns x.");
    }

    #[test]
    fn drift_mentions_both_kinds() {
        let text = render_event(&SessionEvent::Drift {
            changed_lines: vec![2, 4],
            missing_lines: vec![9],
        });
        assert_eq!(
            text,
            "The file changed since the last session: lines 2, 4 were edited; lines 9 no longer exist."
        );
    }

    #[test]
    fn ended_mentions_archive() {
        let text = render_event(&SessionEvent::Ended {
            entries: 1,
            archived: Some(PathBuf::from("a-123456.rubber.archived.jsonl")),
        });
        assert_eq!(text, "Session ended with 1 entry (archived).");
    }
}
