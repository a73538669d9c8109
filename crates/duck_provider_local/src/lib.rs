//! Deterministic, heuristic-only duck used when no real duck answers.
//!
//! Nothing here looks beyond the single line it is given, so the same input
//! always yields the same reply. Every reply is marked as a local fallback.

use std::sync::atomic::Ordering;

use duck_provider::{CancelSignal, Depth, DuckError, DuckProfile, DuckProvider, DuckQuery, DuckReply};

/// Stable provider identifier used for explicit startup selection.
pub const LOCAL_PROVIDER_ID: &str = "local";

const LONG_LINE_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Comment,
    Import,
    Definition,
    Return,
    Branch,
    Loop,
    Failure,
    Todo,
    Assignment,
    Closing,
    Other,
}

fn classify(line_content: &str) -> LineKind {
    let trimmed = line_content.trim();
    let first_word = trimmed
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .next()
        .unwrap_or_default();

    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if trimmed.contains("TODO") || trimmed.contains("FIXME") {
        return LineKind::Todo;
    }
    if ["//", "#", "/*", "* ", "--", "\"\"\""]
        .iter()
        .any(|marker| trimmed.starts_with(marker))
    {
        return LineKind::Comment;
    }
    if matches!(first_word, "use" | "import" | "from" | "require" | "include") {
        return LineKind::Import;
    }
    if matches!(
        first_word,
        "fn" | "def" | "function" | "class" | "struct" | "enum" | "impl" | "trait" | "pub" | "async" | "interface" | "type"
    ) {
        return LineKind::Definition;
    }
    if first_word == "return" {
        return LineKind::Return;
    }
    if matches!(first_word, "if" | "else" | "elif" | "match" | "switch" | "case") {
        return LineKind::Branch;
    }
    if matches!(first_word, "for" | "while" | "loop") {
        return LineKind::Loop;
    }
    if ["raise", "throw", "panic!", "unwrap()", "expect(", "NotImplementedError"]
        .iter()
        .any(|marker| trimmed.contains(marker))
    {
        return LineKind::Failure;
    }
    if trimmed.chars().all(|c| matches!(c, '}' | ')' | ']' | ';' | ',')) {
        return LineKind::Closing;
    }
    if trimmed.contains(" = ") || trimmed.starts_with("let ") || trimmed.starts_with("const ") {
        return LineKind::Assignment;
    }

    LineKind::Other
}

/// Local observation for a line, used when the duck is unavailable.
#[must_use]
pub fn generate_fallback_observation(line_num: usize, line_content: &str) -> DuckReply {
    let (observation, question) = match classify(line_content) {
        LineKind::Blank => ("a blank line", "Does this gap separate two ideas?"),
        LineKind::Comment => (
            "a comment",
            "Does the code below still do what this comment claims?",
        ),
        LineKind::Import => (
            "an import",
            "Which part of this file actually needs it?",
        ),
        LineKind::Definition => (
            "a definition",
            "Can you say in one sentence what this is responsible for?",
        ),
        LineKind::Return => (
            "a return",
            "What value leaves here, and is it the one the caller expects?",
        ),
        LineKind::Branch => (
            "a branch",
            "What happens on the path this condition does not take?",
        ),
        LineKind::Loop => (
            "a loop",
            "What guarantees this loop ends, and what if it runs zero times?",
        ),
        LineKind::Failure => (
            "a failure path",
            "Who handles this failure, and what state is left behind?",
        ),
        LineKind::Todo => (
            "an unfinished note",
            "What would it take to finish this now?",
        ),
        LineKind::Assignment => (
            "an assignment",
            "Where is this value used next, and could it be wrong by then?",
        ),
        LineKind::Closing => (
            "the end of a block",
            "Looking back at the block, did it do everything it promised?",
        ),
        LineKind::Other => ("a statement", "What would break if this line were removed?"),
    };

    let mut observation = format!("Line {line_num} is {observation}.");
    if line_content.chars().count() > LONG_LINE_CHARS {
        observation.push_str(" It is long enough to hide more than one idea.");
    }

    DuckReply::local(observation, question)
}

/// Follow-up for `deeper` when the duck is unavailable.
#[must_use]
pub fn generate_fallback_deeper(line_num: usize, line_content: &str) -> DuckReply {
    let question = match classify(line_content) {
        LineKind::Branch | LineKind::Loop => {
            "Walk through it with the smallest and the largest input you can think of. What changes?"
        }
        LineKind::Failure => "Which caller sees this first, and can it recover?",
        LineKind::Definition => "What would a test for this look like, and what would it assert?",
        _ => "Explain this line out loud as if to someone new to the codebase. Where do you hesitate?",
    };

    DuckReply::local(
        format!("Looking closer at line {line_num} without a duck."),
        question,
    )
}

/// Always-available provider backed by the local heuristics.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDuck;

impl DuckProvider for LocalDuck {
    fn profile(&self) -> DuckProfile {
        DuckProfile {
            provider_id: LOCAL_PROVIDER_ID.to_string(),
            description: "local heuristics (no duck service)".to_string(),
        }
    }

    fn query(&self, query: &DuckQuery, cancel: CancelSignal) -> Result<DuckReply, DuckError> {
        if cancel.load(Ordering::SeqCst) {
            return Err(DuckError::Cancelled);
        }

        Ok(match query.depth {
            Depth::Observe => generate_fallback_observation(query.line_num, &query.line_content),
            Depth::Deeper => generate_fallback_deeper(query.line_num, &query.line_content),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn fallback_is_deterministic_and_marked_local() {
        let first = generate_fallback_observation(4, "if x > 0 {");
        let second = generate_fallback_observation(4, "if x > 0 {");
        assert_eq!(first, second);
        assert!(first.is_degraded());
        assert!(first.observation.starts_with("Line 4 is a branch"));
    }

    #[test]
    fn classification_covers_common_shapes() {
        assert_eq!(classify(""), LineKind::Blank);
        assert_eq!(classify("    // explain"), LineKind::Comment);
        assert_eq!(classify("# python comment"), LineKind::Comment);
        assert_eq!(classify("use std::fs;"), LineKind::Import);
        assert_eq!(classify("def greet(name: str) -> str:"), LineKind::Definition);
        assert_eq!(classify("    return total"), LineKind::Return);
        assert_eq!(classify("for item in items:"), LineKind::Loop);
        assert_eq!(classify("    raise NotImplementedError(\"greet\")"), LineKind::Failure);
        assert_eq!(classify("// TODO: cache this"), LineKind::Todo);
        assert_eq!(classify("let total = 0;"), LineKind::Assignment);
        assert_eq!(classify("});"), LineKind::Closing);
        assert_eq!(classify("println!(\"hi\");"), LineKind::Other);
    }

    #[test]
    fn long_lines_get_an_extra_note() {
        let long_line = format!("x = {}", "1 + ".repeat(40));
        let reply = generate_fallback_observation(1, &long_line);
        assert!(reply.observation.contains("more than one idea"));
    }

    #[test]
    fn provider_answers_by_depth() {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut query = DuckQuery {
            line_num: 2,
            line_content: "while running:".to_string(),
            language: "python".to_string(),
            preceding_context: Vec::new(),
            depth: Depth::Observe,
        };

        let observe = LocalDuck
            .query(&query, Arc::clone(&cancel))
            .expect("local duck always answers");
        assert_eq!(observe, generate_fallback_observation(2, "while running:"));

        query.depth = Depth::Deeper;
        let deeper = LocalDuck.query(&query, cancel).expect("local duck always answers");
        assert_eq!(deeper, generate_fallback_deeper(2, "while running:"));
    }

    #[test]
    fn provider_reports_cancellation() {
        let query = DuckQuery {
            line_num: 1,
            line_content: "x".to_string(),
            language: "plaintext".to_string(),
            preceding_context: Vec::new(),
            depth: Depth::Observe,
        };
        let result = LocalDuck.query(&query, Arc::new(AtomicBool::new(true)));
        assert_eq!(result, Err(DuckError::Cancelled));
    }

    #[test]
    fn profile_exposes_local_identity() {
        assert_eq!(LocalDuck.profile().provider_id, LOCAL_PROVIDER_ID);
    }
}
