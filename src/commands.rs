#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuckCommand {
    Next,
    Back,
    Deeper,
    Summary,
    Stop,
    Close,
    Help,
    Goto(usize),
    /// Free text answering the duck's question.
    Reply(String),
    Invalid { input: String, reason: String },
    Empty,
}

pub const COMMAND_HELP: &str = "Commands: next (→, forward), back (←, previous), deeper (dig), \
summary (tl;dr), goto <line> (jump), stop (quit, exit), close (done, archive), help (?). \
Anything else is recorded as your answer.";

pub fn parse_command(input: &str) -> DuckCommand {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return DuckCommand::Empty;
    }

    let lowered = trimmed.to_lowercase();
    let mut words = lowered.split_whitespace();
    let head = words.next().unwrap_or_default();
    let rest: Vec<&str> = words.collect();

    if matches!(head, "goto" | "jump") {
        return match rest.as_slice() {
            [line] => match line.parse::<usize>() {
                Ok(line_num) => DuckCommand::Goto(line_num),
                Err(_) => DuckCommand::Invalid {
                    input: trimmed.to_string(),
                    reason: format!("'{line}' is not a line number"),
                },
            },
            _ => DuckCommand::Invalid {
                input: trimmed.to_string(),
                reason: "usage: goto <line>".to_string(),
            },
        };
    }

    if !rest.is_empty() {
        return DuckCommand::Reply(trimmed.to_string());
    }

    match head {
        "next" | "→" | "forward" => DuckCommand::Next,
        "back" | "←" | "previous" => DuckCommand::Back,
        "deeper" | "dig" => DuckCommand::Deeper,
        "summary" | "tl;dr" => DuckCommand::Summary,
        "stop" | "quit" | "exit" => DuckCommand::Stop,
        "close" | "done" | "archive" => DuckCommand::Close,
        "help" | "?" | "commands" => DuckCommand::Help,
        _ => DuckCommand::Reply(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_are_case_insensitive() {
        for input in ["next", "NEXT", " →  ", "Forward"] {
            assert_eq!(parse_command(input), DuckCommand::Next, "{input}");
        }
        for input in ["back", "←", "Previous"] {
            assert_eq!(parse_command(input), DuckCommand::Back, "{input}");
        }
        assert_eq!(parse_command("DIG"), DuckCommand::Deeper);
        assert_eq!(parse_command("TL;DR"), DuckCommand::Summary);
        for input in ["stop", "Quit", "exit"] {
            assert_eq!(parse_command(input), DuckCommand::Stop, "{input}");
        }
        assert_eq!(parse_command("done"), DuckCommand::Close);
        assert_eq!(parse_command("?"), DuckCommand::Help);
    }

    #[test]
    fn goto_requires_a_line_number() {
        assert_eq!(parse_command("goto 12"), DuckCommand::Goto(12));
        assert_eq!(parse_command("Jump 3"), DuckCommand::Goto(3));
        assert!(matches!(
            parse_command("goto twelve"),
            DuckCommand::Invalid { .. }
        ));
        assert!(matches!(parse_command("goto"), DuckCommand::Invalid { .. }));
    }

    #[test]
    fn other_text_is_a_reply_and_blank_is_empty() {
        assert_eq!(
            parse_command("It initialises the cache"),
            DuckCommand::Reply("It initialises the cache".to_string())
        );
        assert_eq!(
            parse_command("next time I will"),
            DuckCommand::Reply("next time I will".to_string())
        );
        assert_eq!(parse_command("   "), DuckCommand::Empty);
    }
}
