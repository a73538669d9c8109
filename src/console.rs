//! Line-oriented front end: prompt, read one command, print the resulting events.

use std::io::{self, BufRead, Write};

use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::render::render_event;

pub const PROMPT: &str = "duck> ";

/// Feeds `input` to the session until it ends.
///
/// Errors from ordinary commands are written to `errors` and the session keeps
/// going. End of input stops the session exactly once; if that final save fails
/// the error is returned because nothing further can retry it.
pub fn run<R, W, E>(
    orchestrator: &mut Orchestrator,
    input: R,
    output: &mut W,
    errors: &mut E,
) -> io::Result<()>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut lines = input.lines();
    while !orchestrator.is_ended() {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        let Some(line) = lines.next() else {
            writeln!(output)?;
            return dispatch(orchestrator, "stop", output)?.map_err(io::Error::other);
        };

        if let Err(error) = dispatch(orchestrator, &line?, output)? {
            writeln!(errors, "error: {error}")?;
        }
    }

    Ok(())
}

fn dispatch<W: Write>(
    orchestrator: &mut Orchestrator,
    input: &str,
    output: &mut W,
) -> io::Result<Result<(), OrchestratorError>> {
    let mut events = Vec::new();
    let result = orchestrator.handle_input(input, &mut |event| events.push(event));
    for event in &events {
        writeln!(output, "{}", render_event(event))?;
    }
    Ok(result)
}
