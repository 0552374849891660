//! Operator console: one command line per stdin line.

use anyhow::{Context, Result};
use castline_commands::{CommandDispatcher, CommandReply};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub(crate) const EXIT_COMMAND: &str = "!exit";
pub(crate) const EXIT_MESSAGE: &str = "Bye!";

/// Dispatches every non-empty line until `!exit` or end of input.
pub(crate) async fn run_console<R>(
    input: R,
    dispatcher: &CommandDispatcher,
    reply: CommandReply,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read console input")?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == EXIT_COMMAND {
            reply.send(EXIT_MESSAGE);
            return Ok(());
        }
        let outcome = dispatcher.dispatch(line, reply.clone()).await;
        tracing::debug!(input = %line, outcome = outcome.as_str(), "console command handled");
    }
    Ok(())
}
