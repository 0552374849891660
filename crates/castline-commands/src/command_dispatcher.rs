//! Serialized command dispatch with reply-callback reporting.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Mutex;

use crate::command_args::bind_arguments;
use crate::command_registry::CommandRegistry;
use crate::command_tokenizer::tokenize;

pub const COMMAND_NOT_FOUND_MESSAGE: &str = "Command not found.";
pub const COMMAND_FAILED_MESSAGE: &str = "Failed to execute command.";

#[derive(Clone)]
/// Callback that delivers command output to whoever issued the line.
pub struct CommandReply {
    sink: Arc<dyn Fn(String) + Send + Sync>,
}

impl std::fmt::Debug for CommandReply {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("CommandReply")
    }
}

impl CommandReply {
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        Self {
            sink: Arc::new(sink),
        }
    }

    pub fn send(&self, message: impl Into<String>) {
        (self.sink)(message.into());
    }
}

#[derive(Debug, Clone)]
/// Per-invocation context handed to command handlers.
pub struct CommandContext {
    command: String,
    reply: CommandReply,
}

impl CommandContext {
    pub fn new(command: impl Into<String>, reply: CommandReply) -> Self {
        Self {
            command: command.into(),
            reply,
        }
    }

    pub fn command_name(&self) -> &str {
        &self.command
    }

    pub fn reply(&self, message: impl Into<String>) {
        self.reply.send(message);
    }

    pub fn replier(&self) -> CommandReply {
        self.reply.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `DispatchOutcome` values.
pub enum DispatchOutcome {
    Executed { command: String },
    NotFound { name: String },
    HandlerFailed { command: String },
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executed { .. } => "executed",
            Self::NotFound { .. } => "not_found",
            Self::HandlerFailed { .. } => "handler_failed",
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed { .. })
    }
}

/// Resolves, gates, binds, and runs commands one at a time.
pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
    execution_gate: Mutex<()>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self {
            registry,
            execution_gate: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Runs one operator line. Never fails; every outcome is reported via `reply`.
    ///
    /// Concurrent calls queue on a fair lock, so handlers never interleave.
    pub async fn dispatch(&self, line: &str, reply: CommandReply) -> DispatchOutcome {
        let _execution = self.execution_gate.lock().await;

        let mut tokens = tokenize(line);
        let name = if tokens.is_empty() {
            String::new()
        } else {
            tokens.remove(0)
        };

        let Some(descriptor) = self
            .registry
            .find(&name)
            .filter(|descriptor| descriptor.is_enabled())
        else {
            tracing::debug!(command = name.as_str(), input = line, "command not found or disabled");
            reply.send(COMMAND_NOT_FOUND_MESSAGE);
            return DispatchOutcome::NotFound { name };
        };

        let args = bind_arguments(descriptor.options(), &tokens);

        let context = CommandContext::new(name.clone(), reply.clone());
        let execution = (descriptor.handler())(args, context);
        match AssertUnwindSafe(execution).catch_unwind().await {
            Ok(Ok(())) => {
                tracing::debug!(command = name.as_str(), "command executed");
                DispatchOutcome::Executed { command: name }
            }
            Ok(Err(error)) => {
                tracing::warn!(
                    command = name.as_str(),
                    input = line,
                    error = ?error,
                    "command execution failed"
                );
                reply.send(COMMAND_FAILED_MESSAGE);
                DispatchOutcome::HandlerFailed { command: name }
            }
            Err(panic) => {
                tracing::warn!(
                    command = name.as_str(),
                    input = line,
                    panic = panic_message(panic.as_ref()),
                    "command handler panicked"
                );
                reply.send(COMMAND_FAILED_MESSAGE);
                DispatchOutcome::HandlerFailed { command: name }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
