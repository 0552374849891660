//! Command descriptors, command sources, and the ordered registry.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::command_args::ParsedArgs;
use crate::command_dispatcher::CommandContext;

pub const HELP_COMMAND_NAME: &str = "help";
const HELP_HEADER: &str = "Available commands:";

pub type EnabledPredicate = Arc<dyn Fn() -> bool + Send + Sync>;
pub(crate) type CommandHandler =
    Arc<dyn Fn(ParsedArgs, CommandContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `OptionKind` values.
pub enum OptionKind {
    String,
    Number,
    Flag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One entry of a command's ordered option schema.
pub struct OptionSpec {
    pub name: String,
    pub kind: OptionKind,
}

impl OptionSpec {
    pub fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Number)
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Flag)
    }

    pub fn render_usage(&self) -> String {
        match self.kind {
            OptionKind::String | OptionKind::Number => format!("<{}>", self.name),
            OptionKind::Flag => format!("[-{}]", self.name),
        }
    }
}

#[derive(Clone)]
/// An immutable command entry: name, option schema, gate, and handler.
pub struct CommandDescriptor {
    name: String,
    options: Vec<OptionSpec>,
    enabled: EnabledPredicate,
    handler: CommandHandler,
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CommandDescriptor {
    pub fn new<F, Fut>(name: impl Into<String>, options: Vec<OptionSpec>, handler: F) -> Self
    where
        F: Fn(ParsedArgs, CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: CommandHandler = Arc::new(move |args: ParsedArgs, context: CommandContext| {
            let future: BoxFuture<'static, anyhow::Result<()>> = Box::pin(handler(args, context));
            future
        });
        Self {
            name: name.into(),
            options,
            enabled: Arc::new(|| true),
            handler,
        }
    }

    /// Adds a gate; the descriptor is enabled only while every gate passes.
    pub fn gated(mut self, predicate: EnabledPredicate) -> Self {
        let existing = Arc::clone(&self.enabled);
        self.enabled = Arc::new(move || existing() && predicate());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    pub fn is_enabled(&self) -> bool {
        (self.enabled)()
    }

    pub(crate) fn handler(&self) -> &CommandHandler {
        &self.handler
    }

    /// Renders `name <positional> [-flag]`.
    pub fn usage(&self) -> String {
        std::iter::once(self.name.clone())
            .chain(self.options.iter().map(OptionSpec::render_usage))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A declarative group of commands sharing an optional enablement predicate.
pub struct CommandSource {
    name: String,
    enabled: Option<EnabledPredicate>,
    commands: Vec<CommandDescriptor>,
}

impl CommandSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: None,
            commands: Vec::new(),
        }
    }

    /// Gates every command of this source; evaluated on each dispatch.
    pub fn restricted<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.enabled = Some(Arc::new(predicate));
        self
    }

    pub fn command(mut self, descriptor: CommandDescriptor) -> Self {
        self.commands.push(descriptor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates registry construction failures.
pub enum CommandRegistryError {
    #[error("command name must not be empty")]
    EmptyName,
    #[error("command name '{name}' must not contain whitespace")]
    InvalidName { name: String },
    #[error("command '{name}' is already registered")]
    DuplicateName { name: String },
    #[error("command '{command}' declares option '{option}' more than once")]
    DuplicateOption { command: String, option: String },
}

#[derive(Debug, Default)]
/// Collects descriptors before the `help` entry is synthesized.
pub struct CommandRegistryBuilder {
    commands: Vec<CommandDescriptor>,
}

impl CommandRegistryBuilder {
    pub fn register(&mut self, descriptor: CommandDescriptor) -> Result<&mut Self, CommandRegistryError> {
        validate_descriptor(&descriptor)?;
        if self
            .commands
            .iter()
            .any(|existing| existing.name == descriptor.name)
        {
            return Err(CommandRegistryError::DuplicateName {
                name: descriptor.name,
            });
        }
        self.commands.push(descriptor);
        Ok(self)
    }

    /// Registers every command of `source`, applying its shared predicate.
    pub fn source(mut self, source: CommandSource) -> Result<Self, CommandRegistryError> {
        let CommandSource {
            name: source_name,
            enabled,
            commands,
        } = source;
        tracing::debug!(
            source = source_name.as_str(),
            commands = commands.len(),
            restricted = enabled.is_some(),
            "registering command source"
        );
        for descriptor in commands {
            let descriptor = match &enabled {
                Some(predicate) => descriptor.gated(Arc::clone(predicate)),
                None => descriptor,
            };
            self.register(descriptor)?;
        }
        Ok(self)
    }

    /// Appends the synthesized `help` command and freezes the registry.
    pub fn build(mut self) -> Result<CommandRegistry, CommandRegistryError> {
        let mut lines = self
            .commands
            .iter()
            .map(CommandDescriptor::usage)
            .collect::<Vec<_>>();
        lines.push(HELP_COMMAND_NAME.to_string());
        let help_text: Arc<str> = Arc::from(render_help_text(&lines));
        let help = CommandDescriptor::new(HELP_COMMAND_NAME, Vec::new(), move |_args, context| {
            let help_text = Arc::clone(&help_text);
            async move {
                context.reply(help_text.as_ref());
                Ok(())
            }
        });
        self.register(help)?;
        Ok(CommandRegistry {
            commands: self.commands,
        })
    }
}

fn validate_descriptor(descriptor: &CommandDescriptor) -> Result<(), CommandRegistryError> {
    if descriptor.name.is_empty() {
        return Err(CommandRegistryError::EmptyName);
    }
    if descriptor.name.chars().any(char::is_whitespace) {
        return Err(CommandRegistryError::InvalidName {
            name: descriptor.name.clone(),
        });
    }
    let mut seen = HashSet::new();
    for option in &descriptor.options {
        if !seen.insert(option.name.as_str()) {
            return Err(CommandRegistryError::DuplicateOption {
                command: descriptor.name.clone(),
                option: option.name.clone(),
            });
        }
    }
    Ok(())
}

fn render_help_text(lines: &[String]) -> String {
    let mut rendered = String::from(HELP_HEADER);
    for line in lines {
        rendered.push('\n');
        rendered.push_str(line);
    }
    rendered
}

#[derive(Debug)]
/// Ordered, immutable set of commands with unique names.
pub struct CommandRegistry {
    commands: Vec<CommandDescriptor>,
}

impl CommandRegistry {
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder::default()
    }

    pub fn all(&self) -> &[CommandDescriptor] {
        &self.commands
    }

    pub fn find(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.iter().find(|descriptor| descriptor.name == name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
