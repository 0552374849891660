//! Declarative operator command pipeline for castline.
//!
//! Hosts the quoting-aware line tokenizer, the command registry built from
//! command sources, typed argument binding, and the serialized dispatcher
//! that reports every outcome through a reply callback.

pub mod command_args;
pub mod command_dispatcher;
pub mod command_registry;
pub mod command_tokenizer;

pub use command_args::{bind_arguments, ArgValue, MissingArgument, ParsedArgs};
pub use command_dispatcher::{
    CommandContext, CommandDispatcher, CommandReply, DispatchOutcome, COMMAND_FAILED_MESSAGE,
    COMMAND_NOT_FOUND_MESSAGE,
};
pub use command_registry::{
    CommandDescriptor, CommandRegistry, CommandRegistryBuilder, CommandRegistryError,
    CommandSource, EnabledPredicate, OptionKind, OptionSpec, HELP_COMMAND_NAME,
};
pub use command_tokenizer::tokenize;
