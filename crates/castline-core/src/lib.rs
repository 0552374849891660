//! Foundational types shared across castline crates.
//!
//! Provides the unified chat message model and the typed listener fan-out
//! used for every event stream in the relay.

pub mod chat_message;
pub mod event_fanout;

pub use chat_message::{ChatMessage, SYSTEM_AUTHOR};
pub use event_fanout::EventFanout;
