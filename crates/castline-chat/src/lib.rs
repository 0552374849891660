//! Live comment bridge for castline sessions.
//!
//! Owns the transport seams (push subscription and interval polling), the
//! watermark used to keep polled delivery duplicate free, and the
//! `ChatBridge` state machine that prefers push and falls back to polling.

pub mod chat_bridge;
pub mod chat_transport;
pub mod watermark;

pub use chat_bridge::{
    ChatBridge, ChatBridgeConfig, ChatBridgeError, ChatSourceState, DEFAULT_POLL_INTERVAL_MS,
};
pub use chat_transport::{
    ChatComment, ChatTransportError, CommentBatch, PollTransport, PushDeliveries, PushTopic,
    PushTransport,
};
pub use watermark::{admit_polled_batch, Watermark};
