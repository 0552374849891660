//! Transport contracts consumed by the chat bridge.

use async_trait::async_trait;
use castline_core::ChatMessage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One comment as returned by a transport.
pub struct ChatComment {
    pub user: String,
    pub text: String,
    pub timestamp: u64,
}

impl ChatComment {
    pub fn new(user: impl Into<String>, text: impl Into<String>, timestamp: u64) -> Self {
        Self {
            user: user.into(),
            text: text.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Regular and system comments delivered together.
pub struct CommentBatch {
    #[serde(default)]
    pub comments: Vec<ChatComment>,
    #[serde(default)]
    pub system_comments: Vec<ChatComment>,
}

impl CommentBatch {
    pub fn is_empty(&self) -> bool {
        self.comments.is_empty() && self.system_comments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.comments.len() + self.system_comments.len()
    }

    /// Iterates regular comments first, then system comments, flagging the latter.
    pub fn iter_tagged(&self) -> impl Iterator<Item = (&ChatComment, bool)> {
        self.comments
            .iter()
            .map(|comment| (comment, false))
            .chain(self.system_comments.iter().map(|comment| (comment, true)))
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.iter_tagged()
            .map(|(comment, is_system)| comment_to_message(comment, is_system))
            .collect()
    }
}

pub(crate) fn comment_to_message(comment: &ChatComment, is_system: bool) -> ChatMessage {
    if is_system {
        ChatMessage::system(comment.text.clone())
    } else {
        ChatMessage::comment(comment.user.clone(), comment.text.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// Enumerates supported `PushTopic` values.
pub enum PushTopic {
    LiveComments { broadcast_id: String },
    TypingIndicator { broadcast_id: String },
}

impl PushTopic {
    /// Topics a bridge subscribes to for one broadcast.
    pub fn for_broadcast(broadcast_id: &str) -> Vec<Self> {
        vec![
            Self::LiveComments {
                broadcast_id: broadcast_id.to_string(),
            },
            Self::TypingIndicator {
                broadcast_id: broadcast_id.to_string(),
            },
        ]
    }

    pub fn topic_name(&self) -> String {
        match self {
            Self::LiveComments { broadcast_id } => format!("live_comments:{broadcast_id}"),
            Self::TypingIndicator { broadcast_id } => format!("live_typing_indicator:{broadcast_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates transport failures surfaced to the chat bridge.
pub enum ChatTransportError {
    #[error("push connect failed: {0}")]
    Connect(String),
    #[error("push disconnect failed: {0}")]
    Disconnect(String),
    #[error("comment fetch failed: {0}")]
    Fetch(String),
    #[error("transport payload could not be decoded: {0}")]
    Decode(String),
}

/// Receiver side of an established push subscription.
pub type PushDeliveries = mpsc::Receiver<CommentBatch>;

#[async_trait]
/// Trait contract for push-subscription transports.
pub trait PushTransport: Send + Sync {
    async fn connect(&self, topics: &[PushTopic]) -> Result<PushDeliveries, ChatTransportError>;

    async fn disconnect(&self) -> Result<(), ChatTransportError>;
}

#[async_trait]
/// Trait contract for timestamp-polled comment transports.
pub trait PollTransport: Send + Sync {
    async fn fetch_comments(
        &self,
        broadcast_id: &str,
        since_timestamp: u64,
    ) -> Result<CommentBatch, ChatTransportError>;
}
