use serde::{Deserialize, Serialize};

/// Author name used for platform system comments and relay replies.
pub const SYSTEM_AUTHOR: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A single chat line emitted by the chat bridge.
pub struct ChatMessage {
    pub is_system: bool,
    pub user: String,
    pub text: String,
}

impl ChatMessage {
    pub fn comment(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            is_system: false,
            user: user.into(),
            text: text.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            is_system: true,
            user: SYSTEM_AUTHOR.to_string(),
            text: text.into(),
        }
    }

    /// Author shown on the channel: `system` for system comments, otherwise the commenter.
    pub fn channel_author(&self) -> &str {
        if self.is_system {
            SYSTEM_AUTHOR
        } else {
            self.user.as_str()
        }
    }
}
