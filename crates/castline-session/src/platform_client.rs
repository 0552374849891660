//! Live-video platform operations consumed by sessions and commands.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PREVIEW_WIDTH: u32 = 720;
pub const DEFAULT_PREVIEW_HEIGHT: u32 = 1280;
pub const DEFAULT_CREATE_MESSAGE: &str = "New stream, come and join!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `CreateBroadcastRequest` used across Castline components.
pub struct CreateBroadcastRequest {
    pub preview_width: u32,
    pub preview_height: u32,
    pub message: String,
}

impl Default for CreateBroadcastRequest {
    fn default() -> Self {
        Self {
            preview_width: DEFAULT_PREVIEW_WIDTH,
            preview_height: DEFAULT_PREVIEW_HEIGHT,
            message: DEFAULT_CREATE_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `CreatedBroadcast` used across Castline components.
pub struct CreatedBroadcast {
    pub broadcast_id: String,
    pub upload_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `BroadcastInfo` used across Castline components.
pub struct BroadcastInfo {
    pub broadcast_id: String,
    pub dash_playback_url: String,
    #[serde(default)]
    pub rtmp_playback_url: String,
    #[serde(default)]
    pub viewer_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `StartedBroadcast` used across Castline components.
pub struct StartedBroadcast {
    pub media_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One broadcast currently live on the platform.
pub struct LiveBroadcastSummary {
    pub broadcast_id: String,
    pub owner_username: String,
    #[serde(default)]
    pub viewer_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates supported `PlatformError` values.
pub enum PlatformError {
    #[error("platform request '{operation}' failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },
    #[error("platform request '{operation}' returned status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("platform response for '{operation}' could not be decoded: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl PlatformError {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Request { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. } => operation,
        }
    }
}

#[async_trait]
/// Trait contract for the live-video platform client.
pub trait PlatformClient: Send + Sync {
    async fn create_broadcast(
        &self,
        request: &CreateBroadcastRequest,
    ) -> Result<CreatedBroadcast, PlatformError>;

    async fn broadcast_info(&self, broadcast_id: &str) -> Result<BroadcastInfo, PlatformError>;

    async fn start_broadcast(&self, broadcast_id: &str) -> Result<StartedBroadcast, PlatformError>;

    async fn end_broadcast(&self, broadcast_id: &str) -> Result<(), PlatformError>;

    async fn add_to_post_live(&self, broadcast_id: &str) -> Result<(), PlatformError>;

    async fn post_comment(&self, broadcast_id: &str, text: &str) -> Result<(), PlatformError>;

    async fn list_live_broadcasts(&self) -> Result<Vec<LiveBroadcastSummary>, PlatformError>;

    /// Returns the user's live broadcast, or `None` when they are not live.
    async fn find_user_broadcast(
        &self,
        username: &str,
    ) -> Result<Option<LiveBroadcastSummary>, PlatformError>;
}
