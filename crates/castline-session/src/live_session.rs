//! One broadcast, owned or viewed, and its chat bridge.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use castline_chat::{
    ChatBridge, ChatBridgeConfig, ChatBridgeError, PollTransport, PushTransport,
    DEFAULT_POLL_INTERVAL_MS,
};
use castline_core::{ChatMessage, EventFanout};
use thiserror::Error;

use crate::platform_client::{CreateBroadcastRequest, PlatformClient, PlatformError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `SessionStatus` values.
pub enum SessionStatus {
    Created,
    Ongoing,
    Stopped,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Ongoing => "ongoing",
            Self::Stopped => "stopped",
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Created | Self::Ongoing)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Ingest endpoint for broadcasting software.
pub struct RtmpInfo {
    pub url: String,
    pub key: String,
}

impl RtmpInfo {
    /// Splits an upload URL at the broadcast id: the prefix is the server
    /// URL and the id plus the remainder is the stream key.
    pub fn from_upload_url(upload_url: &str, broadcast_id: &str) -> Self {
        if broadcast_id.is_empty() {
            return Self {
                url: upload_url.to_string(),
                key: String::new(),
            };
        }
        match upload_url.split_once(broadcast_id) {
            Some((prefix, rest)) => {
                let suffix = rest.split(broadcast_id).next().unwrap_or_default();
                Self {
                    url: prefix.to_string(),
                    key: format!("{broadcast_id}{suffix}"),
                }
            }
            None => Self {
                url: upload_url.to_string(),
                key: broadcast_id.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Operation attempted in the wrong session state.
pub enum SessionStateError {
    #[error("a session is still active ({status})")]
    AlreadyActive { status: SessionStatus },
    #[error("no session is open")]
    NoSession,
    #[error("cannot {operation} a broadcast this account does not own")]
    NotOwner { operation: &'static str },
    #[error("cannot {operation} while the session is {status}")]
    InvalidStatus {
        operation: &'static str,
        status: SessionStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates supported `SessionError` values.
pub enum SessionError {
    #[error(transparent)]
    State(#[from] SessionStateError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Chat(#[from] ChatBridgeError),
}

#[derive(Clone)]
/// Transports and cadence used to build each session's chat bridge.
pub struct ChatTransports {
    pub push: Arc<dyn PushTransport>,
    pub poll: Arc<dyn PollTransport>,
    pub poll_interval: Duration,
}

impl ChatTransports {
    pub fn new(push: Arc<dyn PushTransport>, poll: Arc<dyn PollTransport>) -> Self {
        Self {
            push,
            poll,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn bridge_for(
        &self,
        broadcast_id: &str,
        chat_feed: &Arc<EventFanout<ChatMessage>>,
    ) -> Result<ChatBridge, ChatBridgeError> {
        let bridge = ChatBridge::new(
            ChatBridgeConfig::new(broadcast_id).with_poll_interval(self.poll_interval),
            Arc::clone(&self.push),
            Arc::clone(&self.poll),
        )?;
        let feed = Arc::clone(chat_feed);
        bridge.messages().add_listener(move |message| feed.emit(message));
        Ok(bridge)
    }
}

#[derive(Debug)]
struct SessionProgress {
    status: SessionStatus,
    media_id: Option<String>,
}

/// A broadcast this process created or joined as a viewer.
pub struct LiveSession {
    platform: Arc<dyn PlatformClient>,
    broadcast_id: String,
    owned: bool,
    rtmp: RtmpInfo,
    dash_playback_url: String,
    progress: Mutex<SessionProgress>,
    chat: ChatBridge,
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LiveSession")
            .field("broadcast_id", &self.broadcast_id)
            .field("owned", &self.owned)
            .field("status", &self.status())
            .field("chat", &self.chat.state())
            .finish()
    }
}

impl LiveSession {
    /// Creates an owned broadcast in `Created`; chat starts with `start`.
    pub async fn create(
        platform: Arc<dyn PlatformClient>,
        transports: &ChatTransports,
        chat_feed: &Arc<EventFanout<ChatMessage>>,
        request: &CreateBroadcastRequest,
    ) -> Result<Self, SessionError> {
        tracing::debug!("creating broadcast");
        let created = platform.create_broadcast(request).await?;
        let info = platform.broadcast_info(&created.broadcast_id).await?;
        let rtmp = RtmpInfo::from_upload_url(&created.upload_url, &created.broadcast_id);
        let chat = transports.bridge_for(&created.broadcast_id, chat_feed)?;
        tracing::info!(
            broadcast_id = %created.broadcast_id,
            rtmp_url = %rtmp.url,
            "broadcast created"
        );
        Ok(Self {
            platform,
            broadcast_id: created.broadcast_id,
            owned: true,
            rtmp,
            dash_playback_url: info.dash_playback_url,
            progress: Mutex::new(SessionProgress {
                status: SessionStatus::Created,
                media_id: None,
            }),
            chat,
        })
    }

    /// Joins someone else's broadcast in `Ongoing` and starts its chat.
    pub async fn view(
        platform: Arc<dyn PlatformClient>,
        transports: &ChatTransports,
        chat_feed: &Arc<EventFanout<ChatMessage>>,
        broadcast_id: &str,
    ) -> Result<Self, SessionError> {
        let info = platform.broadcast_info(broadcast_id).await?;
        let chat = transports.bridge_for(broadcast_id, chat_feed)?;
        let session = Self {
            platform,
            broadcast_id: broadcast_id.to_string(),
            owned: false,
            rtmp: RtmpInfo {
                url: info.rtmp_playback_url,
                key: String::new(),
            },
            dash_playback_url: info.dash_playback_url,
            progress: Mutex::new(SessionProgress {
                status: SessionStatus::Ongoing,
                media_id: None,
            }),
            chat,
        };
        let source = session.chat.start().await?;
        tracing::info!(
            broadcast_id = %session.broadcast_id,
            chat_source = source.as_str(),
            "viewing broadcast"
        );
        Ok(session)
    }

    fn lock_progress(&self) -> MutexGuard<'_, SessionProgress> {
        self.progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn broadcast_id(&self) -> &str {
        &self.broadcast_id
    }

    pub fn status(&self) -> SessionStatus {
        self.lock_progress().status
    }

    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn rtmp_info(&self) -> &RtmpInfo {
        &self.rtmp
    }

    pub fn dash_playback_url(&self) -> &str {
        &self.dash_playback_url
    }

    pub fn media_id(&self) -> Option<String> {
        self.lock_progress().media_id.clone()
    }

    pub fn chat(&self) -> &ChatBridge {
        &self.chat
    }

    fn require_owned(&self, operation: &'static str) -> Result<(), SessionStateError> {
        if self.owned {
            Ok(())
        } else {
            Err(SessionStateError::NotOwner { operation })
        }
    }

    pub async fn start(&self) -> Result<(), SessionError> {
        self.require_owned("start")?;
        let status = self.status();
        if status != SessionStatus::Created {
            return Err(SessionStateError::InvalidStatus {
                operation: "start",
                status,
            }
            .into());
        }
        tracing::debug!(broadcast_id = %self.broadcast_id, "starting broadcast");
        let started = self.platform.start_broadcast(&self.broadcast_id).await?;
        let source = self.chat.start().await?;
        {
            let mut progress = self.lock_progress();
            progress.media_id = Some(started.media_id);
            progress.status = SessionStatus::Ongoing;
        }
        tracing::info!(
            broadcast_id = %self.broadcast_id,
            chat_source = source.as_str(),
            "broadcast started"
        );
        Ok(())
    }

    /// Ends the broadcast, stops chat, and optionally keeps it as a highlight.
    pub async fn stop(&self, as_highlight: bool) -> Result<(), SessionError> {
        self.require_owned("stop")?;
        let status = self.status();
        if !status.is_active() {
            return Err(SessionStateError::InvalidStatus {
                operation: "stop",
                status,
            }
            .into());
        }
        tracing::debug!(broadcast_id = %self.broadcast_id, "ending broadcast");
        self.platform.end_broadcast(&self.broadcast_id).await?;
        self.lock_progress().status = SessionStatus::Stopped;
        self.chat.stop().await;
        if as_highlight {
            tracing::debug!(broadcast_id = %self.broadcast_id, "adding broadcast to post-live");
            self.platform.add_to_post_live(&self.broadcast_id).await?;
        }
        tracing::info!(
            broadcast_id = %self.broadcast_id,
            highlight = as_highlight,
            "broadcast stopped"
        );
        Ok(())
    }

    /// Stops watching a viewed broadcast.
    pub async fn leave(&self) -> Result<(), SessionError> {
        if self.owned {
            return Err(SessionStateError::InvalidStatus {
                operation: "leave",
                status: self.status(),
            }
            .into());
        }
        self.lock_progress().status = SessionStatus::Stopped;
        self.chat.stop().await;
        tracing::info!(broadcast_id = %self.broadcast_id, "left broadcast");
        Ok(())
    }

    pub async fn post_comment(&self, text: &str) -> Result<(), SessionError> {
        self.platform
            .post_comment(&self.broadcast_id, text)
            .await
            .map_err(SessionError::from)
    }
}
