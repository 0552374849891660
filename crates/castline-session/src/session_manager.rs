//! Holds the single current session and the session-agnostic chat feed.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use castline_channel::CommentPoster;
use castline_core::{ChatMessage, EventFanout};
use tokio::sync::Mutex;

use crate::live_session::{
    ChatTransports, LiveSession, SessionError, SessionStateError, SessionStatus,
};
use crate::platform_client::{CreateBroadcastRequest, PlatformClient};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `SessionManagerConfig` used across Castline components.
pub struct SessionManagerConfig {
    pub operator: String,
    pub create_request: CreateBroadcastRequest,
}

#[derive(Clone, Default)]
/// Shared pointer to the current session; updates are visible immediately.
pub struct SessionHandle {
    current: Arc<ArcSwapOption<LiveSession>>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SessionHandle")
            .field("current", &self.current())
            .finish()
    }
}

impl SessionHandle {
    pub fn current(&self) -> Option<Arc<LiveSession>> {
        self.current.load_full()
    }

    pub fn require(&self) -> Result<Arc<LiveSession>, SessionStateError> {
        self.current().ok_or(SessionStateError::NoSession)
    }

    /// True while a session exists and has not been stopped.
    pub fn stream_commands_enabled(&self) -> bool {
        self.current
            .load()
            .as_ref()
            .is_some_and(|session| session.status() != SessionStatus::Stopped)
    }

    fn replace(&self, session: Arc<LiveSession>) {
        self.current.store(Some(session));
    }
}

/// Owns the platform client, chat transports, and the current session.
pub struct SessionManager {
    config: SessionManagerConfig,
    platform: Arc<dyn PlatformClient>,
    transports: ChatTransports,
    handle: SessionHandle,
    chat_feed: Arc<EventFanout<ChatMessage>>,
    transition: Mutex<()>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SessionManager")
            .field("config", &self.config)
            .field("handle", &self.handle)
            .finish()
    }
}

impl SessionManager {
    pub fn new(
        config: SessionManagerConfig,
        platform: Arc<dyn PlatformClient>,
        transports: ChatTransports,
    ) -> Self {
        Self {
            config,
            platform,
            transports,
            handle: SessionHandle::default(),
            chat_feed: Arc::new(EventFanout::new()),
            transition: Mutex::new(()),
        }
    }

    pub fn operator(&self) -> &str {
        &self.config.operator
    }

    pub fn platform(&self) -> &Arc<dyn PlatformClient> {
        &self.platform
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn current(&self) -> Option<Arc<LiveSession>> {
        self.handle.current()
    }

    /// Chat from whichever session is current, across session replacements.
    pub fn chat_feed(&self) -> &Arc<EventFanout<ChatMessage>> {
        &self.chat_feed
    }

    fn ensure_no_active_session(&self) -> Result<(), SessionStateError> {
        match self.handle.current() {
            Some(session) if session.is_active() => Err(SessionStateError::AlreadyActive {
                status: session.status(),
            }),
            _ => Ok(()),
        }
    }

    pub async fn create_session(&self) -> Result<Arc<LiveSession>, SessionError> {
        let _transition = self.transition.lock().await;
        self.ensure_no_active_session()?;
        let session = LiveSession::create(
            Arc::clone(&self.platform),
            &self.transports,
            &self.chat_feed,
            &self.config.create_request,
        )
        .await?;
        Ok(self.install(session))
    }

    pub async fn view_session(&self, broadcast_id: &str) -> Result<Arc<LiveSession>, SessionError> {
        let _transition = self.transition.lock().await;
        self.ensure_no_active_session()?;
        let session = LiveSession::view(
            Arc::clone(&self.platform),
            &self.transports,
            &self.chat_feed,
            broadcast_id,
        )
        .await?;
        Ok(self.install(session))
    }

    fn install(&self, session: LiveSession) -> Arc<LiveSession> {
        let session = Arc::new(session);
        self.handle.replace(Arc::clone(&session));
        tracing::debug!(
            broadcast_id = %session.broadcast_id(),
            owned = session.is_owned(),
            "session installed"
        );
        session
    }

    /// Stops chat delivery for the current session, leaving the broadcast as is.
    pub async fn shutdown(&self) {
        if let Some(session) = self.handle.current() {
            session.chat().stop().await;
        }
    }
}

#[async_trait]
impl CommentPoster for SessionManager {
    async fn post_comment(&self, text: &str) -> anyhow::Result<()> {
        let session = self.handle.require()?;
        session.post_comment(text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
