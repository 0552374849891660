//! Routes channel input to commands or comments and mirrors chat outward.

use std::sync::Arc;

use async_trait::async_trait;
use castline_commands::{CommandDispatcher, CommandReply, DispatchOutcome};
use castline_core::{ChatMessage, EventFanout, SYSTEM_AUTHOR};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::channel::{Channel, ChannelMessage};

pub const DEFAULT_COMMAND_MARKER: &str = ".";

#[async_trait]
/// Trait contract for posting a comment to the current broadcast.
pub trait CommentPoster: Send + Sync {
    async fn post_comment(&self, text: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `ChannelRelayConfig` used across Castline components.
pub struct ChannelRelayConfig {
    pub command_marker: String,
    /// Chat authored by this identity is not echoed back to the channel.
    pub operator: Option<String>,
}

impl Default for ChannelRelayConfig {
    fn default() -> Self {
        Self {
            command_marker: DEFAULT_COMMAND_MARKER.to_string(),
            operator: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `InboundRoute` values.
pub enum InboundRoute {
    Comment(String),
    Command(String),
}

/// Classifies inbound text: a doubled marker escapes to a literal comment.
pub fn route_inbound(marker: &str, text: &str) -> InboundRoute {
    if marker.is_empty() {
        return InboundRoute::Comment(text.to_string());
    }
    match text.strip_prefix(marker) {
        Some(rest) if rest.starts_with(marker) => InboundRoute::Comment(rest.to_string()),
        Some(rest) => InboundRoute::Command(rest.to_string()),
        None => InboundRoute::Comment(text.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `RelayAction` values.
pub enum RelayAction {
    Dispatched(DispatchOutcome),
    Posted,
    PostFailed,
}

/// Couples one channel to the dispatcher and the comment poster.
pub struct ChannelRelay {
    config: ChannelRelayConfig,
    channel: Arc<dyn Channel>,
    dispatcher: Arc<CommandDispatcher>,
    poster: Arc<dyn CommentPoster>,
    listeners: EventFanout<ChatMessage>,
}

impl std::fmt::Debug for ChannelRelay {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ChannelRelay")
            .field("config", &self.config)
            .field("channel", &self.channel.name())
            .finish()
    }
}

impl ChannelRelay {
    pub fn new(
        config: ChannelRelayConfig,
        channel: Arc<dyn Channel>,
        dispatcher: Arc<CommandDispatcher>,
        poster: Arc<dyn CommentPoster>,
    ) -> Self {
        Self {
            config,
            channel,
            dispatcher,
            poster,
            listeners: EventFanout::new(),
        }
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// Listeners that receive every chat message the relay forwards.
    pub fn listeners(&self) -> &EventFanout<ChatMessage> {
        &self.listeners
    }

    fn is_operator(&self, message: &ChatMessage) -> bool {
        !message.is_system
            && self
                .config
                .operator
                .as_deref()
                .is_some_and(|operator| operator == message.user)
    }

    /// Re-emits a chat message to listeners and to the channel.
    pub fn forward_chat(&self, message: &ChatMessage) {
        self.listeners.emit(message);
        if self.is_operator(message) {
            return;
        }
        self.channel.send(message.channel_author(), &message.text);
    }

    /// Replies sent to the channel as the system author.
    pub fn channel_reply(&self) -> CommandReply {
        let channel = Arc::clone(&self.channel);
        CommandReply::new(move |text| channel.send(SYSTEM_AUTHOR, &text))
    }

    pub async fn handle_inbound(&self, message: &ChannelMessage) -> RelayAction {
        match route_inbound(&self.config.command_marker, &message.text) {
            InboundRoute::Command(line) => {
                tracing::debug!(author = %message.author, input = %line, "channel command received");
                let outcome = self.dispatcher.dispatch(&line, self.channel_reply()).await;
                RelayAction::Dispatched(outcome)
            }
            InboundRoute::Comment(text) => match self.poster.post_comment(&text).await {
                Ok(()) => RelayAction::Posted,
                Err(error) => {
                    tracing::warn!(
                        author = %message.author,
                        error = ?error,
                        "failed to post channel message as comment"
                    );
                    RelayAction::PostFailed
                }
            },
        }
    }

    /// Starts consuming inbound channel messages on a background task.
    ///
    /// The inbound subscription is registered before this returns.
    pub fn spawn(self: Arc<Self>) -> RelayHandle {
        let inbound = self.channel.inbound().subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_relay_loop(self, inbound, shutdown_rx));
        RelayHandle {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

async fn run_relay_loop(
    relay: Arc<ChannelRelay>,
    mut inbound: mpsc::UnboundedReceiver<ChannelMessage>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            message = inbound.recv() => match message {
                Some(message) => {
                    relay.handle_inbound(&message).await;
                }
                None => break,
            },
        }
    }
    tracing::debug!(channel = %relay.channel.name(), "channel relay loop exited");
}

#[derive(Debug)]
/// Handle for a spawned relay loop.
pub struct RelayHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RelayHandle {
    pub async fn shutdown(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(error = %error, "channel relay task ended abnormally");
            }
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}
