//! Push-first chat bridge with interval polling fallback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use castline_core::{ChatMessage, EventFanout};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::chat_transport::{CommentBatch, PollTransport, PushDeliveries, PushTopic, PushTransport};
use crate::watermark::{admit_polled_batch, Watermark};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `ChatBridgeConfig` used across Castline components.
pub struct ChatBridgeConfig {
    pub broadcast_id: String,
    pub poll_interval: Duration,
}

impl ChatBridgeConfig {
    pub fn new(broadcast_id: impl Into<String>) -> Self {
        Self {
            broadcast_id: broadcast_id.into(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `ChatSourceState` values.
pub enum ChatSourceState {
    Idle,
    ConnectingPush,
    ActivePush,
    ActivePoll,
    Stopped,
}

impl ChatSourceState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ConnectingPush => "connecting_push",
            Self::ActivePush => "active_push",
            Self::ActivePoll => "active_poll",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ChatSourceState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates supported `ChatBridgeError` values.
pub enum ChatBridgeError {
    #[error("chat bridge cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: ChatSourceState,
    },
    #[error("chat poll interval must be greater than zero")]
    ZeroPollInterval,
}

struct SourceTask {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SourceTask {
    fn signal_shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

struct BridgeInner {
    state: ChatSourceState,
    watermark: Watermark,
    source: Option<SourceTask>,
}

struct BridgeShared {
    inner: Mutex<BridgeInner>,
    halted: AtomicBool,
    messages: EventFanout<ChatMessage>,
}

impl BridgeShared {
    fn lock_inner(&self) -> MutexGuard<'_, BridgeInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit_all(&self, messages: &[ChatMessage]) {
        for message in messages {
            if self.halted.load(Ordering::Acquire) {
                return;
            }
            self.messages.emit(message);
        }
    }

    fn deliver_pushed(&self, batch: CommentBatch) {
        self.emit_all(&batch.into_messages());
    }

    fn deliver_polled(&self, batch: &CommentBatch) {
        let admitted = {
            let mut inner = self.lock_inner();
            admit_polled_batch(&mut inner.watermark, batch)
        };
        self.emit_all(&admitted);
    }

    fn since(&self) -> u64 {
        self.lock_inner().watermark.since()
    }
}

enum ConnectResolution {
    Active(ChatSourceState),
    Cancelled { connected: bool },
}

/// Bridges one broadcast's comments into a single ordered message stream.
///
/// Push is attempted once per `start`; if it fails the bridge polls every
/// `poll_interval` and never retries push.
pub struct ChatBridge {
    config: ChatBridgeConfig,
    push: Arc<dyn PushTransport>,
    poll: Arc<dyn PollTransport>,
    shared: Arc<BridgeShared>,
}

impl std::fmt::Debug for ChatBridge {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ChatBridge")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl ChatBridge {
    pub fn new(
        config: ChatBridgeConfig,
        push: Arc<dyn PushTransport>,
        poll: Arc<dyn PollTransport>,
    ) -> Result<Self, ChatBridgeError> {
        if config.poll_interval.is_zero() {
            return Err(ChatBridgeError::ZeroPollInterval);
        }
        Ok(Self {
            config,
            push,
            poll,
            shared: Arc::new(BridgeShared {
                inner: Mutex::new(BridgeInner {
                    state: ChatSourceState::Idle,
                    watermark: Watermark::default(),
                    source: None,
                }),
                halted: AtomicBool::new(false),
                messages: EventFanout::new(),
            }),
        })
    }

    pub fn broadcast_id(&self) -> &str {
        self.config.broadcast_id.as_str()
    }

    pub fn state(&self) -> ChatSourceState {
        self.shared.lock_inner().state
    }

    pub fn watermark(&self) -> Watermark {
        self.shared.lock_inner().watermark
    }

    /// Listener list that receives every chat message in delivery order.
    pub fn messages(&self) -> &EventFanout<ChatMessage> {
        &self.shared.messages
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ChatMessage> {
        self.shared.messages.subscribe()
    }

    /// Connects push, falling back to polling when the connect fails.
    ///
    /// Returns the state reached: `ActivePush`, `ActivePoll`, or `Stopped`
    /// when `stop` ran while the push connect was still pending.
    pub async fn start(&self) -> Result<ChatSourceState, ChatBridgeError> {
        {
            let mut inner = self.shared.lock_inner();
            if inner.state != ChatSourceState::Idle {
                return Err(ChatBridgeError::InvalidState {
                    operation: "start",
                    state: inner.state,
                });
            }
            inner.state = ChatSourceState::ConnectingPush;
        }

        tracing::debug!(
            broadcast_id = %self.config.broadcast_id,
            "connecting chat push transport"
        );
        let topics = PushTopic::for_broadcast(&self.config.broadcast_id);
        let connected = self.push.connect(&topics).await;

        let resolution = {
            let mut inner = self.shared.lock_inner();
            if inner.state == ChatSourceState::Stopped {
                ConnectResolution::Cancelled {
                    connected: connected.is_ok(),
                }
            } else {
                match connected {
                    Ok(deliveries) => {
                        inner.state = ChatSourceState::ActivePush;
                        inner.source = Some(spawn_push_forwarder(
                            Arc::clone(&self.shared),
                            deliveries,
                        ));
                        ConnectResolution::Active(ChatSourceState::ActivePush)
                    }
                    Err(error) => {
                        tracing::warn!(
                            broadcast_id = %self.config.broadcast_id,
                            error = %error,
                            "chat push unavailable; falling back to polling"
                        );
                        inner.state = ChatSourceState::ActivePoll;
                        inner.source = Some(spawn_poll_loop(
                            Arc::clone(&self.shared),
                            Arc::clone(&self.poll),
                            self.config.broadcast_id.clone(),
                            self.config.poll_interval,
                        ));
                        ConnectResolution::Active(ChatSourceState::ActivePoll)
                    }
                }
            }
        };

        match resolution {
            ConnectResolution::Active(state) => {
                tracing::info!(
                    broadcast_id = %self.config.broadcast_id,
                    source = state.as_str(),
                    "chat bridge started"
                );
                Ok(state)
            }
            ConnectResolution::Cancelled { connected } => {
                if connected {
                    self.disconnect_push().await;
                }
                tracing::debug!(
                    broadcast_id = %self.config.broadcast_id,
                    "chat bridge stopped before push connect resolved"
                );
                Ok(ChatSourceState::Stopped)
            }
        }
    }

    /// Stops delivery. Idempotent; once it returns no further message is emitted.
    pub async fn stop(&self) {
        let (previous, source) = {
            let mut inner = self.shared.lock_inner();
            let previous = inner.state;
            if previous == ChatSourceState::Stopped {
                return;
            }
            inner.state = ChatSourceState::Stopped;
            self.shared.halted.store(true, Ordering::Release);
            (previous, inner.source.take())
        };

        if let Some(mut source) = source {
            source.signal_shutdown();
            if let Err(error) = source.task.await {
                if !error.is_cancelled() {
                    tracing::warn!(error = %error, "chat source task ended abnormally");
                }
            }
        }
        if previous == ChatSourceState::ActivePush {
            self.disconnect_push().await;
        }
        tracing::info!(
            broadcast_id = %self.config.broadcast_id,
            previous = previous.as_str(),
            "chat bridge stopped"
        );
    }

    async fn disconnect_push(&self) {
        if let Err(error) = self.push.disconnect().await {
            tracing::warn!(
                broadcast_id = %self.config.broadcast_id,
                error = %error,
                "chat push disconnect failed"
            );
        }
    }
}

impl Drop for ChatBridge {
    fn drop(&mut self) {
        self.shared.halted.store(true, Ordering::Release);
        let source = self.shared.lock_inner().source.take();
        if let Some(mut source) = source {
            source.signal_shutdown();
            source.task.abort();
        }
    }
}

fn spawn_push_forwarder(shared: Arc<BridgeShared>, deliveries: PushDeliveries) -> SourceTask {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run_push_forwarder(shared, deliveries, shutdown_rx));
    SourceTask {
        shutdown_tx: Some(shutdown_tx),
        task,
    }
}

async fn run_push_forwarder(
    shared: Arc<BridgeShared>,
    mut deliveries: PushDeliveries,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            batch = deliveries.recv() => match batch {
                Some(batch) => shared.deliver_pushed(batch),
                None => {
                    tracing::warn!("chat push delivery stream closed");
                    break;
                }
            },
        }
    }
}

fn spawn_poll_loop(
    shared: Arc<BridgeShared>,
    poll: Arc<dyn PollTransport>,
    broadcast_id: String,
    poll_interval: Duration,
) -> SourceTask {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run_poll_loop(
        shared,
        poll,
        broadcast_id,
        poll_interval,
        shutdown_rx,
    ));
    SourceTask {
        shutdown_tx: Some(shutdown_tx),
        task,
    }
}

async fn run_poll_loop(
    shared: Arc<BridgeShared>,
    poll: Arc<dyn PollTransport>,
    broadcast_id: String,
    poll_interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {}
        }

        let since = shared.since();
        let fetched = tokio::select! {
            _ = &mut shutdown_rx => break,
            fetched = poll.fetch_comments(&broadcast_id, since) => fetched,
        };
        match fetched {
            Ok(batch) => shared.deliver_polled(&batch),
            Err(error) => {
                tracing::warn!(
                    broadcast_id = %broadcast_id,
                    since,
                    error = %error,
                    "chat poll failed; retrying next tick"
                );
            }
        }
    }
}
