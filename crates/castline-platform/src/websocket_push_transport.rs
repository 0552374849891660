//! WebSocket push subscription for live comments.
//!
//! After connecting the client sends
//! `{"type":"subscribe","topics":[...]}`; the server pushes
//! `{"type":"comments","comments":[...],"system_comments":[...]}` frames.
//! Other frame types are ignored. Disconnect sends an `unsubscribe` frame
//! followed by a close frame.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use castline_chat::{ChatComment, ChatTransportError, CommentBatch, PushDeliveries, PushTopic, PushTransport};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DELIVERY_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `WebSocketPushConfig` used across Castline components.
pub struct WebSocketPushConfig {
    pub url: String,
    pub connect_timeout_ms: u64,
}

impl WebSocketPushConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Serialize)]
struct SubscriptionFrame<'a> {
    #[serde(rename = "type")]
    frame_type: &'a str,
    topics: &'a [String],
}

#[derive(Debug, Deserialize)]
struct PushFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    comments: Vec<ChatComment>,
    #[serde(default)]
    system_comments: Vec<ChatComment>,
}

/// Decodes one text frame; `Ok(None)` for frames that carry no comments.
pub fn decode_push_frame(text: &str) -> Result<Option<CommentBatch>, ChatTransportError> {
    let frame = serde_json::from_str::<PushFrame>(text)
        .map_err(|error| ChatTransportError::Decode(error.to_string()))?;
    if frame.frame_type != "comments" {
        return Ok(None);
    }
    Ok(Some(CommentBatch {
        comments: frame.comments,
        system_comments: frame.system_comments,
    }))
}

fn subscription_frame(frame_type: &str, topics: &[String]) -> Result<String, ChatTransportError> {
    serde_json::to_string(&SubscriptionFrame { frame_type, topics })
        .map_err(|error| ChatTransportError::Decode(error.to_string()))
}

struct PushConnection {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// tokio-tungstenite `PushTransport` holding at most one subscription.
pub struct WebSocketPushTransport {
    config: WebSocketPushConfig,
    connection: Arc<Mutex<Option<PushConnection>>>,
}

impl std::fmt::Debug for WebSocketPushTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("WebSocketPushTransport")
            .field("config", &self.config)
            .finish()
    }
}

impl WebSocketPushTransport {
    pub fn new(config: WebSocketPushConfig) -> Self {
        Self {
            config,
            connection: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl PushTransport for WebSocketPushTransport {
    async fn connect(&self, topics: &[PushTopic]) -> Result<PushDeliveries, ChatTransportError> {
        let mut connection = self.connection.lock().await;
        if connection.is_some() {
            return Err(ChatTransportError::Connect(
                "push subscription already open".to_string(),
            ));
        }

        let timeout = Duration::from_millis(self.config.connect_timeout_ms.max(1));
        let (stream, _response) = tokio::time::timeout(timeout, connect_async(self.config.url.as_str()))
            .await
            .map_err(|_| ChatTransportError::Connect(format!("timed out after {timeout:?}")))?
            .map_err(|error| ChatTransportError::Connect(error.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let topic_names = topics.iter().map(PushTopic::topic_name).collect::<Vec<_>>();
        sink.send(WsMessage::Text(subscription_frame("subscribe", &topic_names)?.into()))
            .await
            .map_err(|error| ChatTransportError::Connect(error.to_string()))?;
        tracing::debug!(url = %self.config.url, topics = ?topic_names, "push subscription opened");

        let (batch_tx, batch_rx) = mpsc::channel(DELIVERY_BUFFER);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        match subscription_frame("unsubscribe", &topic_names) {
                            Ok(frame) => {
                                let _ = sink.send(WsMessage::Text(frame.into())).await;
                            }
                            Err(error) => tracing::debug!(error = %error, "unsubscribe frame encode failed"),
                        }
                        let _ = sink.send(WsMessage::Close(None)).await;
                        break;
                    }
                    message = source.next() => {
                        let Some(message) = message else {
                            tracing::debug!("push socket closed by server");
                            break;
                        };
                        let text = match message {
                            Ok(WsMessage::Text(text)) => text.as_str().to_string(),
                            Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                                Ok(text) => text,
                                Err(error) => {
                                    tracing::warn!(error = %error, "invalid utf-8 push payload");
                                    continue;
                                }
                            },
                            Ok(WsMessage::Close(_)) => break,
                            Ok(_) => continue,
                            Err(error) => {
                                tracing::warn!(error = %error, "push socket read failed");
                                break;
                            }
                        };
                        match decode_push_frame(&text) {
                            Ok(Some(batch)) => {
                                if batch_tx.send(batch).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(error) => tracing::warn!(error = %error, "push frame ignored"),
                        }
                    }
                }
            }
        });

        *connection = Some(PushConnection {
            shutdown_tx: Some(shutdown_tx),
            task,
        });
        Ok(batch_rx)
    }

    async fn disconnect(&self) -> Result<(), ChatTransportError> {
        let Some(mut connection) = self.connection.lock().await.take() else {
            return Ok(());
        };
        if let Some(shutdown_tx) = connection.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        connection
            .task
            .await
            .map_err(|error| ChatTransportError::Disconnect(error.to_string()))?;
        tracing::debug!(url = %self.config.url, "push subscription closed");
        Ok(())
    }
}
