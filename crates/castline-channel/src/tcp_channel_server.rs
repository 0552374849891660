//! Newline-delimited TCP channel.
//!
//! Clients open with `NICK <name>`, after which every line they send is an
//! inbound message and every outbound line reaches them as `<author>: <text>`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use castline_core::EventFanout;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::channel::{normalize_channel_name, split_outbound_lines, Channel, ChannelMessage};

const MAX_LINE_LENGTH: usize = 4 * 1024;
const MAX_CONNECTION_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `ChannelServerConfig` used across Castline components.
pub struct ChannelServerConfig {
    pub bind: SocketAddr,
    pub channel_name: String,
    /// Nicknames allowed to join; empty admits everyone.
    pub allowed_nicknames: Vec<String>,
}

#[derive(Debug, Error)]
/// Enumerates supported `ChannelServerError` values.
pub enum ChannelServerError {
    #[error("failed to bind channel server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("channel server io failed: {0}")]
    Io(#[from] std::io::Error),
}

struct Participant {
    nickname: String,
    lines: mpsc::UnboundedSender<String>,
}

struct ServerShared {
    channel_name: String,
    allowed_nicknames: Vec<String>,
    inbound: EventFanout<ChannelMessage>,
    participants: Mutex<HashMap<u64, Participant>>,
}

impl ServerShared {
    fn lock_participants(&self) -> MutexGuard<'_, HashMap<u64, Participant>> {
        self.participants
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn admits(&self, nickname: &str) -> bool {
        self.allowed_nicknames.is_empty()
            || self
                .allowed_nicknames
                .iter()
                .any(|allowed| allowed == nickname)
    }
}

/// TCP line server exposing one channel.
pub struct TcpChannelServer {
    local_addr: SocketAddr,
    shared: Arc<ServerShared>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    accept_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TcpChannelServer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TcpChannelServer")
            .field("local_addr", &self.local_addr)
            .field("channel", &self.shared.channel_name)
            .finish()
    }
}

impl TcpChannelServer {
    pub async fn bind(config: ChannelServerConfig) -> Result<Self, ChannelServerError> {
        let listener = TcpListener::bind(config.bind)
            .await
            .map_err(|source| ChannelServerError::Bind {
                addr: config.bind,
                source,
            })?;
        let local_addr = listener.local_addr()?;
        let shared = Arc::new(ServerShared {
            channel_name: normalize_channel_name(&config.channel_name),
            allowed_nicknames: config.allowed_nicknames,
            inbound: EventFanout::new(),
            participants: Mutex::new(HashMap::new()),
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let accept_task = tokio::spawn(run_accept_loop(listener, Arc::clone(&shared), shutdown_rx));
        tracing::info!(
            addr = %local_addr,
            channel = %shared.channel_name,
            "channel server listening"
        );
        Ok(Self {
            local_addr,
            shared,
            shutdown_tx: Some(shutdown_tx),
            accept_task: Some(accept_task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn participants(&self) -> Vec<String> {
        let mut nicknames = self
            .shared
            .lock_participants()
            .values()
            .map(|participant| participant.nickname.clone())
            .collect::<Vec<_>>();
        nicknames.sort();
        nicknames
    }

    /// Stops accepting and disconnects every participant.
    pub async fn shutdown(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.accept_task.take() {
            if let Err(error) = task.await {
                tracing::warn!(error = %error, "channel accept loop ended abnormally");
            }
        }
        self.shared.lock_participants().clear();
        tracing::info!(addr = %self.local_addr, "channel server stopped");
    }
}

impl Drop for TcpChannelServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

impl Channel for TcpChannelServer {
    fn name(&self) -> &str {
        self.shared.channel_name.as_str()
    }

    fn send(&self, author: &str, text: &str) {
        let mut participants = self.shared.lock_participants();
        for line in split_outbound_lines(text) {
            let rendered = format!("{author}: {line}");
            participants.retain(|_, participant| participant.lines.send(rendered.clone()).is_ok());
        }
    }

    fn inbound(&self) -> &EventFanout<ChannelMessage> {
        &self.shared.inbound
    }
}

async fn run_accept_loop(
    listener: TcpListener,
    shared: Arc<ServerShared>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut next_id = 0_u64;
    let mut connections = Vec::new();
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let id = next_id;
                    next_id = next_id.saturating_add(1);
                    let shared = Arc::clone(&shared);
                    connections.push(tokio::spawn(async move {
                        if let Err(error) = handle_connection(id, stream, Arc::clone(&shared)).await {
                            tracing::debug!(peer = %peer, error = %error, "channel connection ended");
                        }
                        shared.lock_participants().remove(&id);
                    }));
                    connections.retain(|handle: &JoinHandle<()>| !handle.is_finished());
                }
                Err(error) => {
                    tracing::warn!(error = %error, "channel accept failed");
                }
            },
        }
    }
    for connection in connections {
        connection.abort();
    }
}

fn parse_nick_line(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("NICK ")?;
    let nickname = rest.trim();
    if nickname.is_empty() || nickname.contains(char::is_whitespace) || nickname.contains(':') {
        return None;
    }
    Some(nickname)
}

enum BoundedLine {
    Line(String),
    TooLong,
    Eof,
}

/// Reads one line while buffering at most `MAX_LINE_LENGTH` bytes of it.
///
/// An over-long line is drained through its terminator and reported as
/// [`BoundedLine::TooLong`].
async fn read_bounded_line<R>(reader: &mut R, buffer: &mut Vec<u8>) -> std::io::Result<BoundedLine>
where
    R: AsyncBufRead + Unpin,
{
    buffer.clear();
    let mut limited = (&mut *reader).take(MAX_LINE_LENGTH as u64 + 1);
    if limited.read_until(b'\n', buffer).await? == 0 {
        return Ok(BoundedLine::Eof);
    }
    if buffer.last() == Some(&b'\n') {
        buffer.pop();
    } else if buffer.len() > MAX_LINE_LENGTH {
        loop {
            buffer.clear();
            let mut limited = (&mut *reader).take(MAX_LINE_LENGTH as u64);
            let read = limited.read_until(b'\n', buffer).await?;
            if read == 0 || buffer.last() == Some(&b'\n') {
                break;
            }
        }
        buffer.clear();
        return Ok(BoundedLine::TooLong);
    }
    if buffer.last() == Some(&b'\r') {
        buffer.pop();
    }
    Ok(BoundedLine::Line(String::from_utf8_lossy(buffer).into_owned()))
}

async fn handle_connection(
    id: u64,
    stream: TcpStream,
    shared: Arc<ServerShared>,
) -> Result<(), ChannelServerError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader.take(MAX_CONNECTION_BYTES));
    let mut buffer = Vec::with_capacity(256);

    let first = match read_bounded_line(&mut reader, &mut buffer).await? {
        BoundedLine::Eof => return Ok(()),
        BoundedLine::TooLong => String::new(),
        BoundedLine::Line(line) => line,
    };
    let Some(nickname) = parse_nick_line(&first).map(str::to_string) else {
        writer.write_all(b"ERROR expected NICK <name>\n").await?;
        return Ok(());
    };
    if !shared.admits(&nickname) {
        tracing::warn!(nickname = %nickname, "channel join rejected");
        writer.write_all(b"ERROR nickname not allowed\n").await?;
        return Ok(());
    }

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    shared.lock_participants().insert(
        id,
        Participant {
            nickname: nickname.clone(),
            lines: line_tx,
        },
    );
    writer
        .write_all(format!("WELCOME {}\n", shared.channel_name).as_bytes())
        .await?;
    tracing::info!(nickname = %nickname, "channel participant joined");

    let writer_task = tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            let mut framed = line;
            framed.push('\n');
            if writer.write_all(framed.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let result = async {
        loop {
            let line = match read_bounded_line(&mut reader, &mut buffer).await? {
                BoundedLine::Eof => break,
                BoundedLine::TooLong => {
                    tracing::warn!(nickname = %nickname, "channel line too long; dropped");
                    continue;
                }
                BoundedLine::Line(line) => line,
            };
            if line.is_empty() {
                continue;
            }
            shared.inbound.emit(&ChannelMessage::new(nickname.as_str(), line.as_str()));
        }
        Ok::<(), ChannelServerError>(())
    }
    .await;

    shared.lock_participants().remove(&id);
    writer_task.abort();
    tracing::info!(nickname = %nickname, "channel participant left");
    result
}
