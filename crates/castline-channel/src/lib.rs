//! Channel adapters and the relay between chat, channel, and commands.
//!
//! A `Channel` is anything that accepts `send(author, text)` and emits
//! inbound participant messages. `ChannelRelay` routes inbound text to the
//! command dispatcher or the comment poster and mirrors chat to the channel.

pub mod channel;
pub mod channel_relay;
pub mod tcp_channel_server;

pub use channel::{normalize_channel_name, split_outbound_lines, Channel, ChannelMessage, LocalChannel};
pub use channel_relay::{
    route_inbound, ChannelRelay, ChannelRelayConfig, CommentPoster, InboundRoute, RelayAction,
    RelayHandle, DEFAULT_COMMAND_MARKER,
};
pub use tcp_channel_server::{ChannelServerConfig, ChannelServerError, TcpChannelServer};
