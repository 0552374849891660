use std::net::SocketAddr;
use std::time::Duration;

use castline_channel::{ChannelRelayConfig, ChannelServerConfig};
use castline_chat::DEFAULT_POLL_INTERVAL_MS;
use castline_platform::{
    HttpPlatformConfig, WebSocketPushConfig, DEFAULT_CONNECT_TIMEOUT_MS,
    DEFAULT_REQUEST_TIMEOUT_MS,
};
use castline_session::{
    CommandSettings, CreateBroadcastRequest, SessionManagerConfig, DEFAULT_CREATE_MESSAGE,
    DEFAULT_PREVIEW_HEIGHT, DEFAULT_PREVIEW_WIDTH,
};
use clap::Parser;

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u32(value: &str) -> Result<u32, String> {
    let parsed = value
        .parse::<u32>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_command_marker(value: &str) -> Result<String, String> {
    let marker = value.trim();
    if marker.is_empty() {
        return Err("command marker must not be empty".to_string());
    }
    if marker.chars().any(char::is_whitespace) {
        return Err("command marker must not contain whitespace".to_string());
    }
    Ok(marker.to_string())
}

#[derive(Debug, Parser)]
#[command(
    name = "castline",
    about = "Relay live broadcast chat to a local channel and drive the stream with commands",
    version
)]
/// Public struct `Cli` used across Castline components.
pub(crate) struct Cli {
    #[arg(
        long,
        env = "CASTLINE_API_BASE",
        help = "Base URL of the platform JSON API."
    )]
    pub api_base: String,

    #[arg(
        long,
        env = "CASTLINE_SESSION_TOKEN",
        hide_env_values = true,
        help = "Bearer token of the logged-in platform session."
    )]
    pub session_token: String,

    #[arg(
        long,
        env = "CASTLINE_OPERATOR",
        help = "Username of the operator; the only nickname admitted to the channel."
    )]
    pub operator: String,

    #[arg(
        long,
        env = "CASTLINE_PUSH_URL",
        help = "WebSocket URL of the realtime comment service."
    )]
    pub push_url: String,

    #[arg(
        long,
        env = "CASTLINE_POLL_INTERVAL_MS",
        default_value_t = DEFAULT_POLL_INTERVAL_MS,
        value_parser = parse_positive_u64,
        help = "Comment polling cadence used when the push subscription is unavailable."
    )]
    pub poll_interval_ms: u64,

    #[arg(
        long,
        env = "CASTLINE_REQUEST_TIMEOUT_MS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_MS,
        value_parser = parse_positive_u64,
        help = "Timeout for platform HTTP requests and the push connect."
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long,
        env = "CASTLINE_CHANNEL_BIND",
        default_value = "127.0.0.1:6667",
        help = "Address the line-based channel server listens on."
    )]
    pub channel_bind: SocketAddr,

    #[arg(
        long,
        env = "CASTLINE_CHANNEL_NAME",
        default_value = "live",
        help = "Channel name; a leading '#' is added when missing."
    )]
    pub channel_name: String,

    #[arg(
        long,
        env = "CASTLINE_COMMAND_MARKER",
        default_value = ".",
        value_parser = parse_command_marker,
        help = "Prefix that turns a channel message into a command."
    )]
    pub command_marker: String,

    #[arg(
        long,
        env = "CASTLINE_PREVIEW_WIDTH",
        default_value_t = DEFAULT_PREVIEW_WIDTH,
        value_parser = parse_positive_u32
    )]
    pub preview_width: u32,

    #[arg(
        long,
        env = "CASTLINE_PREVIEW_HEIGHT",
        default_value_t = DEFAULT_PREVIEW_HEIGHT,
        value_parser = parse_positive_u32
    )]
    pub preview_height: u32,

    #[arg(
        long,
        env = "CASTLINE_CREATE_MESSAGE",
        default_value = DEFAULT_CREATE_MESSAGE,
        help = "Message attached to newly created broadcasts."
    )]
    pub create_message: String,

    #[arg(
        long,
        env = "CASTLINE_LOG_FILTER",
        help = "tracing filter directives; overrides RUST_LOG."
    )]
    pub log_filter: Option<String>,
}

impl Cli {
    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub(crate) fn http_platform_config(&self) -> HttpPlatformConfig {
        HttpPlatformConfig {
            request_timeout_ms: self.request_timeout_ms,
            ..HttpPlatformConfig::new(self.api_base.trim(), self.session_token.as_str())
        }
    }

    pub(crate) fn push_config(&self) -> WebSocketPushConfig {
        WebSocketPushConfig {
            url: self.push_url.trim().to_string(),
            connect_timeout_ms: self.request_timeout_ms.min(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }

    pub(crate) fn session_manager_config(&self) -> SessionManagerConfig {
        SessionManagerConfig {
            operator: self.operator.trim().to_string(),
            create_request: CreateBroadcastRequest {
                preview_width: self.preview_width,
                preview_height: self.preview_height,
                message: self.create_message.clone(),
            },
        }
    }

    pub(crate) fn channel_server_config(&self) -> ChannelServerConfig {
        ChannelServerConfig {
            bind: self.channel_bind,
            channel_name: self.channel_name.clone(),
            allowed_nicknames: vec![self.operator.trim().to_string()],
        }
    }

    pub(crate) fn relay_config(&self) -> ChannelRelayConfig {
        ChannelRelayConfig {
            command_marker: self.command_marker.clone(),
            operator: Some(self.operator.trim().to_string()),
        }
    }

    pub(crate) fn command_settings(&self, bound: SocketAddr) -> CommandSettings {
        CommandSettings {
            channel_join_hint: format!(
                "Join {} on {bound}",
                castline_channel::normalize_channel_name(&self.channel_name)
            ),
        }
    }
}
