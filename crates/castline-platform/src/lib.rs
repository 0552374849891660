//! Network adapters for the castline platform.
//!
//! `HttpPlatformClient` speaks the JSON session API with reqwest and also
//! serves as the chat `PollTransport`; `WebSocketPushTransport` subscribes to
//! live comment topics with tokio-tungstenite.

pub mod http_platform_client;
mod retry;
pub mod websocket_push_transport;

pub use http_platform_client::{
    HttpPlatformClient, HttpPlatformConfig, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS,
};
pub use websocket_push_transport::{
    decode_push_frame, WebSocketPushConfig, WebSocketPushTransport, DEFAULT_CONNECT_TIMEOUT_MS,
};
