//! Broadcast session layer for castline.
//!
//! Defines the platform client contract, the `LiveSession` lifecycle, the
//! `SessionManager` that keeps one current session behind a `SessionHandle`,
//! and the global and stream command sources operators drive it with.

pub mod commands;
pub mod desktop_actions;
pub mod live_session;
pub mod platform_client;
pub mod session_manager;

#[cfg(test)]
pub(crate) mod test_support;

pub use commands::{build_command_registry, render_box, CommandSettings};
pub use desktop_actions::{DesktopActions, SystemDesktopActions};
pub use live_session::{
    ChatTransports, LiveSession, RtmpInfo, SessionError, SessionStateError, SessionStatus,
};
pub use platform_client::{
    BroadcastInfo, CreateBroadcastRequest, CreatedBroadcast, LiveBroadcastSummary,
    PlatformClient, PlatformError, StartedBroadcast, DEFAULT_CREATE_MESSAGE,
    DEFAULT_PREVIEW_HEIGHT, DEFAULT_PREVIEW_WIDTH,
};
pub use session_manager::{SessionHandle, SessionManager, SessionManagerConfig};
