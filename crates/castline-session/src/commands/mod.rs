//! Operator command sources bound to the session manager.

pub mod global_commands;
pub mod stream_commands;

use std::sync::Arc;

use castline_commands::{CommandRegistry, CommandRegistryError};

use crate::desktop_actions::DesktopActions;
use crate::session_manager::SessionManager;

pub use global_commands::global_source;
pub use stream_commands::stream_source;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `CommandSettings` used across Castline components.
pub struct CommandSettings {
    /// Where participants join the channel, e.g. `#live on 127.0.0.1:6667`.
    pub channel_join_hint: String,
}

/// Builds the registry from the global and stream sources plus `help`.
pub fn build_command_registry(
    manager: Arc<SessionManager>,
    desktop: Arc<dyn DesktopActions>,
    settings: CommandSettings,
) -> Result<CommandRegistry, CommandRegistryError> {
    let handle = manager.handle();
    CommandRegistry::builder()
        .source(global_source(manager, settings))?
        .source(stream_source(handle, desktop))?
        .build()
}

/// Draws a single-line box around `text`, `padding` rows tall and three
/// times as many columns wide on each side.
pub fn render_box(text: &str, padding: usize) -> String {
    let lines = text.lines().collect::<Vec<_>>();
    let content_width = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);
    let horizontal = padding * 3;
    let inner_width = content_width + horizontal * 2;
    let blank = format!("│{}│", " ".repeat(inner_width));

    let mut rows = Vec::with_capacity(lines.len() + padding * 2 + 2);
    rows.push(format!("┌{}┐", "─".repeat(inner_width)));
    rows.extend(std::iter::repeat(blank.clone()).take(padding));
    for line in lines {
        let fill = content_width - line.chars().count();
        rows.push(format!(
            "│{}{}{}{}│",
            " ".repeat(horizontal),
            line,
            " ".repeat(fill),
            " ".repeat(horizontal)
        ));
    }
    rows.extend(std::iter::repeat(blank).take(padding));
    rows.push(format!("└{}┘", "─".repeat(inner_width)));
    rows.join("\n")
}
