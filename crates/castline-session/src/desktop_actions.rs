//! Clipboard and media-player side effects behind a trait.

use std::process::Stdio;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const WINDOWS_VLC_PATH: &str = r"C:\Program Files\VideoLAN\VLC\vlc.exe";

#[async_trait]
/// Trait contract for operator desktop integrations.
pub trait DesktopActions: Send + Sync {
    async fn copy_to_clipboard(&self, text: &str) -> anyhow::Result<()>;

    async fn open_in_vlc(&self, url: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
/// Shells out to the platform clipboard tool and the `vlc` binary.
pub struct SystemDesktopActions;

type ClipboardTool = (&'static str, &'static [&'static str]);

const MACOS_CLIPBOARD_TOOLS: &[ClipboardTool] = &[("pbcopy", &[])];
const WINDOWS_CLIPBOARD_TOOLS: &[ClipboardTool] = &[("clip", &[])];
const UNIX_CLIPBOARD_TOOLS: &[ClipboardTool] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

fn clipboard_tools() -> &'static [ClipboardTool] {
    if cfg!(target_os = "macos") {
        MACOS_CLIPBOARD_TOOLS
    } else if cfg!(windows) {
        WINDOWS_CLIPBOARD_TOOLS
    } else {
        UNIX_CLIPBOARD_TOOLS
    }
}

async fn pipe_to_command(program: &str, args: &[&str], input: &str) -> anyhow::Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .await
            .with_context(|| format!("failed to write to {program}"))?;
    }
    let status = child
        .wait()
        .await
        .with_context(|| format!("failed to wait for {program}"))?;
    if !status.success() {
        bail!("{program} exited with {status}");
    }
    Ok(())
}

fn spawn_detached(program: &str, url: &str) -> std::io::Result<()> {
    Command::new(program)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

#[async_trait]
impl DesktopActions for SystemDesktopActions {
    async fn copy_to_clipboard(&self, text: &str) -> anyhow::Result<()> {
        let mut last_error = None;
        for (program, args) in clipboard_tools() {
            match pipe_to_command(program, args, text).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    tracing::debug!(program = *program, error = %error, "clipboard tool failed");
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("no clipboard tool available")))
    }

    async fn open_in_vlc(&self, url: &str) -> anyhow::Result<()> {
        let error = match spawn_detached("vlc", url) {
            Ok(()) => return Ok(()),
            Err(error) => error,
        };
        tracing::debug!(error = %error, "failed to execute vlc");
        if cfg!(windows) {
            return spawn_detached(WINDOWS_VLC_PATH, url)
                .with_context(|| format!("failed to execute {WINDOWS_VLC_PATH}"));
        }
        bail!("VLC is not in PATH. Add vlc to PATH!")
    }
}
