use std::sync::Arc;

use castline_commands::{CommandDescriptor, CommandSource, OptionSpec};

use crate::desktop_actions::DesktopActions;
use crate::session_manager::SessionHandle;

pub const CLIPBOARD_REPLY: &str = "Copied to clipboard!";

/// `stop`, `start`, `url`, `key`, and `vlc`; enabled while a session is
/// open and not stopped.
pub fn stream_source(handle: SessionHandle, desktop: Arc<dyn DesktopActions>) -> CommandSource {
    let gate = handle.clone();
    let stop_handle = handle.clone();
    let start_handle = handle.clone();
    let url_handle = handle.clone();
    let key_handle = handle.clone();
    let vlc_handle = handle;
    let url_desktop = Arc::clone(&desktop);
    let key_desktop = Arc::clone(&desktop);
    let vlc_desktop = desktop;

    CommandSource::new("stream")
        .restricted(move || gate.stream_commands_enabled())
        .command(CommandDescriptor::new(
            "stop",
            vec![OptionSpec::flag("highlight")],
            move |args, context| {
                let handle = stop_handle.clone();
                async move {
                    let session = handle.require()?;
                    if session.is_owned() {
                        session.stop(args.flag(0)).await?;
                        context.reply("Stopped stream!");
                    } else {
                        session.leave().await?;
                        context.reply("Left stream.");
                    }
                    Ok(())
                }
            },
        ))
        .command(CommandDescriptor::new("start", Vec::new(), move |_args, context| {
            let handle = start_handle.clone();
            async move {
                handle.require()?.start().await?;
                context.reply("Started stream!");
                Ok(())
            }
        }))
        .command(CommandDescriptor::new("url", Vec::new(), move |_args, context| {
            let handle = url_handle.clone();
            let desktop = Arc::clone(&url_desktop);
            async move {
                let session = handle.require()?;
                desktop.copy_to_clipboard(&session.rtmp_info().url).await?;
                context.reply(CLIPBOARD_REPLY);
                Ok(())
            }
        }))
        .command(CommandDescriptor::new("key", Vec::new(), move |_args, context| {
            let handle = key_handle.clone();
            let desktop = Arc::clone(&key_desktop);
            async move {
                let session = handle.require()?;
                desktop.copy_to_clipboard(&session.rtmp_info().key).await?;
                context.reply(CLIPBOARD_REPLY);
                Ok(())
            }
        }))
        .command(CommandDescriptor::new("vlc", Vec::new(), move |_args, context| {
            let handle = vlc_handle.clone();
            let desktop = Arc::clone(&vlc_desktop);
            async move {
                let session = handle.require()?;
                desktop.open_in_vlc(session.dash_playback_url()).await?;
                context.reply("Opened.");
                Ok(())
            }
        }))
}
