use std::sync::Arc;

use castline_commands::{CommandDescriptor, CommandSource, OptionSpec};

use super::{render_box, CommandSettings};
use crate::session_manager::SessionManager;

pub const NO_USERS_LIVE_MESSAGE: &str = "No users are live!";
pub const USER_NOT_LIVE_MESSAGE: &str = "The user is not live.";

/// `create`, `list`, and `view <username>`; always enabled.
pub fn global_source(manager: Arc<SessionManager>, settings: CommandSettings) -> CommandSource {
    let create_manager = Arc::clone(&manager);
    let list_manager = Arc::clone(&manager);
    let view_manager = manager;
    let join_hint: Arc<str> = Arc::from(settings.channel_join_hint);

    CommandSource::new("global")
        .command(CommandDescriptor::new("create", Vec::new(), move |_args, context| {
            let manager = Arc::clone(&create_manager);
            let join_hint = Arc::clone(&join_hint);
            async move {
                let session = manager.create_session().await?;
                context.reply(format!(
                    "Created stream!\nYour stream url is:\n{}\nCopy your stream-key with \"key\".\nJoin the channel\n{}\nwith your username ({}).",
                    render_box(&session.rtmp_info().url, 1),
                    render_box(&join_hint, 0),
                    manager.operator()
                ));
                Ok(())
            }
        }))
        .command(CommandDescriptor::new("list", Vec::new(), move |_args, context| {
            let manager = Arc::clone(&list_manager);
            async move {
                let broadcasts = manager.platform().list_live_broadcasts().await?;
                if broadcasts.is_empty() {
                    context.reply(NO_USERS_LIVE_MESSAGE);
                    return Ok(());
                }
                let users = broadcasts
                    .iter()
                    .map(|broadcast| {
                        format!(
                            "\t{} ({} viewers)",
                            broadcast.owner_username, broadcast.viewer_count
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                context.reply(format!("Users:\n{users}"));
                context.reply("Use \"view <username>\" to view a stream.");
                Ok(())
            }
        }))
        .command(CommandDescriptor::new(
            "view",
            vec![OptionSpec::string("username")],
            move |args, context| {
                let manager = Arc::clone(&view_manager);
                async move {
                    let username = args.require_text(0, "username")?.to_string();
                    let Some(broadcast) = manager.platform().find_user_broadcast(&username).await?
                    else {
                        tracing::debug!(username = %username, "view target is not live");
                        context.reply(USER_NOT_LIVE_MESSAGE);
                        anyhow::bail!("no broadcast found for '{username}'");
                    };
                    manager.view_session(&broadcast.broadcast_id).await?;
                    context.reply(format!("Viewing {username}'s stream."));
                    Ok(())
                }
            },
        ))
}
