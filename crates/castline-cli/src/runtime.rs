//! Wires the platform adapters, session manager, commands, and channel relay.

use std::sync::Arc;

use anyhow::{Context, Result};
use castline_channel::{Channel, ChannelRelay, CommentPoster, RelayHandle, TcpChannelServer};
use castline_chat::{PollTransport, PushTransport};
use castline_commands::{CommandDispatcher, CommandReply};
use castline_platform::{HttpPlatformClient, WebSocketPushTransport};
use castline_session::{
    build_command_registry, ChatTransports, DesktopActions, PlatformClient, SessionManager,
    SystemDesktopActions,
};
use tokio::io::BufReader;

use crate::cli_args::Cli;
use crate::console::run_console;

struct CastlineRuntime {
    manager: Arc<SessionManager>,
    dispatcher: Arc<CommandDispatcher>,
    relay: RelayHandle,
}

impl CastlineRuntime {
    async fn start(cli: &Cli) -> Result<Self> {
        let platform = Arc::new(
            HttpPlatformClient::new(cli.http_platform_config())
                .context("failed to build platform client")?,
        );
        let push: Arc<dyn PushTransport> = Arc::new(WebSocketPushTransport::new(cli.push_config()));
        let poll: Arc<dyn PollTransport> = platform.clone();
        let transports = ChatTransports::new(push, poll).with_poll_interval(cli.poll_interval());
        let manager = Arc::new(SessionManager::new(
            cli.session_manager_config(),
            platform as Arc<dyn PlatformClient>,
            transports,
        ));

        let server = TcpChannelServer::bind(cli.channel_server_config())
            .await
            .context("failed to start channel server")?;
        let settings = cli.command_settings(server.local_addr());
        let channel: Arc<dyn Channel> = Arc::new(server);

        let desktop: Arc<dyn DesktopActions> = Arc::new(SystemDesktopActions);
        let registry = build_command_registry(Arc::clone(&manager), desktop, settings)
            .context("failed to build command registry")?;
        let dispatcher = Arc::new(CommandDispatcher::new(Arc::new(registry)));

        let poster: Arc<dyn CommentPoster> = manager.clone();
        let relay = Arc::new(ChannelRelay::new(
            cli.relay_config(),
            channel,
            Arc::clone(&dispatcher),
            poster,
        ));
        relay.listeners().add_listener(|message| {
            println!("{}: {}", message.channel_author(), message.text);
        });
        let forwarder = Arc::clone(&relay);
        manager
            .chat_feed()
            .add_listener(move |message| forwarder.forward_chat(message));

        tracing::info!(operator = %manager.operator(), "castline ready");
        Ok(Self {
            manager,
            dispatcher,
            relay: relay.spawn(),
        })
    }

    async fn shutdown(self) {
        self.relay.shutdown().await;
        self.manager.shutdown().await;
    }
}

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    let runtime = CastlineRuntime::start(&cli).await?;
    let reply = CommandReply::new(|text| println!("{text}"));
    let result = run_console(BufReader::new(tokio::io::stdin()), &runtime.dispatcher, reply).await;
    runtime.shutdown().await;
    result
}
