use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use castline_channel::{
    Channel, ChannelMessage, ChannelRelay, ChannelRelayConfig, CommentPoster, LocalChannel,
    RelayHandle,
};
use castline_chat::{
    ChatComment, ChatTransportError, CommentBatch, PollTransport, PushDeliveries, PushTopic,
    PushTransport,
};
use castline_commands::{CommandDispatcher, CommandReply};
use castline_session::{
    build_command_registry, BroadcastInfo, ChatTransports, CommandSettings,
    CreateBroadcastRequest, CreatedBroadcast, DesktopActions, LiveBroadcastSummary,
    PlatformClient, PlatformError, SessionManager, SessionManagerConfig, StartedBroadcast,
};
use tokio::sync::mpsc;

const OPERATOR: &str = "streamer";

#[derive(Default)]
struct InMemoryPlatform {
    calls: Mutex<Vec<String>>,
    comments: Mutex<Vec<(String, String)>>,
    live: Vec<LiveBroadcastSummary>,
}

impl InMemoryPlatform {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }

    fn comments(&self) -> Vec<(String, String)> {
        self.comments.lock().expect("comments").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls").push(call);
    }
}

#[async_trait]
impl PlatformClient for InMemoryPlatform {
    async fn create_broadcast(
        &self,
        _request: &CreateBroadcastRequest,
    ) -> Result<CreatedBroadcast, PlatformError> {
        self.record("create".to_string());
        Ok(CreatedBroadcast {
            broadcast_id: "b-1".to_string(),
            upload_url: "rtmps://upload.test:443/rtmp/b-1?s=key".to_string(),
        })
    }

    async fn broadcast_info(&self, broadcast_id: &str) -> Result<BroadcastInfo, PlatformError> {
        self.record(format!("info:{broadcast_id}"));
        Ok(BroadcastInfo {
            broadcast_id: broadcast_id.to_string(),
            dash_playback_url: format!("https://cdn.test/{broadcast_id}.mpd"),
            rtmp_playback_url: String::new(),
            viewer_count: 0,
        })
    }

    async fn start_broadcast(&self, broadcast_id: &str) -> Result<StartedBroadcast, PlatformError> {
        self.record(format!("start:{broadcast_id}"));
        Ok(StartedBroadcast {
            media_id: "m-1".to_string(),
        })
    }

    async fn end_broadcast(&self, broadcast_id: &str) -> Result<(), PlatformError> {
        self.record(format!("end:{broadcast_id}"));
        Ok(())
    }

    async fn add_to_post_live(&self, broadcast_id: &str) -> Result<(), PlatformError> {
        self.record(format!("post_live:{broadcast_id}"));
        Ok(())
    }

    async fn post_comment(&self, broadcast_id: &str, text: &str) -> Result<(), PlatformError> {
        self.comments
            .lock()
            .expect("comments")
            .push((broadcast_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn list_live_broadcasts(&self) -> Result<Vec<LiveBroadcastSummary>, PlatformError> {
        Ok(self.live.clone())
    }

    async fn find_user_broadcast(
        &self,
        username: &str,
    ) -> Result<Option<LiveBroadcastSummary>, PlatformError> {
        Ok(self
            .live
            .iter()
            .find(|broadcast| broadcast.owner_username == username)
            .cloned())
    }
}

#[derive(Default)]
struct ControlledPush {
    refuse: bool,
    connects: AtomicUsize,
    sender: Mutex<Option<mpsc::Sender<CommentBatch>>>,
}

impl ControlledPush {
    fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    fn sender(&self) -> mpsc::Sender<CommentBatch> {
        self.sender
            .lock()
            .expect("sender")
            .clone()
            .expect("push connected")
    }
}

#[async_trait]
impl PushTransport for ControlledPush {
    async fn connect(&self, _topics: &[PushTopic]) -> Result<PushDeliveries, ChatTransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(ChatTransportError::Connect("realtime service down".to_string()));
        }
        let (tx, rx) = mpsc::channel(8);
        *self.sender.lock().expect("sender") = Some(tx);
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<(), ChatTransportError> {
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedPoll {
    script: Mutex<VecDeque<CommentBatch>>,
    since_values: Mutex<Vec<u64>>,
}

impl ScriptedPoll {
    fn new(script: Vec<CommentBatch>) -> Self {
        Self {
            script: Mutex::new(VecDeque::from(script)),
            since_values: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PollTransport for ScriptedPoll {
    async fn fetch_comments(
        &self,
        _broadcast_id: &str,
        since_timestamp: u64,
    ) -> Result<CommentBatch, ChatTransportError> {
        self.since_values
            .lock()
            .expect("since")
            .push(since_timestamp);
        Ok(self
            .script
            .lock()
            .expect("script")
            .pop_front()
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct RecordingDesktop {
    clipboard: Mutex<Vec<String>>,
}

#[async_trait]
impl DesktopActions for RecordingDesktop {
    async fn copy_to_clipboard(&self, text: &str) -> anyhow::Result<()> {
        self.clipboard
            .lock()
            .expect("clipboard")
            .push(text.to_string());
        Ok(())
    }

    async fn open_in_vlc(&self, _url: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

struct Harness {
    platform: Arc<InMemoryPlatform>,
    desktop: Arc<RecordingDesktop>,
    channel: Arc<LocalChannel>,
    dispatcher: Arc<CommandDispatcher>,
    outbound: Arc<Mutex<Vec<ChannelMessage>>>,
    relay: RelayHandle,
}

impl Harness {
    fn new(
        platform: InMemoryPlatform,
        push: Arc<dyn PushTransport>,
        poll: Arc<dyn PollTransport>,
    ) -> Self {
        let platform = Arc::new(platform);
        let transports = ChatTransports::new(push, poll).with_poll_interval(Duration::from_millis(10));
        let manager = Arc::new(SessionManager::new(
            SessionManagerConfig {
                operator: OPERATOR.to_string(),
                create_request: CreateBroadcastRequest::default(),
            },
            Arc::clone(&platform) as Arc<dyn PlatformClient>,
            transports,
        ));
        let desktop = Arc::new(RecordingDesktop::default());
        let registry = build_command_registry(
            Arc::clone(&manager),
            Arc::clone(&desktop) as Arc<dyn DesktopActions>,
            CommandSettings {
                channel_join_hint: "Join #live on 127.0.0.1:6667".to_string(),
            },
        )
        .expect("registry");
        let dispatcher = Arc::new(CommandDispatcher::new(Arc::new(registry)));

        let channel = Arc::new(LocalChannel::new("live"));
        let outbound = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outbound);
        channel.outbound().add_listener(move |message: &ChannelMessage| {
            sink.lock().expect("outbound").push(message.clone());
        });

        let relay = Arc::new(ChannelRelay::new(
            ChannelRelayConfig {
                operator: Some(OPERATOR.to_string()),
                ..ChannelRelayConfig::default()
            },
            Arc::clone(&channel) as Arc<dyn Channel>,
            Arc::clone(&dispatcher),
            Arc::clone(&manager) as Arc<dyn CommentPoster>,
        ));
        let forwarder = Arc::clone(&relay);
        manager
            .chat_feed()
            .add_listener(move |message| forwarder.forward_chat(message));

        Self {
            platform,
            desktop,
            channel,
            dispatcher,
            outbound,
            relay: relay.spawn(),
        }
    }

    fn outbound_lines(&self) -> Vec<String> {
        self.outbound
            .lock()
            .expect("outbound")
            .iter()
            .map(|message| format!("{}: {}", message.author, message.text))
            .collect()
    }

    fn say(&self, text: &str) {
        self.channel.inject(OPERATOR, text);
    }

    async fn wait_for_line(&self, expected: &str) {
        wait_until(|| self.outbound_lines().iter().any(|line| line == expected)).await;
    }
}

async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within two seconds");
}

fn comment(user: &str, text: &str, timestamp: u64) -> ChatComment {
    ChatComment::new(user, text, timestamp)
}

#[tokio::test]
async fn integration_channel_operator_drives_full_broadcast_lifecycle() {
    let push = Arc::new(ControlledPush::default());
    let harness = Harness::new(
        InMemoryPlatform::default(),
        Arc::clone(&push) as Arc<dyn PushTransport>,
        Arc::new(ScriptedPoll::default()),
    );

    harness.say(".url");
    harness.wait_for_line("system: Command not found.").await;

    harness.say(".create");
    wait_until(|| harness.platform.calls().contains(&"info:b-1".to_string())).await;
    harness.say(".key");
    harness.wait_for_line("system: Copied to clipboard!").await;
    assert_eq!(
        *harness.desktop.clipboard.lock().expect("clipboard"),
        vec!["b-1?s=key".to_string()]
    );

    harness.say(".start");
    harness.wait_for_line("system: Started stream!").await;
    assert_eq!(push.connects.load(Ordering::SeqCst), 1);

    push.sender()
        .send(CommentBatch {
            comments: vec![comment("alice", "hi there", 10), comment(OPERATOR, "echo", 11)],
            system_comments: vec![comment("platform", "bob joined", 12)],
        })
        .await
        .expect("push batch");
    harness.wait_for_line("system: bob joined").await;
    let lines = harness.outbound_lines();
    assert!(lines.contains(&"alice: hi there".to_string()));
    assert!(!lines.iter().any(|line| line.ends_with("echo")));

    harness.say("thanks for watching");
    wait_until(|| !harness.platform.comments().is_empty()).await;
    assert_eq!(
        harness.platform.comments(),
        vec![("b-1".to_string(), "thanks for watching".to_string())]
    );

    harness.say(".stop -highlight");
    harness.wait_for_line("system: Stopped stream!").await;
    assert_eq!(
        harness.platform.calls(),
        vec![
            "create".to_string(),
            "info:b-1".to_string(),
            "start:b-1".to_string(),
            "end:b-1".to_string(),
            "post_live:b-1".to_string(),
        ]
    );

    let before = harness
        .outbound_lines()
        .iter()
        .filter(|line| *line == "system: Command not found.")
        .count();
    harness.say(".stop");
    wait_until(|| {
        harness
            .outbound_lines()
            .iter()
            .filter(|line| *line == "system: Command not found.")
            .count()
            > before
    })
    .await;

    harness.relay.shutdown().await;
}

#[tokio::test]
async fn integration_viewing_falls_back_to_polling_without_duplicates() {
    let push = Arc::new(ControlledPush::refusing());
    let poll = Arc::new(ScriptedPoll::new(vec![
        CommentBatch {
            comments: vec![comment("alice", "first", 1), comment("bob", "second", 2)],
            system_comments: Vec::new(),
        },
        CommentBatch {
            comments: vec![comment("bob", "second", 2), comment("carol", "third", 3)],
            system_comments: Vec::new(),
        },
    ]));
    let harness = Harness::new(
        InMemoryPlatform {
            live: vec![LiveBroadcastSummary {
                broadcast_id: "b-7".to_string(),
                owner_username: "alice".to_string(),
                viewer_count: 4,
            }],
            ..InMemoryPlatform::default()
        },
        Arc::clone(&push) as Arc<dyn PushTransport>,
        Arc::clone(&poll) as Arc<dyn PollTransport>,
    );

    let replies = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&replies);
    let outcome = harness
        .dispatcher
        .dispatch(
            "view alice",
            CommandReply::new(move |text| sink.lock().expect("replies").push(text)),
        )
        .await;
    assert!(outcome.is_executed());

    harness.wait_for_line("carol: third").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let chat = harness
        .outbound_lines()
        .into_iter()
        .filter(|line| !line.starts_with("system: "))
        .collect::<Vec<_>>();
    assert_eq!(
        chat,
        vec![
            "alice: first".to_string(),
            "bob: second".to_string(),
            "carol: third".to_string(),
        ]
    );
    assert_eq!(push.connects.load(Ordering::SeqCst), 1);
    let since = poll.since_values.lock().expect("since").clone();
    assert_eq!(&since[..2], &[0, 2]);
    assert!(since[2..].iter().all(|value| *value == 3));

    harness.dispatcher.dispatch("stop", CommandReply::new(|_| {})).await;
    harness.relay.shutdown().await;
}
