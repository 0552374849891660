//! In-memory platform, chat, and desktop doubles shared by session tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use castline_chat::{
    ChatTransportError, CommentBatch, PollTransport, PushDeliveries, PushTopic, PushTransport,
};
use tokio::sync::mpsc;

use crate::desktop_actions::DesktopActions;
use crate::live_session::ChatTransports;
use crate::platform_client::{
    BroadcastInfo, CreateBroadcastRequest, CreatedBroadcast, LiveBroadcastSummary,
    PlatformClient, PlatformError, StartedBroadcast,
};

pub(crate) const CREATED_BROADCAST_ID: &str = "b-1";

#[derive(Default)]
pub(crate) struct FakePlatform {
    pub calls: Mutex<Vec<String>>,
    pub comments: Mutex<Vec<(String, String)>>,
    pub live: Mutex<Vec<LiveBroadcastSummary>>,
}

impl FakePlatform {
    pub fn with_live(live: Vec<LiveBroadcastSummary>) -> Self {
        Self {
            live: Mutex::new(live),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls").push(call);
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    async fn create_broadcast(
        &self,
        request: &CreateBroadcastRequest,
    ) -> Result<CreatedBroadcast, PlatformError> {
        self.record(format!(
            "create:{}x{}",
            request.preview_width, request.preview_height
        ));
        Ok(CreatedBroadcast {
            broadcast_id: CREATED_BROADCAST_ID.to_string(),
            upload_url: format!("rtmps://upload.test:443/rtmp/{CREATED_BROADCAST_ID}?s=abc"),
        })
    }

    async fn broadcast_info(&self, broadcast_id: &str) -> Result<BroadcastInfo, PlatformError> {
        self.record(format!("info:{broadcast_id}"));
        if broadcast_id == "missing" {
            return Err(PlatformError::Status {
                operation: "broadcast_info",
                status: 404,
                body: "not found".to_string(),
            });
        }
        Ok(BroadcastInfo {
            broadcast_id: broadcast_id.to_string(),
            dash_playback_url: format!("https://cdn.test/{broadcast_id}.mpd"),
            rtmp_playback_url: format!("rtmp://play.test/{broadcast_id}"),
            viewer_count: 3,
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
        Ok(self.live.lock().expect("live").clone())
    }

    async fn find_user_broadcast(
        &self,
        username: &str,
    ) -> Result<Option<LiveBroadcastSummary>, PlatformError> {
        Ok(self
            .live
            .lock()
            .expect("live")
            .iter()
            .find(|broadcast| broadcast.owner_username == username)
            .cloned())
    }
}

#[derive(Default)]
pub(crate) struct FakePush {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub sender: Mutex<Option<mpsc::Sender<CommentBatch>>>,
}

impl FakePush {
    pub fn sender(&self) -> mpsc::Sender<CommentBatch> {
        self.sender
            .lock()
            .expect("sender")
            .clone()
            .expect("push connected")
    }
}

#[async_trait]
impl PushTransport for FakePush {
    async fn connect(&self, _topics: &[PushTopic]) -> Result<PushDeliveries, ChatTransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(8);
        *self.sender.lock().expect("sender") = Some(tx);
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<(), ChatTransportError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct EmptyPoll;

#[async_trait]
impl PollTransport for EmptyPoll {
    async fn fetch_comments(
        &self,
        _broadcast_id: &str,
        _since_timestamp: u64,
    ) -> Result<CommentBatch, ChatTransportError> {
        Ok(CommentBatch::default())
    }
}

pub(crate) fn transports(push: &Arc<FakePush>) -> ChatTransports {
    ChatTransports::new(Arc::clone(push) as Arc<dyn PushTransport>, Arc::new(EmptyPoll))
        .with_poll_interval(Duration::from_millis(10))
}

#[derive(Default)]
pub(crate) struct FakeDesktop {
    pub clipboard: Mutex<Vec<String>>,
    pub opened: Mutex<Vec<String>>,
}

#[async_trait]
impl DesktopActions for FakeDesktop {
    async fn copy_to_clipboard(&self, text: &str) -> anyhow::Result<()> {
        self.clipboard.lock().expect("clipboard").push(text.to_string());
        Ok(())
    }

    async fn open_in_vlc(&self, url: &str) -> anyhow::Result<()> {
        self.opened.lock().expect("opened").push(url.to_string());
        Ok(())
    }
}
