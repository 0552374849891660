//! Tests for session lifecycle, the session handle, and comment posting.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use castline_channel::CommentPoster;
use castline_chat::{ChatComment, ChatSourceState, CommentBatch};
use castline_core::ChatMessage;

use super::{SessionManager, SessionManagerConfig};
use crate::live_session::{SessionError, SessionStateError, SessionStatus};
use crate::platform_client::CreateBroadcastRequest;
use crate::test_support::{transports, FakePlatform, FakePush};

fn manager(platform: &Arc<FakePlatform>, push: &Arc<FakePush>) -> SessionManager {
    SessionManager::new(
        SessionManagerConfig {
            operator: "streamer".to_string(),
            create_request: CreateBroadcastRequest::default(),
        },
        Arc::clone(platform) as Arc<dyn crate::platform_client::PlatformClient>,
        transports(push),
    )
}

#[tokio::test]
async fn functional_owned_session_lifecycle_follows_platform_order() {
    let platform = Arc::new(FakePlatform::default());
    let push = Arc::new(FakePush::default());
    let manager = manager(&platform, &push);

    let session = manager.create_session().await.expect("create");
    assert_eq!(session.status(), SessionStatus::Created);
    assert!(session.is_owned());
    assert_eq!(session.rtmp_info().url, "rtmps://upload.test:443/rtmp/");
    assert_eq!(session.rtmp_info().key, "b-1?s=abc");
    assert_eq!(session.dash_playback_url(), "https://cdn.test/b-1.mpd");
    assert_eq!(session.chat().state(), ChatSourceState::Idle);

    session.start().await.expect("start");
    assert_eq!(session.status(), SessionStatus::Ongoing);
    assert_eq!(session.media_id().as_deref(), Some("m-1"));
    assert_eq!(session.chat().state(), ChatSourceState::ActivePush);

    session.stop(true).await.expect("stop");
    assert_eq!(session.status(), SessionStatus::Stopped);
    assert_eq!(session.chat().state(), ChatSourceState::Stopped);
    assert_eq!(push.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(
        platform.calls(),
        vec!["create:720x1280", "info:b-1", "start:b-1", "end:b-1", "post_live:b-1"]
    );
}

#[tokio::test]
async fn regression_second_session_rejected_while_first_is_active() {
    let platform = Arc::new(FakePlatform::default());
    let push = Arc::new(FakePush::default());
    let manager = manager(&platform, &push);

    manager.create_session().await.expect("create");
    let error = manager.view_session("other").await.expect_err("active");

    assert_eq!(
        error,
        SessionError::State(SessionStateError::AlreadyActive {
            status: SessionStatus::Created
        })
    );
    assert_eq!(platform.calls(), vec!["create:720x1280", "info:b-1"]);
}

#[tokio::test]
async fn regression_start_and_stop_reject_wrong_status() {
    let platform = Arc::new(FakePlatform::default());
    let push = Arc::new(FakePush::default());
    let manager = manager(&platform, &push);
    let session = manager.create_session().await.expect("create");

    session.stop(false).await.expect("stop from created");
    assert_eq!(
        session.start().await,
        Err(SessionError::State(SessionStateError::InvalidStatus {
            operation: "start",
            status: SessionStatus::Stopped
        }))
    );
    assert_eq!(
        session.stop(false).await,
        Err(SessionError::State(SessionStateError::InvalidStatus {
            operation: "stop",
            status: SessionStatus::Stopped
        }))
    );
}

#[tokio::test]
async fn functional_viewed_session_streams_chat_into_manager_feed() {
    let platform = Arc::new(FakePlatform::default());
    let push = Arc::new(FakePush::default());
    let manager = manager(&platform, &push);
    let mut feed = manager.chat_feed().subscribe();

    let session = manager.view_session("b-9").await.expect("view");
    assert!(!session.is_owned());
    assert_eq!(session.status(), SessionStatus::Ongoing);
    assert_eq!(session.rtmp_info().url, "rtmp://play.test/b-9");
    assert_eq!(push.connects.load(Ordering::SeqCst), 1);

    push.sender()
        .send(CommentBatch {
            comments: vec![ChatComment::new("alice", "hello", 1)],
            system_comments: Vec::new(),
        })
        .await
        .expect("send");
    let message = tokio::time::timeout(Duration::from_secs(2), feed.recv())
        .await
        .expect("message before timeout")
        .expect("open");
    assert_eq!(message, ChatMessage::comment("alice", "hello"));

    assert_eq!(
        session.stop(false).await,
        Err(SessionError::State(SessionStateError::NotOwner { operation: "stop" }))
    );
    session.leave().await.expect("leave");
    assert!(!manager.handle().stream_commands_enabled());
    manager.create_session().await.expect("create after leaving");
}

#[tokio::test]
async fn unit_stream_commands_enabled_tracks_current_session() {
    let platform = Arc::new(FakePlatform::default());
    let push = Arc::new(FakePush::default());
    let manager = manager(&platform, &push);
    let handle = manager.handle();

    assert!(!handle.stream_commands_enabled());
    let session = manager.create_session().await.expect("create");
    assert!(handle.stream_commands_enabled());
    session.stop(false).await.expect("stop");
    assert!(!handle.stream_commands_enabled());
}

#[tokio::test]
async fn functional_comment_poster_targets_current_session() {
    let platform = Arc::new(FakePlatform::default());
    let push = Arc::new(FakePush::default());
    let manager = manager(&platform, &push);

    let error = manager.post_comment("too early").await.expect_err("no session");
    assert_eq!(error.to_string(), "no session is open");

    manager.create_session().await.expect("create");
    manager.post_comment("hi chat").await.expect("post");
    assert_eq!(
        *platform.comments.lock().expect("comments"),
        vec![("b-1".to_string(), "hi chat".to_string())]
    );
}

#[tokio::test]
async fn regression_failed_view_leaves_no_session() {
    let platform = Arc::new(FakePlatform::default());
    let push = Arc::new(FakePush::default());
    let manager = manager(&platform, &push);

    let error = manager.view_session("missing").await.expect_err("missing");
    assert!(matches!(error, SessionError::Platform(_)));
    assert!(manager.current().is_none());
    assert_eq!(push.connects.load(Ordering::SeqCst), 0);
}
