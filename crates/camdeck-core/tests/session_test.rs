#![allow(clippy::unwrap_used)]
// Lifecycle tests for `StreamSession` against an in-memory connector.

mod common;

use tokio::sync::broadcast::error::TryRecvError;

use camdeck_core::{
    CloseKind, CoreError, SessionState, SessionStatus, StreamEvent, StreamSession,
};

use common::{FakeConnector, settle, wait_frame_seq, wait_state};

fn session() -> StreamSession<FakeConnector> {
    StreamSession::new(FakeConnector::default())
}

// ── Open / close ────────────────────────────────────────────────────

#[tokio::test]
async fn test_open_transitions_through_connecting() {
    let session = session();
    let mut status = session.subscribe_status();
    assert_eq!(session.state(), SessionState::Idle);

    session.open("C1").await.unwrap();

    assert_eq!(session.state(), SessionState::Open);
    assert_eq!(session.snapshot().serial.as_deref(), Some("C1"));
    assert_eq!(
        status.try_recv().unwrap(),
        SessionStatus::Connecting { serial: "C1".into() }
    );
    assert_eq!(
        status.try_recv().unwrap(),
        SessionStatus::Opened { serial: "C1".into() }
    );
}

#[tokio::test]
async fn test_open_while_open_is_rejected() {
    let session = session();
    session.open("C1").await.unwrap();

    let result = session.open("C2").await;
    assert!(
        matches!(result, Err(CoreError::SessionBusy { ref serial }) if serial == "C1"),
        "got: {result:?}"
    );
    assert_eq!(session.snapshot().serial.as_deref(), Some("C1"));
    assert_eq!(session.connector().links().len(), 1);
}

#[tokio::test]
async fn test_close_is_idempotent_with_single_notification() {
    let session = session();
    session.open("C1").await.unwrap();
    let mut status = session.subscribe_status();

    session.close().await;
    let first = session.snapshot();
    session.close().await;

    assert_eq!(session.snapshot(), first);
    assert_eq!(first.state, SessionState::Closed);
    assert_eq!(first.last_close, Some(CloseKind::Clean));
    assert_eq!(
        status.try_recv().unwrap(),
        SessionStatus::Closed {
            serial: "C1".into(),
            kind: CloseKind::Clean
        }
    );
    assert!(matches!(status.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_close_releases_connection() {
    let session = session();
    session.open("C1").await.unwrap();
    let link = session.connector().last_link();
    assert!(!link.is_released());

    session.close().await;
    assert!(link.is_released());
}

#[tokio::test]
async fn test_close_from_idle_is_silent() {
    let session = session();
    let mut status = session.subscribe_status();

    session.close().await;

    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.snapshot().last_close.is_none());
    assert!(matches!(status.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_reopen_after_close() {
    let session = session();
    session.open("C1").await.unwrap();
    session.close().await;
    session.open("C2").await.unwrap();

    assert_eq!(session.state(), SessionState::Open);
    assert_eq!(session.snapshot().serial.as_deref(), Some("C2"));
    assert!(session.snapshot().last_close.is_none());
}

#[tokio::test]
async fn test_close_while_connecting_discards_late_handshake() {
    let session = session();
    let gate = session.connector().hold();

    let opener = {
        let session = session.clone();
        tokio::spawn(async move { session.open("C1").await })
    };
    wait_state(&session, SessionState::Connecting).await;

    session.close().await;
    gate.notify_one();
    opener.await.unwrap().unwrap();

    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.snapshot().last_close, Some(CloseKind::Clean));
    let link = session.connector().last_link();
    assert!(link.is_released(), "late connection must be released");

    link.send_image("AAA");
    settle().await;
    assert!(session.latest_frame().is_none());
}

#[tokio::test]
async fn test_handshake_failure_is_unexpected_close() {
    let session = session();
    session.connector().fail_next("connection refused");
    let mut status = session.subscribe_status();

    let result = session.open("C1").await;

    assert!(matches!(result, Err(CoreError::Stream { .. })), "got: {result:?}");
    let snap = session.snapshot();
    assert_eq!(snap.state, SessionState::Closed);
    assert_eq!(
        snap.last_close,
        Some(CloseKind::Unexpected {
            reason: "connection refused".into()
        })
    );
    assert!(matches!(status.try_recv().unwrap(), SessionStatus::Connecting { .. }));
    assert!(matches!(
        status.try_recv().unwrap(),
        SessionStatus::Closed {
            kind: CloseKind::Unexpected { .. },
            ..
        }
    ));
}

// ── Frames ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_frames_carry_payload_and_increasing_seq() {
    let session = session();
    session.open("C1").await.unwrap();
    let link = session.connector().last_link();

    link.send_image("AAA");
    wait_frame_seq(&session, 1).await;
    let first = session.latest_frame().unwrap();
    assert_eq!(first.image, "AAA");
    assert_eq!(first.serial, "C1");

    link.send_image("BBB");
    wait_frame_seq(&session, 2).await;
    let second = session.latest_frame().unwrap();
    assert_eq!(second.image, "BBB");
    assert!(second.seq > first.seq);
}

#[tokio::test]
async fn test_seq_keeps_increasing_across_reopen() {
    let session = session();
    session.open("C1").await.unwrap();
    session.connector().last_link().send_image("AAA");
    wait_frame_seq(&session, 1).await;
    let before = session.latest_frame().unwrap().seq;

    session.close().await;
    session.open("C1").await.unwrap();
    session.connector().last_link().send_image("BBB");
    wait_frame_seq(&session, before + 1).await;

    assert!(session.latest_frame().unwrap().seq > before);
}

#[tokio::test]
async fn test_malformed_messages_are_skipped() {
    let session = session();
    session.open("C1").await.unwrap();
    let link = session.connector().last_link();

    link.send_raw("not json");
    link.send_raw(r#"{"type":"status","detail":"warming up"}"#);
    link.send_image("CCC");
    wait_frame_seq(&session, 1).await;

    let frame = session.latest_frame().unwrap();
    assert_eq!(frame.image, "CCC");
    assert_eq!(frame.seq, 1);
    assert_eq!(session.state(), SessionState::Open);
}

#[tokio::test]
async fn test_close_clears_latest_frame() {
    let session = session();
    session.open("C1").await.unwrap();
    session.connector().last_link().send_image("AAA");
    wait_frame_seq(&session, 1).await;

    session.close().await;
    assert!(session.latest_frame().is_none());
}

#[tokio::test]
async fn test_frames_after_close_are_dropped() {
    let session = session();
    session.open("C1").await.unwrap();
    let link = session.connector().last_link();

    link.send_image("AAA");
    session.close().await;
    link.send_image("BBB");
    settle().await;

    assert!(session.latest_frame().is_none());
}

// ── Transport loss ──────────────────────────────────────────────────

#[tokio::test]
async fn test_server_close_is_unexpected_and_keeps_stale_frame() {
    let session = session();
    session.open("C1").await.unwrap();
    let link = session.connector().last_link();
    let mut status = session.subscribe_status();

    link.send_image("AAA");
    wait_frame_seq(&session, 1).await;
    link.tx
        .send(StreamEvent::Closed {
            code: Some(1011),
            reason: "camera disconnected".into(),
        })
        .unwrap();
    wait_state(&session, SessionState::Closed).await;

    let snap = session.snapshot();
    assert!(matches!(snap.last_close, Some(CloseKind::Unexpected { ref reason }) if reason.contains("1011")));
    assert!(matches!(
        status.try_recv().unwrap(),
        SessionStatus::Closed {
            kind: CloseKind::Unexpected { .. },
            ..
        }
    ));
    assert_eq!(session.latest_frame().unwrap().image, "AAA");
}

#[tokio::test]
async fn test_transport_failure_is_unexpected() {
    let session = session();
    session.open("C1").await.unwrap();
    session
        .connector()
        .last_link()
        .tx
        .send(StreamEvent::Failed("connection reset".into()))
        .unwrap();
    wait_state(&session, SessionState::Closed).await;

    assert_eq!(
        session.snapshot().last_close,
        Some(CloseKind::Unexpected {
            reason: "connection reset".into()
        })
    );

    // No automatic reconnect.
    settle().await;
    assert_eq!(session.connector().links().len(), 1);
}

#[tokio::test]
async fn test_close_after_loss_emits_nothing() {
    let session = session();
    session.open("C1").await.unwrap();
    session
        .connector()
        .last_link()
        .tx
        .send(StreamEvent::Failed("reset".into()))
        .unwrap();
    wait_state(&session, SessionState::Closed).await;
    let mut status = session.subscribe_status();

    session.close().await;

    assert!(matches!(status.try_recv(), Err(TryRecvError::Empty)));
    assert!(matches!(
        session.snapshot().last_close,
        Some(CloseKind::Unexpected { .. })
    ));
}
