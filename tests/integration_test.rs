// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! End-to-end tests wiring `cohost-session` and `cohost-rpc` together:
//! the session start/send-message round trip and `init`'s atomicity/ordering.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use cohost_config::Config;
use cohost_proto::messages::{
    Attachment, BackendStateSnapshot, InboundMessage, OutboundMessage, SessionSummary,
};
use cohost_proto::{ChatMessage, SessionMode};
use cohost_rpc::{HostRouter, SessionsChange};
use cohost_session::SessionManager;
use tokio::sync::mpsc;

/// Writes a POSIX shell stand-in for the agent CLI: reads one JSON-RPC line
/// at a time from stdin, matches on a substring of the method, and prints
/// back canned `AgentEvent` lines. Mirrors the fake-agent fixtures already
/// used by `cohost-session::manager`'s own unit tests.
fn write_fake_agent(dir: &Path) -> PathBuf {
    let path = dir.join("fake-agent.sh");
    let script = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    *'"method":"create_session"'*)
      echo '{"type":"session.start","session_id":"e2e-session-1"}'
      ;;
    *'"method":"send_and_wait"'*)
      echo '{"type":"assistant.message","content":"done","tool_requests":[]}'
      echo '{"type":"assistant.turn_end"}'
      ;;
    *)
      ;;
  esac
done
"#;
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(script.as_bytes()).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[tokio::test]
async fn session_manager_start_and_send_message_round_trip() {
    let agent_dir = tempfile::tempdir().unwrap();
    let agent_path = write_fake_agent(agent_dir.path());
    let workspace = tempfile::tempdir().unwrap();
    let snapshot_dir = tempfile::tempdir().unwrap();

    let config = Config {
        cli_path: Some(agent_path.display().to_string()),
        resume_last_session: false,
        ..Config::default()
    };

    let mut manager =
        SessionManager::new(config, workspace.path().to_path_buf(), snapshot_dir.path().to_path_buf())
            .unwrap();

    let mut output_sub = manager.streams().output.subscribe();

    let session_id = manager.start(None).await.unwrap();
    assert_eq!(session_id, "e2e-session-1");
    assert_eq!(manager.active_session_id(), Some("e2e-session-1"));
    assert_eq!(manager.mode(), SessionMode::Work);

    manager.send_message("implement the thing", None).await.unwrap();

    let reply = output_sub.recv().await.unwrap();
    assert_eq!(reply.content, "done");

    manager.stop().await.unwrap();
}

/// §8 scenario 6: exactly one `init` is sent per `ready`, carrying the full
/// BackendState, and nothing else crosses the wire first.
#[tokio::test]
async fn init_is_atomic_and_precedes_all_other_outbound_traffic() {
    let (to_view, mut from_host) = mpsc::channel::<OutboundMessage>(16);
    let mut router = HostRouter::new(to_view);

    let ready = router.handle_inbound(InboundMessage::Ready);
    assert!(matches!(ready, Some(InboundMessage::Ready)));

    let snapshot = BackendStateSnapshot {
        current_session_id: Some("s1".into()),
        session_active: true,
        messages: vec![
            ChatMessage::user("hi", 0),
            ChatMessage::assistant("hello", 1),
            ChatMessage::user("how are you", 2),
        ],
        plan_mode: false,
        workspace_path: "/workspace".into(),
        active_file_path: None,
        session_start_timestamp: Some(0),
    };
    router.send_init(snapshot).await.unwrap();
    router
        .send(OutboundMessage::Status {
            message: "ready".into(),
            level: cohost_proto::messages::StatusLevel::Info,
        })
        .await
        .unwrap();

    let first = from_host.recv().await.unwrap();
    match first {
        OutboundMessage::Init { state } => assert_eq!(state.messages.len(), 3),
        other => panic!("expected init first, got {other:?}"),
    }
    let second = from_host.recv().await.unwrap();
    assert!(matches!(second, OutboundMessage::Status { .. }));
}

/// A payload attempted before `init` has gone out for the current `ready`
/// is rejected, not silently queued or dropped.
#[tokio::test]
async fn payload_before_init_is_rejected() {
    let (to_view, _from_host) = mpsc::channel::<OutboundMessage>(16);
    let mut router = HostRouter::new(to_view);
    router.handle_inbound(InboundMessage::Ready);

    let err = router.send(OutboundMessage::StreamEnd).await;
    assert!(err.is_err());
}

/// A duplicate `userMessageSend` dispatched twice back-to-back collapses to
/// one admitted message; a focus-only sessions-change is suppressed
/// entirely rather than merely debounced.
#[tokio::test]
async fn dedup_and_focus_only_suppression_compose() {
    let (to_view, mut from_host) = mpsc::channel::<OutboundMessage>(16);
    let mut router = HostRouter::new(to_view);
    router.handle_inbound(InboundMessage::Ready);
    router.send_init(BackendStateSnapshot::default()).await.unwrap();

    let send = InboundMessage::UserMessageSend {
        text: "hello".into(),
        attachments: Vec::<Attachment>::new(),
    };
    assert!(router.handle_inbound(send.clone()).is_some());
    assert!(router.handle_inbound(send).is_none());

    router
        .send_update_sessions(
            vec![SessionSummary {
                id: "s1".into(),
                mode: SessionMode::Work,
                active: true,
            }],
            SessionsChange::FocusOnly,
        )
        .await
        .unwrap();

    // Only the init went out; the focus-only update never did.
    let first = from_host.recv().await.unwrap();
    assert!(matches!(first, OutboundMessage::Init { .. }));
    assert!(from_host.try_recv().is_err());
}
