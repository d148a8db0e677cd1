// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The host-side half of the router (§4.2). Purely a transport: it never
//! owns domain state, it only enforces the inbound dedup window, the
//! outbound debounce window, the `init`-before-anything-else ordering
//! invariant, and per-type message counting.

use tokio::sync::mpsc;

use cohost_proto::messages::{BackendStateSnapshot, InboundMessage, OutboundMessage, SessionSummary};

use crate::counters::Counters;
use crate::dedup::{InboundDedup, OutboundDebounce};
use crate::error::RouterError;

fn inbound_kind_name(msg: &InboundMessage) -> &'static str {
    match msg {
        InboundMessage::Ready => "ready",
        InboundMessage::UserMessageSend { .. } => "userMessageSend",
        InboundMessage::Abort => "abort",
        InboundMessage::SwitchSession { .. } => "switchSession",
        InboundMessage::NewSession => "newSession",
        InboundMessage::ViewPlan => "viewPlan",
        InboundMessage::ViewDiff { .. } => "viewDiff",
        InboundMessage::TogglePlanMode => "togglePlanMode",
        InboundMessage::AcceptPlan => "acceptPlan",
        InboundMessage::RejectPlan => "rejectPlan",
        InboundMessage::PickFiles => "pickFiles",
    }
}

fn outbound_kind_name(msg: &OutboundMessage) -> &'static str {
    match msg {
        OutboundMessage::Init { .. } => "init",
        OutboundMessage::UserEcho { .. } => "userEcho",
        OutboundMessage::AssistantMessage { .. } => "assistantMessage",
        OutboundMessage::ReasoningMessage { .. } => "reasoningMessage",
        OutboundMessage::ToolStart { .. } => "toolStart",
        OutboundMessage::ToolUpdate { .. } => "toolUpdate",
        OutboundMessage::StreamChunk { .. } => "streamChunk",
        OutboundMessage::StreamEnd => "streamEnd",
        OutboundMessage::Clear => "clear",
        OutboundMessage::SessionStatus { .. } => "sessionStatus",
        OutboundMessage::UpdateSessions { .. } => "updateSessions",
        OutboundMessage::Thinking { .. } => "thinking",
        OutboundMessage::ResetPlanMode => "resetPlanMode",
        OutboundMessage::WorkspacePath { .. } => "workspacePath",
        OutboundMessage::ActiveFileChanged { .. } => "activeFileChanged",
        OutboundMessage::DiffAvailable { .. } => "diffAvailable",
        OutboundMessage::AppendMessage { .. } => "appendMessage",
        OutboundMessage::AttachmentValidation { .. } => "attachmentValidation",
        OutboundMessage::Status { .. } => "status",
        OutboundMessage::UsageInfo { .. } => "usageInfo",
    }
}

/// Whether an `updateSessions` broadcast is worth sending at all. A
/// focus-only flip (the active session changed but nothing about
/// visibility or column layout did) is suppressed entirely rather than
/// merely debounced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionsChange {
    FocusOnly,
    VisibilityOrColumn,
}

/// The host-side peer. Receives inbound messages from the view, forwards
/// the ones that survive dedup to the caller, and gates/debounces/counts
/// outbound messages headed back to the view.
pub struct HostRouter {
    to_view: mpsc::Sender<OutboundMessage>,
    inbound: Counters,
    outbound: Counters,
    dedup: InboundDedup,
    debounce: OutboundDebounce,
    awaiting_init: bool,
}

impl HostRouter {
    pub fn new(to_view: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            to_view,
            inbound: Counters::new("inbound"),
            outbound: Counters::new("outbound"),
            dedup: InboundDedup::new(),
            debounce: OutboundDebounce::new(),
            awaiting_init: false,
        }
    }

    /// Accept one inbound message from the view. Returns `None` if it was
    /// swallowed (an inbound dedup hit) — otherwise the message to act on.
    ///
    /// A fresh `ready` re-arms `awaiting_init`, so a recreated view (e.g.
    /// after a reload) gets its `init` resent rather than being left
    /// stranded on stale state.
    pub fn handle_inbound(&mut self, msg: InboundMessage) -> Option<InboundMessage> {
        self.inbound.record(inbound_kind_name(&msg));
        match &msg {
            InboundMessage::Ready => {
                self.awaiting_init = true;
                Some(msg)
            }
            InboundMessage::UserMessageSend { text, .. } => {
                if self.dedup.admit(text) {
                    Some(msg)
                } else {
                    tracing::debug!(%text, "dropped duplicate userMessageSend within dedup window");
                    None
                }
            }
            _ => Some(msg),
        }
    }

    /// Send the atomic `init` snapshot. Must be the first outbound message
    /// after a `ready`; clears `awaiting_init` on success.
    pub async fn send_init(&mut self, state: BackendStateSnapshot) -> Result<(), RouterError> {
        self.send_raw(OutboundMessage::Init { state }).await?;
        self.awaiting_init = false;
        Ok(())
    }

    /// Send any outbound payload other than `init`. Rejected with
    /// [`RouterError::InitNotYetSent`] if `init` hasn't gone out yet for the
    /// current `ready`.
    pub async fn send(&mut self, msg: OutboundMessage) -> Result<(), RouterError> {
        if self.awaiting_init {
            return Err(RouterError::InitNotYetSent {
                attempted: outbound_kind_name(&msg),
            });
        }
        self.send_raw(msg).await
    }

    /// Send an `updateSessions` broadcast, subject to suppression of
    /// focus-only changes and the debounce window otherwise.
    pub async fn send_update_sessions(
        &mut self,
        sessions: Vec<SessionSummary>,
        change: SessionsChange,
    ) -> Result<(), RouterError> {
        if change == SessionsChange::FocusOnly {
            return Ok(());
        }
        if !self.debounce.admit() {
            return Ok(());
        }
        self.send(OutboundMessage::UpdateSessions { sessions }).await
    }

    async fn send_raw(&mut self, msg: OutboundMessage) -> Result<(), RouterError> {
        self.outbound.record(outbound_kind_name(&msg));
        self.to_view.send(msg).await.map_err(|_| RouterError::Closed)
    }

    pub fn inbound_total(&self) -> u64 {
        self.inbound.total()
    }

    pub fn outbound_total(&self) -> u64 {
        self.outbound.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohost_proto::messages::Attachment;

    fn channel() -> (HostRouter, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(16);
        (HostRouter::new(tx), rx)
    }

    #[tokio::test]
    async fn rejects_payload_before_init_is_sent() {
        let (mut router, _rx) = channel();
        router.handle_inbound(InboundMessage::Ready);
        let err = router
            .send(OutboundMessage::Clear)
            .await
            .expect_err("should reject before init");
        assert!(matches!(err, RouterError::InitNotYetSent { attempted: "clear" }));
    }

    #[tokio::test]
    async fn init_unlocks_subsequent_sends() {
        let (mut router, mut rx) = channel();
        router.handle_inbound(InboundMessage::Ready);
        router.send_init(BackendStateSnapshot::default()).await.unwrap();
        router.send(OutboundMessage::Clear).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, OutboundMessage::Init { .. }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, OutboundMessage::Clear));
    }

    #[tokio::test]
    async fn a_fresh_ready_rearms_init_gating() {
        let (mut router, _rx) = channel();
        router.handle_inbound(InboundMessage::Ready);
        router.send_init(BackendStateSnapshot::default()).await.unwrap();

        router.handle_inbound(InboundMessage::Ready);
        let err = router.send(OutboundMessage::Clear).await;
        assert!(err.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_user_message_within_window_is_dropped() {
        let (mut router, _rx) = channel();
        let msg = InboundMessage::UserMessageSend {
            text: "hello".to_string(),
            attachments: Vec::<Attachment>::new(),
        };
        assert!(router.handle_inbound(msg.clone()).is_some());
        assert!(router.handle_inbound(msg).is_none());
    }

    #[tokio::test]
    async fn focus_only_session_change_is_suppressed_entirely() {
        let (mut router, _rx) = channel();
        router.handle_inbound(InboundMessage::Ready);
        router.send_init(BackendStateSnapshot::default()).await.unwrap();
        router
            .send_update_sessions(Vec::new(), SessionsChange::FocusOnly)
            .await
            .unwrap();
        assert_eq!(router.outbound_total(), 1); // only the init
    }

    #[tokio::test]
    async fn closed_view_channel_surfaces_as_router_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut router = HostRouter::new(tx);
        router.handle_inbound(InboundMessage::Ready);
        let err = router.send_init(BackendStateSnapshot::default()).await;
        assert!(matches!(err, Err(RouterError::Closed)));
    }
}
