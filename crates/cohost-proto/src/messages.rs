// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The host↔view wire schema (§4.2): 11 inbound (view→host) kinds, ~20
//! outbound (host→view) kinds, and the atomic `Init` snapshot payload.
//!
//! Modeled as two tagged sum types rather than a heterogeneous
//! string-keyed callback map (§9 "Dynamic type-guarded dispatch"): the
//! `HostRouter` in `cohost-rpc` is a `match` over these discriminants, one
//! arm per kind.

use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, SessionMode};

/// One line of a computed inline diff (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffLineKind {
    Context,
    Add,
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffLine {
    #[serde(rename = "type")]
    pub kind: DiffLineKind,
    pub text: String,
}

/// Result of [`crate::diff::compute_inline_diff`], carried verbatim in the
/// `diffAvailable` outbound payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineDiff {
    pub lines: Vec<DiffLine>,
    pub truncated: bool,
    pub total_lines: usize,
}

/// An attachment sent alongside a user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub path: String,
    pub kind: AttachmentKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    File,
}

/// The atomic BackendState snapshot sent in response to every `ready` (§3,
/// §5 "Init payload ordering"). The view is a pure projection of this value.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendStateSnapshot {
    pub current_session_id: Option<String>,
    pub session_active: bool,
    pub messages: Vec<ChatMessage>,
    pub plan_mode: bool,
    pub workspace_path: String,
    pub active_file_path: Option<String>,
    pub session_start_timestamp: Option<u64>,
}

/// view → host (11 kinds, §4.2 table).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundMessage {
    /// Must be the first inbound message after view mount; triggers `init`.
    Ready,
    UserMessageSend {
        text: String,
        attachments: Vec<Attachment>,
    },
    Abort,
    SwitchSession {
        session_id: String,
    },
    NewSession,
    ViewPlan,
    ViewDiff {
        tool_call_id: String,
    },
    TogglePlanMode,
    AcceptPlan,
    RejectPlan,
    PickFiles,
}

/// host → view (~20 kinds, §4.2 table).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Atomic snapshot of BackendState; sent exactly once per view `ready`.
    Init {
        state: BackendStateSnapshot,
    },
    UserEcho {
        message: ChatMessage,
    },
    AssistantMessage {
        message: ChatMessage,
    },
    ReasoningMessage {
        message: ChatMessage,
    },
    ToolStart {
        tool_call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
        intent: Option<String>,
    },
    ToolUpdate {
        tool_call_id: String,
        progress: Option<String>,
    },
    /// Monotonically appended text for the last assistant message.
    StreamChunk {
        delta: String,
    },
    StreamEnd,
    Clear,
    SessionStatus {
        status: String,
    },
    UpdateSessions {
        sessions: Vec<SessionSummary>,
    },
    Thinking {
        active: bool,
    },
    ResetPlanMode,
    WorkspacePath {
        path: String,
    },
    ActiveFileChanged {
        path: Option<String>,
    },
    /// Carries the tool-call ID, before/after URIs, and a pre-computed diff.
    DiffAvailable {
        tool_call_id: String,
        before_uri: String,
        after_uri: String,
        title: String,
        diff: InlineDiff,
    },
    AppendMessage {
        message: ChatMessage,
    },
    AttachmentValidation {
        accepted: Vec<String>,
        rejected: Vec<String>,
    },
    Status {
        message: String,
        level: StatusLevel,
    },
    UsageInfo {
        current_tokens: u64,
        limit_tokens: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub mode: SessionMode,
    pub active: bool,
}

/// Validate a raw `type` discriminant against the known inbound/outbound
/// sets before attempting to deserialize the full payload. Unknown types are
/// logged and dropped by the router rather than propagated as an error — a
/// future view/host version may introduce a kind the other side predates.
pub fn is_known_inbound_type(type_tag: &str) -> bool {
    const KNOWN: &[&str] = &[
        "ready",
        "userMessageSend",
        "abort",
        "switchSession",
        "newSession",
        "viewPlan",
        "viewDiff",
        "togglePlanMode",
        "acceptPlan",
        "rejectPlan",
        "pickFiles",
    ];
    KNOWN.contains(&type_tag)
}

pub fn is_known_outbound_type(type_tag: &str) -> bool {
    const KNOWN: &[&str] = &[
        "init",
        "userEcho",
        "assistantMessage",
        "reasoningMessage",
        "toolStart",
        "toolUpdate",
        "streamChunk",
        "streamEnd",
        "clear",
        "sessionStatus",
        "updateSessions",
        "thinking",
        "resetPlanMode",
        "workspacePath",
        "activeFileChanged",
        "diffAvailable",
        "appendMessage",
        "attachmentValidation",
        "status",
        "usageInfo",
    ];
    KNOWN.contains(&type_tag)
}
