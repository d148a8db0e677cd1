// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The conversation data model (§3): `Message`, `ToolExecutionState`, and the
//! session mode enum. Shaped around an explicit `kind` + `toolStatus` field
//! pair rather than provider-wire-format-shaped variants, since here the
//! agent is an opaque subprocess rather than an in-process model call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// What a [`ChatMessage`] represents, independent of who sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    Reasoning,
    Tool,
    Error,
}

/// A single record in the conversation history (§3 `Message`).
///
/// Never mutated after append — streaming text deltas are accumulated by
/// the caller (RPC Router's `streamChunk` handling) and only committed here
/// once complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub kind: MessageKind,
    pub content: String,
    /// Monotonic — later messages always compare greater. Not wall-clock
    /// precise; a simple per-`BackendState` counter is sufficient and avoids
    /// the `Date.now()`-style non-determinism the spec's source exhibits.
    pub timestamp: u64,
    pub tool_name: Option<String>,
    pub tool_status: Option<ToolStatus>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            role: Role::User,
            kind: MessageKind::User,
            content: content.into(),
            timestamp,
            tool_name: None,
            tool_status: None,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            role: Role::Assistant,
            kind: MessageKind::Assistant,
            content: content.into(),
            timestamp,
            tool_name: None,
            tool_status: None,
        }
    }

    pub fn reasoning(content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            role: Role::Assistant,
            kind: MessageKind::Reasoning,
            content: content.into(),
            timestamp,
            tool_name: None,
            tool_status: None,
        }
    }

    pub fn error(content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            role: Role::System,
            kind: MessageKind::Error,
            content: content.into(),
            timestamp,
            tool_name: None,
            tool_status: None,
        }
    }
}

/// The lifecycle status of one tool invocation (§3 `ToolExecutionState`).
///
/// Transitions are monotonic forward: `Pending -> Running -> {Complete,
/// Failed}`. Enforced by [`ToolExecutionState::advance`], not by the type
/// system, because the agent subprocess is the sole driver of transitions
/// and a rejected out-of-order transition must be logged, not panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl ToolStatus {
    fn rank(self) -> u8 {
        match self {
            ToolStatus::Pending => 0,
            ToolStatus::Running => 1,
            ToolStatus::Complete | ToolStatus::Failed => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub message: String,
    pub code: Option<String>,
}

/// One tool invocation's full lifecycle record (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionState {
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub status: ToolStatus,
    pub start_timestamp: u64,
    pub end_timestamp: Option<u64>,
    pub result: Option<String>,
    pub error: Option<ToolError>,
    pub progress: Option<String>,
    /// Set from the most recent `report_intent` call in the same
    /// `assistant.message`; cleared after first use (§8 invariant).
    pub intent: Option<String>,
}

impl ToolExecutionState {
    pub fn new(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
        start_timestamp: u64,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            arguments,
            status: ToolStatus::Pending,
            start_timestamp,
            end_timestamp: None,
            result: None,
            error: None,
            progress: None,
            intent: None,
        }
    }

    /// Attempt a forward transition. Returns `false` (and leaves state
    /// unchanged) if `next` would not be a monotonic advance — the caller is
    /// expected to log this as a protocol anomaly rather than crash.
    pub fn advance(&mut self, next: ToolStatus) -> bool {
        if next.rank() < self.status.rank() {
            return false;
        }
        if matches!(next, ToolStatus::Complete | ToolStatus::Failed) {
            self.end_timestamp.get_or_insert(self.start_timestamp);
        }
        self.status = next;
        true
    }

    /// Attach an intent string from a `report_intent` tool call, consuming
    /// any previously attached intent (§8 invariant: cleared after first use
    /// means "replaced by the next use", not retained once read).
    pub fn set_intent(&mut self, intent: impl Into<String>) {
        self.intent = Some(intent.into());
    }

    pub fn take_intent(&mut self) -> Option<String> {
        self.intent.take()
    }
}

/// The work/plan dual-session mode (§4.1 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Work,
    Plan,
}

/// A logical session (§3 `Session`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: String,
    pub mode: SessionMode,
    pub start_timestamp: DateTime<Utc>,
    pub active: bool,
}

impl SessionMeta {
    /// Plan session identifiers always take the form `<work-id>-plan`.
    pub fn plan_id_for(work_id: &str) -> String {
        format!("{work_id}-plan")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_id_is_suffixed() {
        assert_eq!(SessionMeta::plan_id_for("abc123"), "abc123-plan");
    }

    #[test]
    fn advance_forward_succeeds() {
        let mut t = ToolExecutionState::new("t1", "edit", serde_json::json!({}), 0);
        assert!(t.advance(ToolStatus::Running));
        assert!(t.advance(ToolStatus::Complete));
        assert_eq!(t.status, ToolStatus::Complete);
        assert!(t.end_timestamp.is_some());
    }

    #[test]
    fn advance_backward_rejected() {
        let mut t = ToolExecutionState::new("t1", "edit", serde_json::json!({}), 0);
        t.advance(ToolStatus::Running);
        t.advance(ToolStatus::Complete);
        assert!(!t.advance(ToolStatus::Pending));
        assert_eq!(t.status, ToolStatus::Complete);
    }

    #[test]
    fn end_timestamp_only_set_on_terminal_status() {
        let mut t = ToolExecutionState::new("t1", "edit", serde_json::json!({}), 5);
        t.advance(ToolStatus::Running);
        assert!(t.end_timestamp.is_none());
        t.advance(ToolStatus::Failed);
        assert!(t.end_timestamp.is_some());
    }

    #[test]
    fn intent_is_cleared_on_take() {
        let mut t = ToolExecutionState::new("t1", "edit", serde_json::json!({}), 0);
        t.set_intent("refactoring auth");
        assert_eq!(t.take_intent().as_deref(), Some("refactoring auth"));
        assert_eq!(t.take_intent(), None);
    }
}
