// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Wire shapes for the agent subprocess protocol (§6 "Agent subprocess
//! protocol (consumed)"). The subprocess speaks newline-delimited JSON; each
//! line is either an event (fire-and-forget, host never replies) or a hook
//! request (round-trip, host must reply with a matching `id`).

use serde::{Deserialize, Serialize};

/// One pending tool request attached to an `assistant.message` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A per-quota-type usage snapshot (`assistant.usage`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub quota_type: String,
    pub used: u64,
    pub limit: Option<u64>,
}

/// Inbound events from the agent subprocess, tagged by the `type` field
/// exactly as listed in §6. One `match` arm each in `cohost-session`'s event
/// translation loop — no string-keyed callback map (§9 "Dynamic
/// type-guarded dispatch").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    #[serde(rename = "assistant.message")]
    AssistantMessage {
        content: String,
        #[serde(default)]
        tool_requests: Vec<ToolRequest>,
    },
    #[serde(rename = "assistant.reasoning")]
    AssistantReasoning { content: String },
    #[serde(rename = "assistant.message_delta")]
    AssistantMessageDelta { delta: String },
    #[serde(rename = "assistant.turn_start")]
    AssistantTurnStart,
    #[serde(rename = "assistant.turn_end")]
    AssistantTurnEnd,
    #[serde(rename = "assistant.usage")]
    AssistantUsage { quotas: Vec<QuotaUsage> },
    #[serde(rename = "session.usage_info")]
    SessionUsageInfo { current_tokens: u64, limit_tokens: u64 },
    #[serde(rename = "session.start")]
    SessionStart { session_id: String },
    #[serde(rename = "session.resume")]
    SessionResume { session_id: String },
    #[serde(rename = "session.idle")]
    SessionIdle,
    #[serde(rename = "session.error")]
    SessionError { message: String },
    #[serde(rename = "tool.execution_start")]
    ToolExecutionStart {
        tool_call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    #[serde(rename = "tool.execution_progress")]
    ToolExecutionProgress {
        tool_call_id: String,
        progress_message: String,
    },
    #[serde(rename = "tool.execution_complete")]
    ToolExecutionComplete {
        tool_call_id: String,
        success: bool,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// A hook round-trip: the agent blocks on a reply before proceeding. Only
/// `onPreToolUse` is specified (§6 "Hook contract").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreToolUseRequest {
    pub id: String,
    pub tool_name: String,
    pub tool_args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreToolUseResponse {
    pub id: String,
    /// Always `true` in this implementation — hook exceptions are caught by
    /// the agent and treated as no-op (§7 "Propagation policy"), so the host
    /// never has a reason to veto.
    pub proceed: bool,
}

/// A single incoming line from the subprocess: either a hook round-trip or a
/// fire-and-forget event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncomingLine {
    Hook(PreToolUseRequest),
    Event(AgentEvent),
}

/// Outbound method calls (§6 "Required outbound methods").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OutboundCall {
    ResumeSession {
        id: String,
        options: serde_json::Value,
    },
    CreateSession {
        options: serde_json::Value,
    },
    SendAndWait {
        prompt: String,
        #[serde(default)]
        attachments: Vec<String>,
    },
    Abort,
    Destroy,
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_message_tags_correctly() {
        let json = r#"{"type":"assistant.message","content":"hi","tool_requests":[]}"#;
        let ev: AgentEvent = serde_json::from_str(json).unwrap();
        match ev {
            AgentEvent::AssistantMessage { content, tool_requests } => {
                assert_eq!(content, "hi");
                assert!(tool_requests.is_empty());
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn tool_execution_start_round_trips() {
        let ev = AgentEvent::ToolExecutionStart {
            tool_call_id: "t1".into(),
            tool_name: "edit".into(),
            arguments: serde_json::json!({"path": "/w/a.txt"}),
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: AgentEvent = serde_json::from_str(&json).unwrap();
        match back {
            AgentEvent::ToolExecutionStart { tool_call_id, .. } => assert_eq!(tool_call_id, "t1"),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn incoming_line_distinguishes_hook_from_event() {
        let hook_json = r#"{"id":"h1","tool_name":"edit","tool_args":{}}"#;
        let line: IncomingLine = serde_json::from_str(hook_json).unwrap();
        assert!(matches!(line, IncomingLine::Hook(_)));

        let event_json = r#"{"type":"session.idle"}"#;
        let line: IncomingLine = serde_json::from_str(event_json).unwrap();
        assert!(matches!(line, IncomingLine::Event(AgentEvent::SessionIdle)));
    }
}
