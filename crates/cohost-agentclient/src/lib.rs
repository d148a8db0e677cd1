// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! JSON-RPC-over-subprocess client for the agent CLI (§6): a
//! round-trip-by-correlation-id idiom over newline-delimited JSON on piped
//! stdio, with the subprocess spawned via `tokio::process::Command`.

mod client;
mod path;
mod protocol;

pub use client::{AgentClient, PreToolUseHook};
pub use path::resolve_agent_path;
pub use protocol::{
    AgentEvent, IncomingLine, OutboundCall, PreToolUseRequest, PreToolUseResponse, QuotaUsage,
    ToolRequest,
};
