// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Session lifecycle, resumption, and dual-mode (work/plan) orchestration
//! of agent sessions (§4.1).

mod attachments;
mod manager;
mod resume;
mod retry;
mod streams;

pub use attachments::expand_path_references;
pub use manager::SessionManager;
pub use resume::find_most_recent_session;
pub use retry::retry_with_backoff;
pub use streams::{
    FileChangeEvent, OutputStream, StatusEvent, StreamHub, Subscription, ToolUpdateEvent,
    UsageUpdateEvent,
};
