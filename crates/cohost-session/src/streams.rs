// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The ten narrow typed event streams the Session Manager emits (§4.1
//! "Emitted streams"). Each topic is an independent `broadcast` channel —
//! subscribing and disposing one never perturbs the others, and disposal is
//! idempotent by construction (dropping a `broadcast::Receiver` is a no-op
//! on subsequent drops).

use cohost_proto::{ChatMessage, ToolExecutionState};
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct ToolUpdateEvent {
    pub tool_call_id: String,
    pub progress: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct UsageUpdateEvent {
    pub current_tokens: u64,
    pub limit_tokens: u64,
}

/// A disposable subscription handle. Holding it keeps the channel alive on
/// the receiver side; dropping it (or calling [`Subscription::dispose`]
/// explicitly) detaches cleanly. §9 "Event handler lifetime": every attach
/// returns a disposer.
pub struct Subscription<T>(Option<broadcast::Receiver<T>>);

impl<T: Clone> Subscription<T> {
    fn new(rx: broadcast::Receiver<T>) -> Self {
        Self(Some(rx))
    }

    /// Await the next event on this subscription, or `None` once disposed.
    pub async fn recv(&mut self) -> Option<T> {
        match &mut self.0 {
            Some(rx) => rx.recv().await.ok(),
            None => None,
        }
    }

    /// Detach from the stream. Safe to call more than once.
    pub fn dispose(&mut self) {
        self.0 = None;
    }
}

macro_rules! narrow_stream {
    ($name:ident, $payload:ty) => {
        #[derive(Clone)]
        pub struct $name {
            tx: broadcast::Sender<$payload>,
        }

        impl $name {
            fn new() -> Self {
                let (tx, _rx) = broadcast::channel(256);
                Self { tx }
            }

            pub fn subscribe(&self) -> Subscription<$payload> {
                Subscription::new(self.tx.subscribe())
            }

            pub fn emit(&self, event: $payload) {
                // No subscribers is a normal, expected state (e.g. between
                // session switches); the send error is not an anomaly.
                let _ = self.tx.send(event);
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

narrow_stream!(OutputStream, ChatMessage);
narrow_stream!(ReasoningStream, ChatMessage);
narrow_stream!(ErrorStream, ChatMessage);
narrow_stream!(StatusStream, StatusEvent);
narrow_stream!(ToolStartStream, ToolExecutionState);
narrow_stream!(ToolUpdateStream, ToolUpdateEvent);
narrow_stream!(ToolCompleteStream, ToolExecutionState);
narrow_stream!(FileChangeStream, FileChangeEvent);
narrow_stream!(DiffAvailableStream, cohost_proto::messages::OutboundMessage);
narrow_stream!(UsageUpdateStream, UsageUpdateEvent);

/// Owns all ten topics. One instance lives for the lifetime of the host
/// process, independent of how many times sessions are created/destroyed
/// underneath it — subscribers never need to re-subscribe across a session
/// switch, only across process restart.
#[derive(Clone, Default)]
pub struct StreamHub {
    pub output: OutputStream,
    pub reasoning: ReasoningStream,
    pub error: ErrorStream,
    pub status: StatusStream,
    pub tool_start: ToolStartStream,
    pub tool_update: ToolUpdateStream,
    pub tool_complete: ToolCompleteStream,
    pub file_change: FileChangeStream,
    pub diff_available: DiffAvailableStream,
    pub usage_update: UsageUpdateStream,
}
