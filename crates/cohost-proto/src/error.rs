// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Error taxonomy shared by every component that talks to the agent
//! subprocess (§7 of the design). Classification is pattern-matched against
//! the raw error message in the priority order the spec documents — the
//! agent CLI does not (yet) expose a structured error code, so this is a
//! best-effort substring classifier.
//!
//! See the module doc on [`classify`] for the known fragility: "token"
//! matches many non-auth errors, and idle-timeout detection depends on two
//! literal substrings. Both are isolated here so a future structured error
//! code can replace them without touching call sites.

use thiserror::Error;

/// Which sub-variant of an authentication failure occurred.
///
/// Distinguished so the UI can tell "your token expired" from "you were
/// never logged in" — see §7's user-visible failure behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureKind {
    /// A credential environment variable is present but the agent rejected it.
    ExpiredToken,
    /// No credential environment variable is set at all.
    NoAuth,
}

/// The five error classes from §7, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentErrorClass {
    /// "not found" / "does not exist" / "invalid" + "session". No retry;
    /// the session is gone and must be recreated.
    SessionExpired,
    /// auth/unauthorized/401/403/login/token patterns. Fail fast.
    Authentication(AuthFailureKind),
    /// "not connected" / "not ready". Retriable with backoff.
    SessionNotReady,
    /// network/timeout/ECONN*/ENOTFOUND patterns. Retriable with backoff.
    NetworkTimeout,
    /// Fallthrough. Retriable (cautious default).
    Unknown,
}

impl AgentErrorClass {
    /// Whether §4.1's retry-with-backoff policy applies to this class.
    pub fn is_retriable(self) -> bool {
        !matches!(
            self,
            AgentErrorClass::SessionExpired | AgentErrorClass::Authentication(_)
        )
    }
}

/// Classify a raw error message into one of the five §7 classes.
///
/// Checked in priority order: `session_expired` beats `authentication` beats
/// `session_not_ready` beats `network_timeout` beats `unknown`, regardless of
/// which patterns also match further down the list. This mirrors the
/// source's documented (if fragile) substring classifier rather than
/// inventing a stricter one, per the Open Questions note in §9.
pub fn classify(message: &str, credential_env_present: bool) -> AgentErrorClass {
    let lower = message.to_lowercase();

    let mentions_session = lower.contains("session");
    let session_gone = lower.contains("not found")
        || lower.contains("does not exist")
        || lower.contains("invalid");
    if mentions_session && session_gone {
        return AgentErrorClass::SessionExpired;
    }

    let auth_pattern = lower.contains("auth")
        || lower.contains("unauthorized")
        || lower.contains("401")
        || lower.contains("403")
        || lower.contains("login")
        || lower.contains("token");
    if auth_pattern {
        let kind = if credential_env_present {
            AuthFailureKind::ExpiredToken
        } else {
            AuthFailureKind::NoAuth
        };
        return AgentErrorClass::Authentication(kind);
    }

    if lower.contains("not connected") || lower.contains("not ready") {
        return AgentErrorClass::SessionNotReady;
    }

    let network_pattern = lower.contains("network")
        || lower.contains("timeout")
        || lower.contains("econn")
        || lower.contains("enotfound");
    if network_pattern {
        return AgentErrorClass::NetworkTimeout;
    }

    AgentErrorClass::Unknown
}

/// Detect the idle-timeout case that §4.1/§5 say must be swallowed rather
/// than surfaced: a timeout arising from a long-running tool execution, not
/// a genuine connectivity failure.
///
/// Matches the source's literal (and fragile — see §9) substrings
/// `"Timeout"` and `"session.idle"`. Prefer a structured error code from the
/// agent subprocess over this function when one becomes available.
pub fn is_idle_timeout(message: &str) -> bool {
    message.contains("Timeout") && message.contains("session.idle")
}

/// Top-level error type returned by `cohost-session` and `cohost-agentclient`
/// operations. Carries the classified kind alongside the original message so
/// callers can both pattern-match on class and log/display the raw text.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent error ({class:?}): {message}")]
    Classified {
        class: AgentErrorClass,
        message: String,
    },
    #[error("agent binary could not be resolved (checked: configured path, bundled binary, PATH)")]
    PathUnresolved,
    #[error("session resume timed out after {0:?}")]
    ResumeTimeout(std::time::Duration),
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl AgentError {
    /// Classify a raw message into a full `AgentError`.
    pub fn from_message(message: impl Into<String>, credential_env_present: bool) -> Self {
        let message = message.into();
        let class = classify(&message, credential_env_present);
        AgentError::Classified { message, class }
    }

    pub fn class(&self) -> Option<AgentErrorClass> {
        match self {
            AgentError::Classified { class, .. } => Some(*class),
            _ => None,
        }
    }
}
