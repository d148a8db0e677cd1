// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Subprocess lifecycle and JSON-RPC framing for the agent CLI: a
//! `tokio::process::Command` spawn with piped stdio and stderr captured
//! separately, and a round-trip-by-correlation-id idiom over
//! newline-delimited JSON on the piped stdio instead of a socket.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use cohost_proto::AgentError;

use crate::protocol::{AgentEvent, IncomingLine, OutboundCall, PreToolUseResponse};

/// Invoked synchronously from the reader task whenever the subprocess sends
/// an `onPreToolUse` round-trip (§6 "Hook contract"). Hook failures must
/// never break the pipeline (§7): a panic-free closure that always produces
/// a response.
pub type PreToolUseHook = Arc<dyn Fn(&str, &Value) -> bool + Send + Sync>;

/// A live connection to one agent subprocess. Owns the child process and its
/// stdin; the stdout reader task forwards parsed [`AgentEvent`]s on `events`
/// and answers hook round-trips inline.
pub struct AgentClient {
    child: Child,
    stdin: Arc<Mutex<ChildStdin>>,
    reader_task: tokio::task::JoinHandle<()>,
}

impl AgentClient {
    /// Spawn the agent binary attached to `workspace`, wiring stdin/stdout as
    /// pipes and stderr to the parent's (for operator-visible diagnostics).
    /// `gh_sso_enterprise_slug`, when set, is forwarded as `GH_ENTERPRISE_SLUG`
    /// so the subprocess's own GitHub Enterprise SSO flow picks it up.
    /// Returns the client plus the receiving half of the event stream.
    pub fn spawn(
        agent_path: &Path,
        workspace: &Path,
        gh_sso_enterprise_slug: Option<&str>,
        hook: PreToolUseHook,
    ) -> std::io::Result<(Self, mpsc::Receiver<AgentEvent>)> {
        let mut cmd = tokio::process::Command::new(agent_path);
        cmd.current_dir(workspace)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        if let Some(slug) = gh_sso_enterprise_slug {
            cmd.env("GH_ENTERPRISE_SLUG", slug);
        }

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");

        let stdin = Arc::new(Mutex::new(stdin));
        let (tx, rx) = mpsc::channel(256);
        let reader_task = tokio::spawn(read_loop(stdout, tx, hook, stdin.clone()));

        Ok((
            Self {
                child,
                stdin,
                reader_task,
            },
            rx,
        ))
    }

    async fn write_call(&self, call: &OutboundCall) -> Result<(), AgentError> {
        let mut line = serde_json::to_string(call).map_err(|e| AgentError::Protocol(e.to_string()))?;
        line.push('\n');
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(AgentError::Transport)?;
        stdin.flush().await.map_err(AgentError::Transport)
    }

    pub async fn resume_session(&self, id: &str, options: Value) -> Result<(), AgentError> {
        self.write_call(&OutboundCall::ResumeSession {
            id: id.to_string(),
            options,
        })
        .await
    }

    pub async fn create_session(&self, options: Value) -> Result<(), AgentError> {
        self.write_call(&OutboundCall::CreateSession { options }).await
    }

    pub async fn send_and_wait(&self, prompt: &str, attachments: Vec<String>) -> Result<(), AgentError> {
        self.write_call(&OutboundCall::SendAndWait {
            prompt: prompt.to_string(),
            attachments,
        })
        .await
    }

    pub async fn abort(&self) -> Result<(), AgentError> {
        self.write_call(&OutboundCall::Abort).await
    }

    pub async fn destroy(&self) -> Result<(), AgentError> {
        self.write_call(&OutboundCall::Destroy).await
    }

    /// Stop the subprocess gracefully: send `stop`, then wait for exit.
    pub async fn stop(mut self) -> Result<(), AgentError> {
        let _ = self.write_call(&OutboundCall::Stop).await;
        self.reader_task.abort();
        let _ = self.child.wait().await;
        Ok(())
    }
}

async fn read_loop(
    stdout: tokio::process::ChildStdout,
    tx: mpsc::Sender<AgentEvent>,
    hook: PreToolUseHook,
    stdin: Arc<Mutex<ChildStdin>>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<IncomingLine>(&line) {
                    Ok(IncomingLine::Event(event)) => {
                        if tx.send(event).await.is_err() {
                            debug!("event receiver dropped; stopping agent reader loop");
                            return;
                        }
                    }
                    Ok(IncomingLine::Hook(request)) => {
                        let proceed = hook(&request.tool_name, &request.tool_args);
                        let response = PreToolUseResponse {
                            id: request.id,
                            proceed,
                        };
                        // Hook exceptions are caught by the agent and
                        // treated as no-op (§7); a write failure here means
                        // the subprocess is already gone and the next
                        // stdout read will end the loop.
                        if let Ok(mut json) = serde_json::to_string(&response) {
                            json.push('\n');
                            let mut stdin = stdin.lock().await;
                            let _ = stdin.write_all(json.as_bytes()).await;
                            let _ = stdin.flush().await;
                        }
                    }
                    Err(e) => {
                        warn!(%e, line = %line, "unparseable line from agent subprocess");
                    }
                }
            }
            Ok(None) => {
                debug!("agent subprocess closed stdout");
                return;
            }
            Err(e) => {
                warn!(%e, "error reading agent subprocess stdout");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resume_session_writes_expected_json_line() {
        // Exercises the framing path against /bin/cat as a stand-in
        // subprocess: whatever is written to stdin is echoed to stdout.
        let hook: PreToolUseHook = Arc::new(|_, _| true);
        let (client, mut rx) = AgentClient::spawn(Path::new("/bin/cat"), Path::new("."), None, hook).unwrap();

        client.resume_session("s1", serde_json::json!({})).await.unwrap();

        // /bin/cat echoes the call back; it won't parse as an AgentEvent
        // (it's an OutboundCall), so the reader logs and discards it — this
        // test only verifies the write path doesn't error.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let _ = rx.try_recv();

        client.stop().await.unwrap();
    }
}
