// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::Cli;
use cohost_proto::messages::{
    BackendStateSnapshot, InboundMessage, OutboundMessage, StatusLevel,
};
use cohost_proto::{ChatMessage, SessionMode};
use cohost_rpc::HostRouter;
use cohost_session::SessionManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cohost_config::load(cli.config.as_deref())?;
    let workspace = match &cli.workspace {
        Some(p) => p.clone(),
        None => std::env::current_dir().context("resolving current directory as workspace")?,
    };
    let snapshot_dir = std::env::temp_dir().join("cohost-snapshots");

    let mut manager = SessionManager::new(config, workspace.clone(), snapshot_dir)
        .context("constructing session manager")?;

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundMessage>(256);
    let mut router = HostRouter::new(outbound_tx);

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(msg) = outbound_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(line) => {
                    if stdout.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                    if stdout.write_all(b"\n").await.is_err() {
                        break;
                    }
                    let _ = stdout.flush().await;
                }
                Err(err) => tracing::error!(%err, "failed to serialize outbound message"),
            }
        }
    });

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundMessage>(256);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<InboundMessage>(&line) {
                        Ok(msg) => {
                            if inbound_tx.send(msg).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => tracing::warn!(%err, "dropping unparseable view message"),
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::error!(%err, "error reading from view");
                    break;
                }
            }
        }
    });

    run_event_loop(&mut manager, &mut router, &mut inbound_rx, &workspace, cli.resume.as_deref())
        .await;

    manager.stop().await.ok();
    writer.abort();
    Ok(())
}

async fn run_event_loop(
    manager: &mut SessionManager,
    router: &mut HostRouter,
    inbound_rx: &mut mpsc::Receiver<InboundMessage>,
    workspace: &Path,
    resume_hint: Option<&str>,
) {
    let mut transcript: Vec<ChatMessage> = Vec::new();
    let mut session_active = false;
    let mut active_file_path: Option<String> = None;

    let mut output_sub = manager.streams().output.subscribe();
    let mut reasoning_sub = manager.streams().reasoning.subscribe();
    let mut error_sub = manager.streams().error.subscribe();
    let mut status_sub = manager.streams().status.subscribe();
    let mut tool_start_sub = manager.streams().tool_start.subscribe();
    let mut tool_update_sub = manager.streams().tool_update.subscribe();
    let mut tool_complete_sub = manager.streams().tool_complete.subscribe();
    let mut file_change_sub = manager.streams().file_change.subscribe();
    let mut diff_sub = manager.streams().diff_available.subscribe();
    let mut usage_sub = manager.streams().usage_update.subscribe();

    loop {
        tokio::select! {
            maybe_inbound = inbound_rx.recv() => {
                let Some(raw) = maybe_inbound else { break };
                let Some(inbound) = router.handle_inbound(raw) else { continue };
                if let Err(err) = handle_inbound(
                    manager,
                    router,
                    &mut transcript,
                    &mut session_active,
                    &mut active_file_path,
                    workspace,
                    resume_hint,
                    inbound,
                ).await {
                    tracing::error!(%err, "failed to handle inbound view message");
                    let _ = router.send(OutboundMessage::Status {
                        message: err.to_string(),
                        level: StatusLevel::Error,
                    }).await;
                }
            }
            Some(msg) = output_sub.recv() => {
                transcript.push(msg.clone());
                let _ = router.send(OutboundMessage::AssistantMessage { message: msg }).await;
            }
            Some(msg) = reasoning_sub.recv() => {
                let _ = router.send(OutboundMessage::ReasoningMessage { message: msg }).await;
            }
            Some(msg) = error_sub.recv() => {
                transcript.push(msg.clone());
                let _ = router.send(OutboundMessage::AppendMessage { message: msg }).await;
            }
            Some(ev) = status_sub.recv() => {
                let _ = router.send(OutboundMessage::SessionStatus { status: ev.status }).await;
            }
            Some(state) = tool_start_sub.recv() => {
                let _ = router.send(OutboundMessage::ToolStart {
                    tool_call_id: state.tool_call_id,
                    tool_name: state.tool_name,
                    arguments: state.arguments,
                    intent: state.intent,
                }).await;
            }
            Some(ev) = tool_update_sub.recv() => {
                let _ = router.send(OutboundMessage::ToolUpdate {
                    tool_call_id: ev.tool_call_id,
                    progress: ev.progress,
                }).await;
            }
            Some(state) = tool_complete_sub.recv() => {
                let progress = state.error.map(|e| e.message).or(state.result);
                let _ = router.send(OutboundMessage::ToolUpdate {
                    tool_call_id: state.tool_call_id,
                    progress,
                }).await;
            }
            Some(ev) = file_change_sub.recv() => {
                active_file_path = Some(ev.path.clone());
                let _ = router.send(OutboundMessage::ActiveFileChanged { path: Some(ev.path) }).await;
            }
            Some(outbound) = diff_sub.recv() => {
                let _ = router.send(outbound).await;
            }
            Some(ev) = usage_sub.recv() => {
                let _ = router.send(OutboundMessage::UsageInfo {
                    current_tokens: ev.current_tokens,
                    limit_tokens: ev.limit_tokens,
                }).await;
            }
            else => break,
        }
    }
}

async fn handle_inbound(
    manager: &mut SessionManager,
    router: &mut HostRouter,
    transcript: &mut Vec<ChatMessage>,
    session_active: &mut bool,
    active_file_path: &mut Option<String>,
    workspace: &Path,
    resume_hint: Option<&str>,
    inbound: InboundMessage,
) -> anyhow::Result<()> {
    match inbound {
        InboundMessage::Ready => {
            if !*session_active {
                manager.start(resume_hint).await?;
                *session_active = true;
            }
            let snapshot = BackendStateSnapshot {
                current_session_id: manager.active_session_id().map(|s| s.to_string()),
                session_active: *session_active,
                messages: transcript.clone(),
                plan_mode: manager.mode() == SessionMode::Plan,
                workspace_path: workspace.display().to_string(),
                active_file_path: active_file_path.clone(),
                session_start_timestamp: None,
            };
            router.send_init(snapshot).await?;
        }
        InboundMessage::UserMessageSend { text, attachments } => {
            let timestamp = transcript.len() as u64;
            let echo = ChatMessage::user(text.clone(), timestamp);
            transcript.push(echo.clone());
            router.send(OutboundMessage::UserEcho { message: echo }).await?;
            let attachments = if attachments.is_empty() {
                None
            } else {
                Some(attachments)
            };
            manager.send_message(&text, attachments).await?;
        }
        InboundMessage::Abort => {
            manager.abort_message().await?;
        }
        InboundMessage::SwitchSession { session_id } => {
            manager.start(Some(session_id.as_str())).await?;
        }
        InboundMessage::NewSession => {
            manager.start(None).await?;
            transcript.clear();
            router.send(OutboundMessage::Clear).await?;
        }
        // Which file/diff to display is projected from state already pushed
        // via `activeFileChanged`/`diffAvailable`; rendering it is IDE
        // integration glue, out of scope for the core.
        InboundMessage::ViewPlan | InboundMessage::ViewDiff { .. } | InboundMessage::PickFiles => {}
        InboundMessage::TogglePlanMode => {
            if manager.mode() == SessionMode::Plan {
                manager.disable_plan_mode().await?;
            } else {
                manager.enable_plan_mode().await?;
            }
        }
        InboundMessage::AcceptPlan => {
            manager.accept_plan().await?;
        }
        InboundMessage::RejectPlan => {
            manager.reject_plan().await?;
        }
    }
    Ok(())
}

fn init_logging(verbosity: u8) {
    // Stdout is the NDJSON transport to the view; all logging goes to
    // stderr so it can never corrupt a frame.
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
