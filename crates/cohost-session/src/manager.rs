// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The Session Manager (§4.1): path resolution, session lifecycle, the
//! work/plan mode state machine, retry/recovery, and translation of raw
//! agent events into the ten narrow typed streams.
//!
//! There is no background dispatch task. Per §9 "Cyclic references": the
//! manager owns the incoming event queue and drains it sequentially from
//! whichever operation is awaiting agent activity — `sendMessage`,
//! `start`, and plan-session creation all pump events inline via
//! [`SessionManager::next_event`] until their own completion condition is
//! met. Tier 2 hook capture is the one exception: it runs synchronously
//! inside the agent client's reader task, so [`SnapshotStore`] is the only
//! piece of state shared across tasks (behind a plain `std::sync::Mutex`,
//! held only across short, non-blocking filesystem calls).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;

use cohost_agentclient::{AgentClient, AgentEvent, PreToolUseHook};
use cohost_config::Config;
use cohost_proto::caps::validate_attachments;
use cohost_proto::chat::ToolError;
use cohost_proto::messages::Attachment;
use cohost_proto::{
    is_idle_timeout, AgentError, AgentErrorClass, ChatMessage, ModelCapabilities, SessionMeta,
    SessionMode, ToolExecutionState, ToolStatus,
};
use cohost_snapshot::{is_edit_or_create, SnapshotStore};

use crate::attachments::expand_path_references;
use crate::resume;
use crate::retry::retry_with_backoff;
use crate::streams::{FileChangeEvent, StatusEvent, StreamHub, ToolUpdateEvent, UsageUpdateEvent};

/// Fixed preference order for model-fallback substitution (§4.1 "Model
/// fallback"). Walked in order, skipping the originally requested model if
/// it appears again, up to 3 substitutions beyond the original attempt.
const MODEL_FALLBACK_CHAIN: &[&str] = &["claude-sonnet-4.6", "gpt-5", "gpt-5-mini", "o3"];
const MAX_MODEL_SUBSTITUTIONS: usize = 3;

/// Plan sessions get a restricted tool set: 6 custom plan tools plus 6 safe
/// read-only tools (§4.1 `enablePlanMode`). Names are not specified by the
/// agent subprocess protocol; chosen to match the `read_file`/`edit_file`
/// naming already established by the snapshot pipeline's tool allowlist.
const PLAN_MODE_TOOLS: &[&str] = &[
    "plan_write",
    "plan_revise",
    "plan_add_step",
    "plan_remove_step",
    "plan_reorder_steps",
    "plan_finalize",
    "read_file",
    "list_directory",
    "search_files",
    "grep_files",
    "read_symbol",
    "get_diagnostics",
];

const RESUME_DEADLINE: Duration = Duration::from_secs(30);

fn is_connection_closed(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("connection_closed") || lower.contains("connection closed")
}

fn extract_path(arguments: &Value, workspace: &Path) -> Option<PathBuf> {
    let raw = arguments.get("path")?.as_str()?;
    let candidate = Path::new(raw);
    Some(if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        workspace.join(candidate)
    })
}

fn build_session_options(
    model: Option<&str>,
    config: &Config,
    tool_whitelist: Option<&[&str]>,
    requested_session_id: Option<&str>,
) -> Value {
    let allow_tools: Vec<String> = match tool_whitelist {
        Some(names) => names.iter().map(|s| s.to_string()).collect(),
        None => config.allow_tools.clone(),
    };
    serde_json::json!({
        "model": model,
        "sessionId": requested_session_id,
        "allowAllTools": config.allow_all_tools,
        "allowTools": allow_tools,
        "denyTools": config.deny_tools,
        "allowAllPaths": config.allow_all_paths,
        "allowAllUrls": config.allow_all_urls,
        "allowUrls": config.allow_urls,
        "denyUrls": config.deny_urls,
        "addDirs": config.add_dirs,
    })
}

fn build_hook(snapshots: Arc<StdMutex<SnapshotStore>>, workspace: PathBuf) -> PreToolUseHook {
    Arc::new(move |tool_name: &str, tool_args: &Value| {
        if is_edit_or_create(tool_name) {
            if let Some(path) = extract_path(tool_args, &workspace) {
                if let Ok(mut store) = snapshots.lock() {
                    let _ = store.capture_if_absent(tool_name, &path);
                }
            }
        }
        // Hook exceptions are caught by the agent and treated as no-op
        // (§7); the host never has a reason to veto a tool call here.
        true
    })
}

/// Owns one or two logical sessions (work, optionally plan) and the single
/// connection to the agent subprocess.
pub struct SessionManager {
    config: Config,
    workspace: PathBuf,
    client: Option<AgentClient>,
    events_rx: Option<mpsc::Receiver<AgentEvent>>,
    snapshots: Arc<StdMutex<SnapshotStore>>,
    tool_exec: HashMap<String, ToolExecutionState>,
    streams: StreamHub,
    clock: AtomicU64,
    mode: SessionMode,
    work_session_id: Option<String>,
    plan_session_id: Option<String>,
    active_session_id: Option<String>,
    plan_snapshot: Option<String>,
    active_file_path: Option<String>,
    model_caps: ModelCapabilities,
    credential_env_present: bool,
    /// Set by a `report_intent` tool request, attached to the
    /// `ToolExecutionState` of the next tool call to start, then cleared.
    pending_intent: Option<String>,
}

impl SessionManager {
    pub fn new(config: Config, workspace: PathBuf, snapshot_temp_dir: PathBuf) -> std::io::Result<Self> {
        let snapshots = Arc::new(StdMutex::new(SnapshotStore::new(snapshot_temp_dir)?));
        let credential_env_present =
            std::env::var_os("GITHUB_TOKEN").is_some() || std::env::var_os("COPILOT_TOKEN").is_some();
        Ok(Self {
            config,
            workspace,
            client: None,
            events_rx: None,
            snapshots,
            tool_exec: HashMap::new(),
            streams: StreamHub::default(),
            clock: AtomicU64::new(0),
            mode: SessionMode::Work,
            work_session_id: None,
            plan_session_id: None,
            active_session_id: None,
            plan_snapshot: None,
            active_file_path: None,
            model_caps: ModelCapabilities::default(),
            credential_env_present,
            pending_intent: None,
        })
    }

    pub fn streams(&self) -> &StreamHub {
        &self.streams
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session_id.as_deref()
    }

    pub fn set_active_file_path(&mut self, path: Option<String>) {
        self.active_file_path = path.clone();
        self.streams.file_change.emit(FileChangeEvent {
            path: path.unwrap_or_default(),
        });
    }

    fn next_timestamp(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    fn plan_md_path(&self, session_id: &str) -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".copilot").join("session-state").join(session_id).join("plan.md"))
    }

    fn read_plan_md(&self, session_id: &str) -> Option<String> {
        std::fs::read_to_string(self.plan_md_path(session_id)?).ok()
    }

    async fn spawn_client(&mut self) -> Result<(), AgentError> {
        let agent_path = cohost_agentclient::resolve_agent_path(
            self.config.cli_path.as_deref(),
            self.config.agent.as_deref(),
        )?;
        let hook = build_hook(self.snapshots.clone(), self.workspace.clone());
        let (client, rx) = AgentClient::spawn(
            &agent_path,
            &self.workspace,
            self.config.gh_sso_enterprise_slug.as_deref(),
            hook,
        )
        .map_err(AgentError::Transport)?;
        self.client = Some(client);
        self.events_rx = Some(rx);
        Ok(())
    }

    /// Re-resolve the binary path (picks up reinstalls), stop the old
    /// client, and reconnect. Used on `connection_closed` (§4.1 "Client
    /// recreation").
    async fn recreate_client(&mut self) -> Result<(), AgentError> {
        if let Some(client) = self.client.take() {
            let _ = client.stop().await;
        }
        self.events_rx = None;
        self.spawn_client().await?;
        self.model_caps = ModelCapabilities::default();
        Ok(())
    }

    /// Pull the next event off the active channel, restoring it afterwards
    /// so no concurrent task ever holds it — this function is the only
    /// place events leave the channel.
    async fn next_event(&mut self) -> Result<AgentEvent, AgentError> {
        let mut rx = self
            .events_rx
            .take()
            .ok_or_else(|| AgentError::Protocol("event channel not attached".into()))?;
        let event = rx.recv().await;
        self.events_rx = Some(rx);
        event.ok_or_else(|| AgentError::Protocol("agent event channel closed".into()))
    }

    /// Route one raw agent event into tool-execution bookkeeping, the
    /// snapshot pipeline, and the ten narrow streams. Never reorders events
    /// relative to delivery order (§5 "Ordering guarantees").
    fn dispatch_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::AssistantMessage { content, tool_requests } => {
                for request in &tool_requests {
                    if request.name == "report_intent" {
                        if let Some(intent) = request.arguments.get("intent").and_then(|v| v.as_str()) {
                            self.pending_intent = Some(intent.to_string());
                        }
                        continue;
                    }
                    if is_edit_or_create(&request.name) {
                        if let Some(path) = extract_path(&request.arguments, &self.workspace) {
                            if let Ok(mut store) = self.snapshots.lock() {
                                let _ = store.capture_by_path(&request.name, &path);
                            }
                        }
                    }
                }
                let timestamp = self.next_timestamp();
                self.streams.output.emit(ChatMessage::assistant(content, timestamp));
            }
            AgentEvent::AssistantReasoning { content } => {
                let timestamp = self.next_timestamp();
                self.streams.reasoning.emit(ChatMessage::reasoning(content, timestamp));
            }
            AgentEvent::AssistantMessageDelta { .. } => {
                // The ten Session Manager streams carry only committed
                // messages; streaming deltas are an RPC Router concern
                // (`streamChunk`), fed from the agent client separately.
            }
            AgentEvent::AssistantTurnStart | AgentEvent::AssistantTurnEnd | AgentEvent::SessionIdle => {}
            AgentEvent::AssistantUsage { .. } => {}
            AgentEvent::SessionUsageInfo { current_tokens, limit_tokens } => {
                self.streams
                    .usage_update
                    .emit(UsageUpdateEvent { current_tokens, limit_tokens });
            }
            AgentEvent::SessionStart { session_id } | AgentEvent::SessionResume { session_id } => {
                self.active_session_id = Some(session_id);
            }
            AgentEvent::SessionError { message } => {
                if !is_idle_timeout(&message) {
                    let timestamp = self.next_timestamp();
                    self.streams.error.emit(ChatMessage::error(message, timestamp));
                }
            }
            AgentEvent::ToolExecutionStart { tool_call_id, tool_name, arguments } => {
                let timestamp = self.next_timestamp();
                let mut state = ToolExecutionState::new(tool_call_id.clone(), tool_name.clone(), arguments.clone(), timestamp);
                state.advance(ToolStatus::Running);
                if let Some(intent) = self.pending_intent.take() {
                    state.set_intent(intent);
                }

                if is_edit_or_create(&tool_name) {
                    if let Some(path) = extract_path(&arguments, &self.workspace) {
                        if let Ok(mut store) = self.snapshots.lock() {
                            if !store.correlate_to_tool_call_id(&path, &tool_call_id) {
                                match store.fallback_capture(&tool_name, &path, &tool_call_id) {
                                    Ok(()) => tracing::warn!(
                                        %tool_call_id,
                                        path = %path.display(),
                                        "tier 3 fallback snapshot capture used"
                                    ),
                                    Err(e) => tracing::warn!(%e, %tool_call_id, "fallback snapshot capture failed"),
                                }
                            }
                        }
                    }
                }

                self.streams.tool_start.emit(state.clone());
                // The intent was carried on this emission; don't let it
                // resurface on the later progress/complete clones of the
                // same state.
                state.take_intent();
                self.tool_exec.insert(tool_call_id, state);
            }
            AgentEvent::ToolExecutionProgress { tool_call_id, progress_message } => {
                if let Some(state) = self.tool_exec.get_mut(&tool_call_id) {
                    state.progress = Some(progress_message.clone());
                }
                self.streams.tool_update.emit(ToolUpdateEvent {
                    tool_call_id,
                    progress: Some(progress_message),
                });
            }
            AgentEvent::ToolExecutionComplete { tool_call_id, success, result, error } => {
                if let Some(state) = self.tool_exec.get_mut(&tool_call_id) {
                    state.result = result;
                    state.error = error.map(|message| ToolError { message, code: None });
                    state.advance(if success { ToolStatus::Complete } else { ToolStatus::Failed });
                    let state = state.clone();
                    self.streams.tool_complete.emit(state.clone());

                    let path = extract_path(&state.arguments, &self.workspace);
                    let outcome = self.snapshots.lock().ok().and_then(|mut store| {
                        store
                            .on_execution_complete(&tool_call_id, success, state.tool_name.clone())
                            .ok()
                            .flatten()
                    });
                    if let Some(outbound) = outcome {
                        self.streams.diff_available.emit(outbound);
                        if let Some(path) = path {
                            self.streams.file_change.emit(FileChangeEvent {
                                path: path.display().to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Pump events until the current turn ends. Idle-timeout session errors
    /// are swallowed and the wait continues (§5 "Timeouts"); any other
    /// `SessionError` ends the wait with a classified error.
    async fn await_turn_completion(&mut self) -> Result<(), AgentError> {
        loop {
            let event = self.next_event().await?;
            let is_terminal_error = matches!(&event, AgentEvent::SessionError { message } if !is_idle_timeout(message));
            let turn_ended = matches!(event, AgentEvent::AssistantTurnEnd | AgentEvent::SessionIdle);
            let error_message = match &event {
                AgentEvent::SessionError { message } => Some(message.clone()),
                _ => None,
            };
            self.dispatch_event(event);

            if is_terminal_error {
                let message = error_message.unwrap_or_default();
                return Err(AgentError::from_message(message, self.credential_env_present));
            }
            if turn_ended {
                return Ok(());
            }
        }
    }

    /// Pump events until a `session.start` arrives, used right after
    /// `create_session`.
    async fn await_session_started(&mut self) -> Result<String, AgentError> {
        loop {
            let event = self.next_event().await?;
            if let AgentEvent::SessionStart { session_id } = &event {
                let session_id = session_id.clone();
                self.dispatch_event(event);
                return Ok(session_id);
            }
            let is_terminal_error = matches!(&event, AgentEvent::SessionError { message } if !is_idle_timeout(message));
            let error_message = match &event {
                AgentEvent::SessionError { message } => Some(message.clone()),
                _ => None,
            };
            self.dispatch_event(event);
            if is_terminal_error {
                return Err(AgentError::from_message(error_message.unwrap_or_default(), self.credential_env_present));
            }
        }
    }

    async fn resume_with_retry(&mut self, session_id: &str) -> Result<(), AgentError> {
        let credential_env_present = self.credential_env_present;
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AgentError::Protocol("no active client".into()))?;

        let outcome = tokio::time::timeout(RESUME_DEADLINE, async {
            retry_with_backoff(credential_env_present, || async {
                client
                    .resume_session(session_id, serde_json::json!({}))
                    .await
                    .map_err(|e| e.to_string())
            })
            .await
        })
        .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(AgentError::from_message(message, credential_env_present)),
            Err(_elapsed) => Err(AgentError::ResumeTimeout(RESUME_DEADLINE)),
        }
    }

    /// Create a session for `mode`, walking the model-fallback chain on
    /// rejection (§4.1 "Model fallback"). For `Plan` mode, the session ID is
    /// requested as `<work-id>-plan` (§3 `SessionMeta::plan_id_for`); the
    /// agent subprocess is authoritative for the ID it actually returns, so a
    /// mismatch is logged rather than silently corrected.
    async fn create_session_for_mode(&mut self, mode: SessionMode) -> Result<String, AgentError> {
        let requested = match mode {
            SessionMode::Work => self.config.model.clone(),
            SessionMode::Plan => self.config.plan_model.clone().or_else(|| self.config.model.clone()),
        };
        let tool_whitelist: Option<&[&str]> = match mode {
            SessionMode::Work => None,
            SessionMode::Plan => Some(PLAN_MODE_TOOLS),
        };
        let requested_session_id: Option<String> = match mode {
            SessionMode::Work => None,
            SessionMode::Plan => self.work_session_id.as_deref().map(SessionMeta::plan_id_for),
        };

        let mut candidates = vec![requested.clone()];
        for name in MODEL_FALLBACK_CHAIN {
            if candidates.len() > MAX_MODEL_SUBSTITUTIONS {
                break;
            }
            if Some(name.to_string()) != requested {
                candidates.push(Some(name.to_string()));
            }
        }

        let mut last_err = None;
        for model in candidates {
            let options = build_session_options(
                model.as_deref(),
                &self.config,
                tool_whitelist,
                requested_session_id.as_deref(),
            );
            let create_result = match self.client.as_ref() {
                Some(client) => client.create_session(options).await,
                None => return Err(AgentError::Protocol("no active client".into())),
            };
            match create_result {
                Ok(()) => {
                    let session_id = self.await_session_started().await?;
                    if let Some(expected) = &requested_session_id {
                        if &session_id != expected {
                            tracing::warn!(
                                %session_id,
                                expected,
                                "plan session id returned by agent does not match the <work-id>-plan convention"
                            );
                        }
                    }
                    return Ok(session_id);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| AgentError::Protocol("model fallback exhausted".into())))
    }

    async fn resolve_or_create_session(&mut self, resume_hint: Option<&str>) -> Result<String, AgentError> {
        let candidate = resume_hint.map(|s| s.to_string()).or_else(|| {
            if self.config.resume_last_session {
                resume::find_most_recent_session(&self.workspace, self.config.filter_sessions_by_folder)
            } else {
                None
            }
        });

        if let Some(session_id) = candidate {
            match self.resume_with_retry(&session_id).await {
                Ok(()) => return Ok(session_id),
                Err(AgentError::Classified { message, .. }) if is_connection_closed(&message) => {
                    self.recreate_client().await?;
                    if self.resume_with_retry(&session_id).await.is_ok() {
                        return Ok(session_id);
                    }
                }
                Err(_) => {}
            }
        }

        self.create_session_for_mode(SessionMode::Work).await
    }

    /// §4.1 `start`.
    pub async fn start(&mut self, resume_hint: Option<&str>) -> Result<String, AgentError> {
        self.spawn_client().await?;
        let session_id = self.resolve_or_create_session(resume_hint).await?;
        self.work_session_id = Some(session_id.clone());
        self.active_session_id = Some(session_id.clone());
        self.mode = SessionMode::Work;
        self.streams.status.emit(StatusEvent { status: "ready".into() });
        Ok(session_id)
    }

    fn enrich_with_context(&self, text: &str) -> String {
        match &self.active_file_path {
            Some(path) => format!("{text}\n\n[active file: {path}]"),
            None => text.to_string(),
        }
    }

    /// §4.1 `sendMessage`.
    pub async fn send_message(&mut self, text: &str, attachments: Option<Vec<Attachment>>) -> Result<(), AgentError> {
        let mut retried = false;
        loop {
            let enriched = self.enrich_with_context(text);
            let mut atts = attachments.clone().unwrap_or_default();
            atts.extend(expand_path_references(&enriched, &self.workspace));
            let (accepted, rejected) = validate_attachments(&self.model_caps, &atts);
            if !rejected.is_empty() {
                tracing::debug!(?rejected, "attachments rejected by current model capabilities");
            }

            if !retried {
                let timestamp = self.next_timestamp();
                self.streams.output.emit(ChatMessage::user(enriched.clone(), timestamp));
            }

            {
                let client = self
                    .client
                    .as_ref()
                    .ok_or_else(|| AgentError::Protocol("no active client".into()))?;
                client.send_and_wait(&enriched, accepted).await?;
            }

            match self.await_turn_completion().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let session_lost = matches!(e.class(), Some(AgentErrorClass::SessionExpired))
                        || matches!(&e, AgentError::Classified { message, .. } if message.to_lowercase().contains("session deleted") || message.to_lowercase().contains("session invalid"));
                    if session_lost && !retried {
                        self.recover_lost_session().await?;
                        retried = true;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    /// §4.1 "Mid-session session-loss": preserve mode, destroy the dead
    /// session, recreate with identical tool scoping, re-wire (there is
    /// only ever one subscription in this design: `events_rx` itself).
    async fn recover_lost_session(&mut self) -> Result<(), AgentError> {
        let mode = self.mode;
        if let Some(client) = self.client.as_ref() {
            let _ = client.destroy().await;
        }
        let new_id = self.create_session_for_mode(mode).await?;
        match mode {
            SessionMode::Work => self.work_session_id = Some(new_id.clone()),
            SessionMode::Plan => self.plan_session_id = Some(new_id.clone()),
        }
        self.active_session_id = Some(new_id);
        self.streams.status.emit(StatusEvent { status: "session_expired".into() });
        Ok(())
    }

    /// §4.1 `abortMessage`.
    pub async fn abort_message(&mut self) -> Result<(), AgentError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AgentError::Protocol("no active client".into()))?;
        client.abort().await?;
        self.streams.status.emit(StatusEvent { status: "aborted".into() });
        Ok(())
    }

    /// §4.1 `enablePlanMode`.
    pub async fn enable_plan_mode(&mut self) -> Result<(), AgentError> {
        if self.mode == SessionMode::Plan {
            tracing::warn!("enablePlanMode called while already in plan mode; no-op");
            return Ok(());
        }
        let work_id = self
            .work_session_id
            .clone()
            .ok_or_else(|| AgentError::Protocol("no work session to branch a plan from".into()))?;

        self.plan_snapshot = self.read_plan_md(&work_id);

        match self.create_session_for_mode(SessionMode::Plan).await {
            Ok(plan_id) => {
                self.plan_session_id = Some(plan_id.clone());
                self.active_session_id = Some(plan_id);
                self.mode = SessionMode::Plan;
                self.streams.status.emit(StatusEvent { status: "plan_mode_enabled".into() });
                Ok(())
            }
            Err(e) => {
                // Roll back fully: mode, active session, and any leaked
                // plan-session bookkeeping (§8 scenario 5).
                self.mode = SessionMode::Work;
                self.active_session_id = Some(work_id);
                self.plan_session_id = None;
                Err(e)
            }
        }
    }

    /// §4.1 `disablePlanMode`.
    pub async fn disable_plan_mode(&mut self) -> Result<(), AgentError> {
        if self.mode != SessionMode::Plan {
            return Ok(());
        }
        if self.plan_session_id.take().is_some() {
            if let Some(client) = self.client.as_ref() {
                let _ = client.destroy().await;
            }
        }
        self.mode = SessionMode::Work;
        self.active_session_id = self.work_session_id.clone();
        self.streams.status.emit(StatusEvent { status: "plan_mode_disabled".into() });
        Ok(())
    }

    /// §4.1 `acceptPlan`.
    pub async fn accept_plan(&mut self) -> Result<(), AgentError> {
        if self.mode != SessionMode::Plan {
            return Err(AgentError::Protocol("acceptPlan requires plan mode".into()));
        }
        self.plan_snapshot = None;
        self.disable_plan_mode().await?;
        self.streams.status.emit(StatusEvent { status: "plan_accepted".into() });
        self.send_message("Implement the plan described in plan.md.", None).await
    }

    /// §4.1 `rejectPlan`.
    pub async fn reject_plan(&mut self) -> Result<(), AgentError> {
        if self.mode != SessionMode::Plan {
            return Err(AgentError::Protocol("rejectPlan requires plan mode".into()));
        }
        if let (Some(work_id), Some(snapshot)) = (self.work_session_id.clone(), self.plan_snapshot.clone()) {
            if let Some(path) = self.plan_md_path(&work_id) {
                let _ = std::fs::write(path, snapshot);
            }
        }
        self.plan_snapshot = None;
        self.disable_plan_mode().await?;
        self.streams.status.emit(StatusEvent { status: "plan_rejected".into() });
        Ok(())
    }

    /// §4.1 `stop`.
    pub async fn stop(mut self) -> Result<(), AgentError> {
        if let Some(client) = self.client.as_ref() {
            let _ = client.destroy().await;
        }
        self.active_session_id = None;
        if let Some(client) = self.client.take() {
            client.stop().await?;
        }
        self.tool_exec.clear();
        if let Ok(mut store) = self.snapshots.lock() {
            store.cleanup();
        }
        Ok(())
    }
}
