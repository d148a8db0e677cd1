// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Three-tier pre-edit file capture (§4.3).
//!
//! Tier 1 (primary): capture fires the moment an `edit`/`create`-shaped tool
//! call appears in an `assistant.message` toolRequest, before the agent has
//! actually touched the file.
//! Tier 2 (safety net): a pre-invoke hook captures again, but only if nothing
//! is already pending for that path — covers tool calls the router didn't
//! see as part of a toolRequest (e.g. a resumed session).
//! Tier 3 (promotion + fallback): once `execution_start` arrives with the
//! tool call's real ID, the path-keyed pending snapshot is re-keyed by that
//! ID; if nothing was pending at all, a last-resort capture happens here,
//! logged as a warning since the "before" content may already be stale.
//!
//! Pending captures are keyed by path until the real tool call ID is known,
//! then re-keyed as the agent's event stream reveals it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use cohost_proto::messages::OutboundMessage;

use crate::diff::compute_inline_diff;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write temp snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Tool names that participate in the snapshot pipeline. Anything else is
/// ignored by every tier.
const EDIT_OR_CREATE_TOOLS: &[&str] = &["edit_file", "create_file", "apply_patch", "write_file"];

/// Tool names whose target path is known not to exist yet; their "before"
/// is an empty placeholder so the diff renders as pure additions.
const CREATE_TOOLS: &[&str] = &["create_file", "write_file"];

pub fn is_edit_or_create(tool_name: &str) -> bool {
    EDIT_OR_CREATE_TOOLS.contains(&tool_name)
}

fn is_create(tool_name: &str) -> bool {
    CREATE_TOOLS.contains(&tool_name)
}

/// A single captured "before" state, pending correlation to a tool-call ID
/// or already correlated and awaiting `execution_complete`.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    pub tool_call_id: Option<String>,
    pub original_path: PathBuf,
    pub temp_path: PathBuf,
    pub existed_before: bool,
}

/// Owns every in-flight snapshot for one session. Temp files live under a
/// dedicated directory and are removed as soon as they're no longer needed —
/// on diff emission, on tool failure, or on session cleanup.
pub struct SnapshotStore {
    pending_by_path: HashMap<PathBuf, FileSnapshot>,
    by_tool_call_id: HashMap<String, FileSnapshot>,
    temp_dir: PathBuf,
    counter: AtomicU64,
}

impl SnapshotStore {
    pub fn new(temp_dir: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&temp_dir)?;
        Ok(Self {
            pending_by_path: HashMap::new(),
            by_tool_call_id: HashMap::new(),
            temp_dir,
            counter: AtomicU64::new(0),
        })
    }

    fn next_temp_path(&self) -> PathBuf {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        self.temp_dir.join(format!("snapshot-{id}"))
    }

    /// Tier 1/2 capture. If a pending snapshot already exists for `path`, its
    /// temp file is deleted before the new one is created (§4.3 capture
    /// semantics) — the newest observation of "before" wins.
    pub fn capture_by_path(
        &mut self,
        tool_name: &str,
        path: &Path,
    ) -> Result<(), SnapshotError> {
        if let Some(stale) = self.pending_by_path.remove(path) {
            let _ = fs::remove_file(&stale.temp_path);
        }

        let existed_before = path.exists();
        let temp_path = self.next_temp_path();

        if is_create(tool_name) || !existed_before {
            fs::write(&temp_path, b"").map_err(|source| SnapshotError::Write {
                path: temp_path.clone(),
                source,
            })?;
        } else {
            fs::copy(path, &temp_path).map_err(|source| SnapshotError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        }

        self.pending_by_path.insert(
            path.to_path_buf(),
            FileSnapshot {
                tool_call_id: None,
                original_path: path.to_path_buf(),
                temp_path,
                existed_before,
            },
        );
        Ok(())
    }

    /// Only captures if nothing is already pending for `path` (Tier 2 guard).
    pub fn capture_if_absent(&mut self, tool_name: &str, path: &Path) -> Result<(), SnapshotError> {
        if self.pending_by_path.contains_key(path) {
            return Ok(());
        }
        self.capture_by_path(tool_name, path)
    }

    /// Tier 3 promotion: re-key a pending path-scoped snapshot by the real
    /// tool-call ID once `execution_start` reveals it. The temp file is not
    /// moved, only the map entry.
    pub fn correlate_to_tool_call_id(&mut self, path: &Path, tool_call_id: &str) -> bool {
        let Some(mut snapshot) = self.pending_by_path.remove(path) else {
            return false;
        };
        snapshot.tool_call_id = Some(tool_call_id.to_string());
        self.by_tool_call_id.insert(tool_call_id.to_string(), snapshot);
        true
    }

    /// Tier 3 fallback: `execution_start` arrived with no pending snapshot
    /// for `path` at all. Captures now, best-effort — the "before" may
    /// already reflect a partial write the agent made before this handler
    /// ran. Callers should log a warning when this returns `Ok(())`.
    pub fn fallback_capture(
        &mut self,
        tool_name: &str,
        path: &Path,
        tool_call_id: &str,
    ) -> Result<(), SnapshotError> {
        self.capture_by_path(tool_name, path)?;
        self.correlate_to_tool_call_id(path, tool_call_id);
        Ok(())
    }

    /// `execution_complete` handling (§4.3). On success, computes the diff
    /// and returns the `diffAvailable` payload to forward to the view; on
    /// failure, cleans up silently with no diff emitted. Either way the
    /// snapshot is removed and its temp file deleted.
    pub fn on_execution_complete(
        &mut self,
        tool_call_id: &str,
        success: bool,
        title: impl Into<String>,
    ) -> Result<Option<OutboundMessage>, SnapshotError> {
        let Some(snapshot) = self.by_tool_call_id.remove(tool_call_id) else {
            return Ok(None);
        };

        if !success {
            let _ = fs::remove_file(&snapshot.temp_path);
            return Ok(None);
        }

        let before = fs::read_to_string(&snapshot.temp_path).map_err(|source| SnapshotError::Read {
            path: snapshot.temp_path.clone(),
            source,
        })?;
        let after = fs::read_to_string(&snapshot.original_path).map_err(|source| SnapshotError::Read {
            path: snapshot.original_path.clone(),
            source,
        })?;
        let diff = compute_inline_diff(&before, &after);
        let _ = fs::remove_file(&snapshot.temp_path);

        Ok(Some(OutboundMessage::DiffAvailable {
            tool_call_id: tool_call_id.to_string(),
            before_uri: snapshot.temp_path.display().to_string(),
            after_uri: snapshot.original_path.display().to_string(),
            title: title.into(),
            diff,
        }))
    }

    /// Session stop / orphan sweep: every outstanding snapshot (pending or
    /// correlated) has its temp file removed and is dropped from both maps.
    pub fn cleanup(&mut self) {
        for (_, snapshot) in self.pending_by_path.drain() {
            let _ = fs::remove_file(&snapshot.temp_path);
        }
        for (_, snapshot) in self.by_tool_call_id.drain() {
            let _ = fs::remove_file(&snapshot.temp_path);
        }
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending_by_path.len()
    }

    #[cfg(test)]
    fn correlated_len(&self) -> usize {
        self.by_tool_call_id.len()
    }
}

impl Drop for SnapshotStore {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohost_proto::messages::DiffLineKind;
    use tempfile::tempdir;

    fn store() -> (SnapshotStore, tempfile::TempDir) {
        let workdir = tempdir().unwrap();
        let temp_dir = workdir.path().join("snapshots");
        (SnapshotStore::new(temp_dir).unwrap(), workdir)
    }

    #[test]
    fn scenario_1_snapshot_primary_path() {
        // §8 end-to-end scenario 1: edit_file on an existing file, tool
        // succeeds, diffAvailable is emitted with the computed diff.
        let (mut store, workdir) = store();
        let target = workdir.path().join("file.txt");
        fs::write(&target, "L1\nL2\n").unwrap();

        store.capture_by_path("edit_file", &target).unwrap();
        assert_eq!(store.pending_len(), 1);

        assert!(store.correlate_to_tool_call_id(&target, "call-1"));
        assert_eq!(store.pending_len(), 0);
        assert_eq!(store.correlated_len(), 1);

        // Agent performs the edit.
        fs::write(&target, "L1\nL2 modified\n").unwrap();

        let msg = store
            .on_execution_complete("call-1", true, "file.txt")
            .unwrap()
            .expect("diff should be emitted on success");
        match msg {
            OutboundMessage::DiffAvailable { diff, tool_call_id, .. } => {
                assert_eq!(tool_call_id, "call-1");
                assert!(diff.lines.iter().any(|l| l.kind == DiffLineKind::Remove));
                assert!(diff.lines.iter().any(|l| l.kind == DiffLineKind::Add));
            }
            other => panic!("expected DiffAvailable, got {other:?}"),
        }
        assert_eq!(store.correlated_len(), 0);
    }

    #[test]
    fn scenario_2_create_tool_captures_empty_placeholder() {
        let (mut store, workdir) = store();
        let target = workdir.path().join("new_file.txt");
        assert!(!target.exists());

        store.capture_by_path("create_file", &target).unwrap();
        store.correlate_to_tool_call_id(&target, "call-2");

        fs::write(&target, "hello\n").unwrap();
        let msg = store
            .on_execution_complete("call-2", true, "new_file.txt")
            .unwrap()
            .unwrap();
        match msg {
            OutboundMessage::DiffAvailable { diff, .. } => {
                assert_eq!(diff.lines.len(), 1);
                assert_eq!(diff.lines[0].kind, DiffLineKind::Add);
            }
            other => panic!("expected DiffAvailable, got {other:?}"),
        }
    }

    #[test]
    fn failed_tool_emits_no_diff_and_cleans_up() {
        let (mut store, workdir) = store();
        let target = workdir.path().join("file.txt");
        fs::write(&target, "a\n").unwrap();

        store.capture_by_path("edit_file", &target).unwrap();
        store.correlate_to_tool_call_id(&target, "call-3");
        let temp_path = store.by_tool_call_id.get("call-3").unwrap().temp_path.clone();

        let msg = store.on_execution_complete("call-3", false, "file.txt").unwrap();
        assert!(msg.is_none());
        assert!(!temp_path.exists());
        assert_eq!(store.correlated_len(), 0);
    }

    #[test]
    fn repeated_capture_for_same_path_replaces_pending_snapshot() {
        let (mut store, workdir) = store();
        let target = workdir.path().join("file.txt");
        fs::write(&target, "v1\n").unwrap();
        store.capture_by_path("edit_file", &target).unwrap();
        let first_temp = store.pending_by_path.get(&target).unwrap().temp_path.clone();

        fs::write(&target, "v2\n").unwrap();
        store.capture_by_path("edit_file", &target).unwrap();
        assert_eq!(store.pending_len(), 1);
        assert!(!first_temp.exists(), "stale temp file should be deleted");
    }

    #[test]
    fn capture_if_absent_is_a_no_op_when_already_pending() {
        let (mut store, workdir) = store();
        let target = workdir.path().join("file.txt");
        fs::write(&target, "v1\n").unwrap();
        store.capture_by_path("edit_file", &target).unwrap();
        let temp_path = store.pending_by_path.get(&target).unwrap().temp_path.clone();

        fs::write(&target, "v2\n").unwrap();
        store.capture_if_absent("edit_file", &target).unwrap();
        let unchanged = store.pending_by_path.get(&target).unwrap().temp_path.clone();
        assert_eq!(temp_path, unchanged, "tier 2 must not overwrite a tier 1 capture");
    }

    #[test]
    fn fallback_capture_promotes_directly_to_correlated() {
        let (mut store, workdir) = store();
        let target = workdir.path().join("file.txt");
        fs::write(&target, "a\n").unwrap();

        store.fallback_capture("edit_file", &target, "call-4").unwrap();
        assert_eq!(store.pending_len(), 0);
        assert_eq!(store.correlated_len(), 1);
    }

    #[test]
    fn cleanup_removes_every_temp_file_and_clears_both_maps() {
        let (mut store, workdir) = store();
        let a = workdir.path().join("a.txt");
        let b = workdir.path().join("b.txt");
        fs::write(&a, "a\n").unwrap();
        fs::write(&b, "b\n").unwrap();

        store.capture_by_path("edit_file", &a).unwrap();
        store.capture_by_path("edit_file", &b).unwrap();
        store.correlate_to_tool_call_id(&b, "call-5");

        let a_temp = store.pending_by_path.get(&a).unwrap().temp_path.clone();
        let b_temp = store.by_tool_call_id.get("call-5").unwrap().temp_path.clone();

        store.cleanup();
        assert!(!a_temp.exists());
        assert!(!b_temp.exists());
        assert_eq!(store.pending_len(), 0);
        assert_eq!(store.correlated_len(), 0);
    }

    #[test]
    fn is_edit_or_create_recognizes_known_tools_only() {
        assert!(is_edit_or_create("edit_file"));
        assert!(is_edit_or_create("create_file"));
        assert!(!is_edit_or_create("read_file"));
        assert!(!is_edit_or_create("run_command"));
    }
}
