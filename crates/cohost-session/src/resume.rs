// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Auto-resume candidate discovery (§6 "Session-state layout (consumed,
//! read-only)", §4.1 `start`: "resume the most recently modified session
//! matching the workspace", and `Config::filter_sessions_by_folder`:
//! when unset, the workspace filter is dropped and the most recently
//! modified session anywhere under the session-state root is used).
//!
//! Sessions persist under `<home>/.copilot/session-state/<sessionId>/` with
//! an `events.jsonl` file whose first line is expected to carry the
//! workspace path the session was anchored at. This module never writes to
//! that tree — it is read-only, owned by the agent CLI.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FirstEvent {
    #[serde(default)]
    workspace: Option<String>,
    #[serde(default)]
    cwd: Option<String>,
}

fn session_state_root() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".copilot").join("session-state"))
}

/// Find the most recently modified session directory. When `filter_by_folder`
/// is `true`, only sessions whose first recorded event's workspace/cwd
/// matches `workspace` are considered; when `false`, the most recently
/// modified session anywhere under the session-state root is returned
/// regardless of which workspace it was anchored at.
pub fn find_most_recent_session(workspace: &Path, filter_by_folder: bool) -> Option<String> {
    find_most_recent_session_in(&session_state_root()?, workspace, filter_by_folder)
}

fn find_most_recent_session_in(root: &Path, workspace: &Path, filter_by_folder: bool) -> Option<String> {
    let entries = fs::read_dir(root).ok()?;
    let mut best: Option<(std::time::SystemTime, String)> = None;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if filter_by_folder {
            let events_path = path.join("events.jsonl");
            let Ok(contents) = fs::read_to_string(&events_path) else {
                continue;
            };
            let Some(first_line) = contents.lines().next() else {
                continue;
            };
            let Ok(first_event) = serde_json::from_str::<FirstEvent>(first_line) else {
                continue;
            };
            let session_workspace = first_event.workspace.or(first_event.cwd);
            if session_workspace.as_deref() != Some(&*workspace.display().to_string()) {
                continue;
            }
        }

        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(modified) = metadata.modified() else { continue };

        let session_id = path.file_name()?.to_string_lossy().to_string();
        match &best {
            Some((best_time, _)) if *best_time >= modified => {}
            _ => best = Some((modified, session_id)),
        }
    }

    best.map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn finds_session_matching_workspace() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Path::new("/w/project");

        let s1 = root.path().join("session-a");
        fs::create_dir(&s1).unwrap();
        fs::write(s1.join("events.jsonl"), r#"{"workspace":"/w/other"}"#).unwrap();

        sleep(Duration::from_millis(10));

        let s2 = root.path().join("session-b");
        fs::create_dir(&s2).unwrap();
        fs::write(
            s2.join("events.jsonl"),
            r#"{"workspace":"/w/project"}
{"type":"session.idle"}"#,
        )
        .unwrap();

        let found = find_most_recent_session_in(root.path(), workspace, true);
        assert_eq!(found.as_deref(), Some("session-b"));
    }

    #[test]
    fn picks_most_recently_modified_among_matches() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Path::new("/w/project");

        let s1 = root.path().join("session-old");
        fs::create_dir(&s1).unwrap();
        fs::write(s1.join("events.jsonl"), r#"{"workspace":"/w/project"}"#).unwrap();

        sleep(Duration::from_millis(10));

        let s2 = root.path().join("session-new");
        fs::create_dir(&s2).unwrap();
        fs::write(s2.join("events.jsonl"), r#"{"cwd":"/w/project"}"#).unwrap();

        let found = find_most_recent_session_in(root.path(), workspace, true);
        assert_eq!(found.as_deref(), Some("session-new"));
    }

    #[test]
    fn returns_none_when_no_session_matches() {
        let root = tempfile::tempdir().unwrap();
        let s1 = root.path().join("session-a");
        fs::create_dir(&s1).unwrap();
        fs::write(s1.join("events.jsonl"), r#"{"workspace":"/w/other"}"#).unwrap();

        let found = find_most_recent_session_in(root.path(), Path::new("/w/project"), true);
        assert!(found.is_none());
    }

    #[test]
    fn unfiltered_lookup_ignores_workspace_and_picks_globally_most_recent() {
        let root = tempfile::tempdir().unwrap();

        let s1 = root.path().join("session-other-workspace");
        fs::create_dir(&s1).unwrap();
        fs::write(s1.join("events.jsonl"), r#"{"workspace":"/w/other"}"#).unwrap();

        sleep(Duration::from_millis(10));

        let s2 = root.path().join("session-project");
        fs::create_dir(&s2).unwrap();
        fs::write(s2.join("events.jsonl"), r#"{"workspace":"/w/project"}"#).unwrap();

        let found = find_most_recent_session_in(root.path(), Path::new("/w/unrelated"), false);
        assert_eq!(found.as_deref(), Some("session-project"));
    }
}
