// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Agent binary path resolution (§4.1 `start`, §6 "Configuration surface").
//!
//! Priority order: explicitly configured path, then a bundled
//! platform-specific binary shipped alongside this executable, then a search
//! of the OS executable search path — a fixed priority list walked until one
//! candidate exists.

use std::path::{Path, PathBuf};

use cohost_proto::AgentError;

const DEFAULT_BINARY_NAME: &str = "agent-cli";

/// Resolve the agent binary to launch. `agent` is the configured custom
/// agent name (`Config::agent`), used as the bundled/PATH binary name in
/// place of the default when set. Returns
/// [`AgentError::PathUnresolved`] if none of the three tiers yields an
/// existing, executable file.
pub fn resolve_agent_path(explicit: Option<&str>, agent: Option<&str>) -> Result<PathBuf, AgentError> {
    let binary_name = agent.unwrap_or(DEFAULT_BINARY_NAME);

    if let Some(path) = explicit {
        let candidate = PathBuf::from(path);
        if is_executable(&candidate) {
            return Ok(candidate);
        }
    }

    if let Some(bundled) = bundled_binary_path(binary_name) {
        if is_executable(&bundled) {
            return Ok(bundled);
        }
    }

    if let Some(found) = search_path(binary_name) {
        return Ok(found);
    }

    Err(AgentError::PathUnresolved)
}

/// A platform-specific binary shipped next to this executable, e.g.
/// `<exe_dir>/agent-cli`.
fn bundled_binary_path(binary_name: &str) -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    Some(dir.join(binary_name))
}

/// Search each directory on `PATH` for an executable named `name`.
fn search_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(b"#!/bin/sh\n").unwrap();
        let mut perms = f.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn explicit_path_wins_when_executable() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("my-agent");
        make_executable(&bin);
        let resolved = resolve_agent_path(Some(bin.to_str().unwrap()), None).unwrap();
        assert_eq!(resolved, bin);
    }

    #[test]
    fn explicit_path_falls_through_when_missing() {
        // Neither the explicit nor the bundled/PATH tiers will resolve in a
        // clean test environment without PATH tampering, so this exercises
        // only that a missing explicit path does not short-circuit with Ok.
        let result = resolve_agent_path(Some("/nonexistent/path/to/agent"), None);
        if let Ok(resolved) = result {
            assert_ne!(resolved, PathBuf::from("/nonexistent/path/to/agent"));
        }
    }

    #[test]
    fn no_candidates_anywhere_is_path_unresolved() {
        let original = std::env::var_os("PATH");
        std::env::set_var("PATH", "");
        let result = resolve_agent_path(None, None);
        if let Some(p) = original {
            std::env::set_var("PATH", p);
        }
        assert!(matches!(result, Err(AgentError::PathUnresolved)));
    }

    #[test]
    #[cfg(unix)]
    fn custom_agent_name_is_searched_on_path() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("my-custom-agent");
        make_executable(&bin);

        let original = std::env::var_os("PATH");
        std::env::set_var("PATH", dir.path());
        let result = resolve_agent_path(None, Some("my-custom-agent"));
        if let Some(p) = original {
            std::env::set_var("PATH", p);
        }
        assert_eq!(result.unwrap(), bin);
    }
}
