// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The configuration surface (§6 "Configuration surface (owned)"), mirrored
//! field-for-field from the spec's table.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Explicit agent binary path, highest priority in path resolution.
    #[serde(default)]
    pub cli_path: Option<String>,
    /// Relax permissioning. Forces `allow_all_tools`/`allow_all_paths`/
    /// `allow_all_urls` to `true` at load time (§6, [[cohost-config]]
    /// "Configuration").
    #[serde(default)]
    pub yolo: bool,
    #[serde(default)]
    pub allow_all_tools: bool,
    #[serde(default)]
    pub allow_all_paths: bool,
    #[serde(default)]
    pub allow_all_urls: bool,
    #[serde(default)]
    pub allow_tools: Vec<String>,
    #[serde(default)]
    pub deny_tools: Vec<String>,
    #[serde(default)]
    pub allow_urls: Vec<String>,
    #[serde(default)]
    pub deny_urls: Vec<String>,
    #[serde(default)]
    pub add_dirs: Vec<String>,
    /// Custom agent name.
    #[serde(default)]
    pub agent: Option<String>,
    /// Requested model id.
    #[serde(default)]
    pub model: Option<String>,
    /// Model for plan sessions.
    #[serde(default)]
    pub plan_model: Option<String>,
    /// Restrict auto-resume to sessions anchored at the current workspace.
    #[serde(default = "default_true")]
    pub filter_sessions_by_folder: bool,
    #[serde(default = "default_true")]
    pub resume_last_session: bool,
    /// Forwarded to an external auth flow.
    #[serde(default)]
    pub gh_sso_enterprise_slug: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Force the permission presets on when `yolo` is set. Resolved once at
    /// load time, not re-checked at every call site.
    pub fn apply_yolo(&mut self) {
        if self.yolo {
            self.allow_all_tools = true;
            self.allow_all_paths = true;
            self.allow_all_urls = true;
        }
    }
}
