// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest
/// priority. Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/cohost/config.yaml"));
    paths.push(PathBuf::from("/etc/cohost/config.yml"));

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/cohost/config.yaml"));
        paths.push(home.join(".config/cohost/config.yml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("cohost/config.yaml"));
        paths.push(cfg.join("cohost/config.yml"));
    }

    paths.push(PathBuf::from(".cohost/config.yaml"));
    paths.push(PathBuf::from(".cohost/config.yml"));
    paths.push(PathBuf::from(".cohost.yaml"));
    paths.push(PathBuf::from(".cohost.yml"));

    paths
}

/// Load configuration by merging all discovered YAML files, then an
/// explicit `extra` path if given, then apply the yolo preset resolution.
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };
    config.apply_yolo();
    Ok(config)
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_with_no_files_returns_defaults() {
        let cfg = load(None).unwrap();
        assert!(!cfg.yolo);
        assert!(cfg.resume_last_session);
    }

    #[test]
    fn load_returns_error_when_explicit_path_missing() {
        let result = load(Some(Path::new("/tmp/cohost_nonexistent_config_xyz.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_explicit_file_applies_yolo_preset() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "yolo: true\nmodel: gpt-5").unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.model.as_deref(), Some("gpt-5"));
        assert!(cfg.allow_all_tools);
        assert!(cfg.allow_all_paths);
        assert!(cfg.allow_all_urls);
    }

    #[test]
    fn merge_nested_scalars_src_wins() {
        let mut dst: serde_yaml::Value = serde_yaml::from_str("model: gpt-4\nyolo: false").unwrap();
        let src: serde_yaml::Value = serde_yaml::from_str("model: gpt-5").unwrap();
        merge_yaml(&mut dst, src);
        assert_eq!(dst["model"].as_str(), Some("gpt-5"));
        assert_eq!(dst["yolo"].as_bool(), Some(false));
    }
}
