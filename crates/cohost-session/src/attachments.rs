// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `@path` attachment expansion (§4.1 `sendMessage` "delegated"). A small
//! hand-rolled scan rather than a general-purpose parser, since the grammar
//! is a single token shape.

use std::path::Path;

use cohost_proto::messages::{Attachment, AttachmentKind};
use regex::Regex;

fn path_reference_pattern() -> Regex {
    // `@` followed by a path-looking token: no whitespace, stops at the
    // first character that can't belong to a path.
    Regex::new(r"@([^\s@]+)").expect("static regex is valid")
}

fn kind_for(path: &str) -> AttachmentKind {
    let lower = path.to_ascii_lowercase();
    const IMAGE_EXTS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp", ".bmp"];
    if IMAGE_EXTS.iter().any(|ext| lower.ends_with(ext)) {
        AttachmentKind::Image
    } else {
        AttachmentKind::File
    }
}

/// Expand every `@path` reference in `text` into an [`Attachment`], resolved
/// relative to `workspace` when not absolute. Only references to files that
/// actually exist are expanded — a bare `@mention` of something else in the
/// prompt is left as plain text.
pub fn expand_path_references(text: &str, workspace: &Path) -> Vec<Attachment> {
    let pattern = path_reference_pattern();
    let mut attachments = Vec::new();
    for cap in pattern.captures_iter(text) {
        let raw = &cap[1];
        let candidate = Path::new(raw);
        let resolved = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            workspace.join(candidate)
        };
        if resolved.is_file() {
            attachments.push(Attachment {
                path: resolved.display().to_string(),
                kind: kind_for(raw),
            });
        }
    }
    attachments
}
