// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! LCS-based inline diff computation (§4.3, §8).
//!
//! Uses the `similar` crate's `TextDiff` rather than hand-rolling the DP
//! table. `similar::TextDiff::from_lines` performs the longest-common-
//! subsequence walk internally; this module only needs to translate its
//! `ChangeTag` stream into a context-trimmed, truncated line list.

use cohost_proto::messages::{DiffLine, DiffLineKind, InlineDiff};
use similar::{ChangeTag, TextDiff};

const MAX_EMITTED_LINES: usize = 10;
const MAX_CONTEXT_PER_BLOCK: usize = 1;

/// Compute the inline diff between `before` and `after`, already filtered to
/// retain at most one unchanged line adjacent to each change block and
/// truncated to at most 10 emitted lines (§4.3 "Inline diff algorithm").
pub fn compute_inline_diff(before: &str, after: &str) -> InlineDiff {
    let diff = TextDiff::from_lines(before, after);

    // Raw line sequence: one entry per change, trailing newline stripped.
    let raw: Vec<DiffLine> = diff
        .iter_all_changes()
        .map(|change| {
            let kind = match change.tag() {
                ChangeTag::Equal => DiffLineKind::Context,
                ChangeTag::Delete => DiffLineKind::Remove,
                ChangeTag::Insert => DiffLineKind::Add,
            };
            let text = change.value().trim_end_matches('\n').to_string();
            DiffLine { kind, text }
        })
        .collect();

    let filtered = filter_context(raw);
    let total_lines = filtered.len();

    if total_lines > MAX_EMITTED_LINES {
        InlineDiff {
            lines: filtered.into_iter().take(MAX_EMITTED_LINES).collect(),
            truncated: true,
            total_lines,
        }
    } else {
        InlineDiff {
            lines: filtered,
            truncated: false,
            total_lines,
        }
    }
}

/// Collapse runs of `Context` lines down to at most [`MAX_CONTEXT_PER_BLOCK`]
/// lines directly adjacent to each change block (one before, one after);
/// interior context lines of a long unchanged run are dropped entirely.
fn filter_context(raw: Vec<DiffLine>) -> Vec<DiffLine> {
    let n = raw.len();
    let mut keep = vec![false; n];

    for (i, line) in raw.iter().enumerate() {
        if line.kind != DiffLineKind::Context {
            keep[i] = true;
            // Keep up to MAX_CONTEXT_PER_BLOCK context lines immediately
            // before this change.
            let mut kept_before = 0;
            let mut j = i;
            while kept_before < MAX_CONTEXT_PER_BLOCK && j > 0 {
                j -= 1;
                if raw[j].kind == DiffLineKind::Context {
                    keep[j] = true;
                    kept_before += 1;
                } else {
                    break;
                }
            }
            // Keep up to MAX_CONTEXT_PER_BLOCK context lines immediately
            // after this change.
            let mut kept_after = 0;
            let mut j = i;
            while kept_after < MAX_CONTEXT_PER_BLOCK && j + 1 < n {
                j += 1;
                if raw[j].kind == DiffLineKind::Context {
                    keep[j] = true;
                    kept_after += 1;
                } else {
                    break;
                }
            }
        }
    }

    raw.into_iter()
        .zip(keep)
        .filter_map(|(line, k)| k.then_some(line))
        .collect()
}
