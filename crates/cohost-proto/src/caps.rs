// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Model-capability checks for attachment validation (§4.1 `sendMessage`,
//! "delegated"). Instead of silently stripping unsupported attachments,
//! each one is checked and the accepted/rejected split is reported back
//! to the view via the `attachmentValidation` outbound payload (§4.2).

use crate::messages::{Attachment, AttachmentKind};

#[derive(Debug, Clone, Default)]
pub struct ModelCapabilities {
    pub supports_images: bool,
    pub supports_files: bool,
    pub max_attachment_bytes: Option<u64>,
}

impl ModelCapabilities {
    pub fn supports_kind(&self, kind: AttachmentKind) -> bool {
        match kind {
            AttachmentKind::Image => self.supports_images,
            AttachmentKind::File => self.supports_files,
        }
    }
}

/// Split attachments into accepted/rejected path lists for the current
/// model's capabilities. Checks both modality and, when
/// `max_attachment_bytes` is set, file size (stat'd directly; a file that
/// can't be stat'd is passed through and left for the caller to fail on).
pub fn validate_attachments(
    caps: &ModelCapabilities,
    attachments: &[Attachment],
) -> (Vec<String>, Vec<String>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for a in attachments {
        if !caps.supports_kind(a.kind) {
            rejected.push(a.path.clone());
            continue;
        }
        if let Some(max_bytes) = caps.max_attachment_bytes {
            if let Ok(metadata) = std::fs::metadata(&a.path) {
                if metadata.len() > max_bytes {
                    rejected.push(a.path.clone());
                    continue;
                }
            }
        }
        accepted.push(a.path.clone());
    }
    (accepted, rejected)
}
