// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("the peer side of this router has been dropped")]
    Closed,
    #[error("attempted to send {attempted} before init was sent in response to ready")]
    InitNotYetSent { attempted: &'static str },
}
