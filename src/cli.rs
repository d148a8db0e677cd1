// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::Parser;

/// The host process: brokers between a user, a locally-spawned agent CLI
/// subprocess, and a sandboxed view. Talks NDJSON on stdin/stdout — one
/// [`cohost_proto::messages::InboundMessage`] per line in, one
/// [`cohost_proto::messages::OutboundMessage`] per line out.
#[derive(Parser, Debug)]
#[command(name = "cohost", version, about)]
pub struct Cli {
    /// Path to an explicit config file layered on top of the discovered ones.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Workspace directory the agent session is anchored to. Defaults to the
    /// current directory.
    #[arg(long, short = 'w')]
    pub workspace: Option<PathBuf>,

    /// Resume this specific session id on the first `ready` instead of
    /// auto-resuming the most recently modified session for the workspace.
    #[arg(long)]
    pub resume: Option<String>,

    /// Increase log verbosity on stderr (repeatable: -v, -vv).
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}
