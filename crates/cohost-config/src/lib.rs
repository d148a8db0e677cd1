// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Configuration surface for the host/view/agent bridge (§6). Layered YAML
//! loading with yolo-forces-presets resolved once at load time.

mod loader;
mod schema;

pub use loader::load;
pub use schema::*;
