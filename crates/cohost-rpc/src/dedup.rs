// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Flat time-window dedup/debounce for the router. Deliberately not built on
//! `governor`: GCRA token buckets answer "how many per second", not "is this
//! the same thing I just saw a moment ago" — a plain `Instant` comparison is
//! a better fit for both windows here.

use tokio::time::{Duration, Instant};

const DEDUP_WINDOW: Duration = Duration::from_millis(1000);
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Drops an inbound `userMessageSend` if its text repeats within
/// [`DEDUP_WINDOW`] of the last one seen.
#[derive(Default)]
pub struct InboundDedup {
    last: Option<(String, Instant)>,
}

impl InboundDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `text` should be let through, `false` if it's a
    /// repeat within the window.
    pub fn admit(&mut self, text: &str) -> bool {
        let now = Instant::now();
        if let Some((last_text, last_at)) = &self.last {
            if last_text == text && now.duration_since(*last_at) < DEDUP_WINDOW {
                return false;
            }
        }
        self.last = Some((text.to_string(), now));
        true
    }
}

/// Caps the rate of an outbound broadcast stream to one per
/// [`DEBOUNCE_WINDOW`].
#[derive(Default)]
pub struct OutboundDebounce {
    last_sent_at: Option<Instant>,
}

impl OutboundDebounce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a send is allowed right now.
    pub fn admit(&mut self) -> bool {
        let now = Instant::now();
        if let Some(last_at) = self.last_sent_at {
            if now.duration_since(last_at) < DEBOUNCE_WINDOW {
                return false;
            }
        }
        self.last_sent_at = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn dedup_drops_identical_text_within_window() {
        let mut d = InboundDedup::new();
        assert!(d.admit("hello"));
        assert!(!d.admit("hello"));
        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(d.admit("hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn dedup_admits_distinct_text_immediately() {
        let mut d = InboundDedup::new();
        assert!(d.admit("hello"));
        assert!(d.admit("world"));
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_caps_rate_of_admits() {
        let mut d = OutboundDebounce::new();
        assert!(d.admit());
        assert!(!d.admit());
        tokio::time::advance(Duration::from_millis(501)).await;
        assert!(d.admit());
    }
}
