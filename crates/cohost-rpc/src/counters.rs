// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-type message tallying and periodic summary logging (§4.2
//! "Observability"). A loop/runaway detector: a summary interval under 100ms
//! means something is spinning, so that summary is logged at `warn` instead
//! of `info`.

use std::collections::HashMap;
use tokio::time::Instant;

const SUMMARY_EVERY: u64 = 100;
const RUNAWAY_THRESHOLD: std::time::Duration = std::time::Duration::from_millis(100);

pub struct Counters {
    direction: &'static str,
    total: u64,
    per_type: HashMap<&'static str, u64>,
    last_summary_at: Instant,
    last_summary_total: u64,
}

impl Counters {
    pub fn new(direction: &'static str) -> Self {
        Self {
            direction,
            total: 0,
            per_type: HashMap::new(),
            last_summary_at: Instant::now(),
            last_summary_total: 0,
        }
    }

    /// Record one message of `kind`. Every [`SUMMARY_EVERY`] messages, emits
    /// a summary log — elevated to `warn` if less than [`RUNAWAY_THRESHOLD`]
    /// elapsed since the previous summary.
    pub fn record(&mut self, kind: &'static str) {
        self.total += 1;
        *self.per_type.entry(kind).or_insert(0) += 1;

        if self.total - self.last_summary_total >= SUMMARY_EVERY {
            let elapsed = self.last_summary_at.elapsed();
            let breakdown: Vec<(&str, u64)> = self.per_type.iter().map(|(k, v)| (*k, *v)).collect();
            if elapsed < RUNAWAY_THRESHOLD {
                tracing::warn!(
                    direction = self.direction,
                    total = self.total,
                    ?elapsed,
                    ?breakdown,
                    "message summary interval suspiciously short — possible loop"
                );
            } else {
                tracing::info!(
                    direction = self.direction,
                    total = self.total,
                    ?elapsed,
                    ?breakdown,
                    "message summary"
                );
            }
            self.last_summary_at = Instant::now();
            self.last_summary_total = self.total;
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count_for(&self, kind: &str) -> u64 {
        self.per_type.get(kind).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_total_and_per_type() {
        let mut c = Counters::new("inbound");
        c.record("ready");
        c.record("ready");
        c.record("abort");
        assert_eq!(c.total(), 3);
        assert_eq!(c.count_for("ready"), 2);
        assert_eq!(c.count_for("abort"), 1);
        assert_eq!(c.count_for("never_seen"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn summary_fires_every_hundred_messages() {
        let mut c = Counters::new("outbound");
        for _ in 0..99 {
            c.record("status");
        }
        assert_eq!(c.last_summary_total, 0);
        c.record("status");
        assert_eq!(c.last_summary_total, 100);
    }
}
