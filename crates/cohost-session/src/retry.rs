// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Retry-with-backoff for resume operations (§4.1 "Startup resume with
//! recovery", §8 boundary behavior: "at most 3 attempts, elapsed wall time
//! ≤ 1+2+4 = 7 seconds plus per-attempt time").

use std::future::Future;
use std::time::Duration;

use cohost_proto::{classify, AgentErrorClass};

const BACKOFF_STEPS_MS: [u64; 3] = [1000, 2000, 4000];
const MAX_ATTEMPTS: usize = 3;

/// Retry `op` up to [`MAX_ATTEMPTS`] times with backoff 1s → 2s → 4s between
/// attempts, classifying each failure's message to decide whether to retry
/// at all. `session_expired` and `authentication` skip retries entirely —
/// the first such failure is returned immediately.
pub async fn retry_with_backoff<F, Fut, T>(
    credential_env_present: bool,
    mut op: F,
) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut last_err = String::new();
    for attempt in 0..MAX_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(message) => {
                let class = classify(&message, credential_env_present);
                last_err = message;
                if !class.is_retriable() {
                    return Err(last_err);
                }
                if matches!(
                    class,
                    AgentErrorClass::SessionExpired | AgentErrorClass::Authentication(_)
                ) {
                    return Err(last_err);
                }
                if attempt + 1 < MAX_ATTEMPTS {
                    tokio::time::sleep(Duration::from_millis(BACKOFF_STEPS_MS[attempt])).await;
                }
            }
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_second_attempt_after_retriable_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let result = retry_with_backoff(true, move || {
            let calls = calls2.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err("network timeout".to_string())
                } else {
                    Ok("resumed")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "resumed");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn session_expired_skips_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let result: Result<(), String> = retry_with_backoff(true, move || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("session does not exist".to_string())
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_at_most_three_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let result: Result<(), String> = retry_with_backoff(true, move || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("network timeout".to_string())
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
