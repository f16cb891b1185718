//! Per-endpoint fair-use delay state machine (spec §4.5): computes the
//! next-call delay under success and error regimes, and exposes a
//! cancellable sleep.

mod prettify;

pub use prettify::prettify_seconds;

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("sleep cancelled by user request")]
pub struct Cancelled;

/// The two endpoints this workspace drives each have a distinct backoff
/// policy (spec §4.5); everything else about the state machine is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    PrefixList,
    FullHash,
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs() as i64
}

/// Owns `next_call_ts` and `error_count` for one endpoint, plus a shared
/// cancellation flag so an in-progress sleep can be aborted and unwound
/// cleanly (spec §5).
pub struct DelayController {
    endpoint: Endpoint,
    next_call_ts: AtomicI64,
    error_count: AtomicU32,
    discard_fair_use: bool,
    stop_delay: Arc<AtomicBool>,
}

impl DelayController {
    /// Plain constructor; `next_call_ts` starts at `now` (no delay on the
    /// first call).
    pub fn new(endpoint: Endpoint, discard_fair_use: bool) -> Self {
        Self {
            endpoint,
            next_call_ts: AtomicI64::new(now_unix()),
            error_count: AtomicU32::new(0),
            discard_fair_use,
            stop_delay: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The prefix-list client seeds an extra `rand(0, 300)` second jitter
    /// on construction to desynchronize a fleet of clients polling at the
    /// same moment.
    pub fn new_prefix_list(discard_fair_use: bool) -> Self {
        let controller = Self::new(Endpoint::PrefixList, discard_fair_use);
        let jitter = rand::thread_rng().gen_range(0..=300);
        controller.set_next_call_timeout(jitter);
        controller
    }

    pub fn new_full_hash(discard_fair_use: bool) -> Self {
        Self::new(Endpoint::FullHash, discard_fair_use)
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_delay.clone()
    }

    pub fn set_next_call_timeout(&self, delay_seconds: i64) {
        debug!("next query will be delayed {delay_seconds} seconds");
        self.next_call_ts.store(now_unix() + delay_seconds, Ordering::SeqCst);
    }

    /// A successful round-trip resets the error streak and reseeds
    /// `next_call_ts` from the server-supplied delay.
    pub fn on_success(&self, server_delay_seconds: i64) {
        self.error_count.store(0, Ordering::SeqCst);
        self.set_next_call_timeout(server_delay_seconds);
    }

    /// The original resets `_error_count` on *any* non-exception HTTP
    /// response, independent of whether the body later parses — callers
    /// that need to reset the streak before they know the server-supplied
    /// delay (e.g. before parsing the data-response envelope) use this
    /// instead of [`DelayController::on_success`].
    pub fn mark_http_success(&self) {
        self.error_count.store(0, Ordering::SeqCst);
    }

    /// Any non-2xx response (or timeout) increments the error streak
    /// before the caller propagates the failure.
    pub fn on_error(&self) {
        self.error_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::SeqCst)
    }

    /// Computes the delay to the next permitted call without sleeping.
    pub fn fair_use_delay(&self) -> i64 {
        let now = now_unix();
        let next_call_ts = self.next_call_ts.load(Ordering::SeqCst);
        let errors = self.error_count.load(Ordering::SeqCst);
        match self.endpoint {
            Endpoint::PrefixList => match errors {
                0 => next_call_ts - now,
                1 => 60,
                n => 60 * error_jitter_prefix(n).min(480),
            },
            Endpoint::FullHash => match errors {
                0 | 1 => next_call_ts - now,
                n => (30 * 2i64.pow((n - 2).min(20))).min(120),
            },
        }
    }

    /// Blocks until the fair-use delay elapses, or returns [`Cancelled`]
    /// if `stop_delay` is set first. When `discard_fair_use` is set, the
    /// delay is still computed (and logged) but never actually slept.
    pub async fn wait(&self) -> Result<(), Cancelled> {
        let delay = self.fair_use_delay();
        if delay < 0 {
            error!("got negative delay: '{delay}', will not sleep");
            return Ok(());
        }
        if self.discard_fair_use {
            debug!("didn't sleep because of settings");
            return Ok(());
        }
        info!("sleeping for {}", prettify_seconds(delay));
        self.cancellable_sleep(delay as u64).await
    }

    async fn cancellable_sleep(&self, seconds: u64) -> Result<(), Cancelled> {
        const POLL_INTERVAL_MS: u64 = 250;
        let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(seconds);
        loop {
            if self.stop_delay.load(Ordering::SeqCst) {
                return Err(Cancelled);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let remaining = deadline - now;
            let step = remaining.min(tokio::time::Duration::from_millis(POLL_INTERVAL_MS));
            tokio::time::sleep(step).await;
        }
    }
}

/// The random multiplier `random_int(30,60)` from spec §4.5, applied
/// before the exponential and the 480-minute cap.
fn error_jitter_prefix(error_count: u32) -> i64 {
    let jitter = rand::thread_rng().gen_range(30..=60);
    let exponent = (error_count - 2).min(20);
    jitter * 2i64.pow(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_list_single_error_is_sixty_seconds() {
        let ctl = DelayController::new(Endpoint::PrefixList, true);
        ctl.on_error();
        assert_eq!(ctl.fair_use_delay(), 60);
    }

    #[test]
    fn prefix_list_two_errors_is_at_least_thirty_minutes() {
        let ctl = DelayController::new(Endpoint::PrefixList, true);
        ctl.on_error();
        ctl.on_error();
        // 60 * min(480, random_int(30,60) * 2^0) => at least 60*30 = 1800
        assert!(ctl.fair_use_delay() >= 1800);
    }

    #[test]
    fn full_hash_two_errors_between_thirty_and_hundred_twenty() {
        let ctl = DelayController::new(Endpoint::FullHash, true);
        ctl.on_error();
        ctl.on_error();
        let delay = ctl.fair_use_delay();
        assert!((30..=120).contains(&delay));
    }

    #[test]
    fn success_resets_error_count() {
        let ctl = DelayController::new(Endpoint::PrefixList, true);
        ctl.on_error();
        ctl.on_error();
        ctl.on_success(120);
        assert_eq!(ctl.error_count(), 0);
    }

    #[tokio::test]
    async fn discard_fair_use_skips_actual_sleep() {
        let ctl = DelayController::new(Endpoint::PrefixList, true);
        ctl.set_next_call_timeout(3600);
        let started = std::time::Instant::now();
        ctl.wait().await.unwrap();
        assert!(started.elapsed() < std::time::Duration::from_millis(500));
    }

    #[tokio::test]
    async fn cancellation_unwinds_sleep() {
        let ctl = DelayController::new(Endpoint::PrefixList, false);
        ctl.set_next_call_timeout(5);
        let stop = ctl.stop_flag();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            stop.store(true, Ordering::SeqCst);
        });
        let result = ctl.wait().await;
        handle.await.unwrap();
        assert_eq!(result, Err(Cancelled));
    }
}
