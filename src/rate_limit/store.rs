//! In-memory fixed-window counter store.

use super::{Policy, RateLimitResult};
use crate::time::{Clock, SystemClock};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// One client's throttling state under one policy.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Window {
    count: u32,
    reset_at: SystemTime,
}

/// Process-local store of fixed-window counters, keyed by
/// `(policy name, client id)`.
///
/// An explicitly constructed object rather than process-global state, so tests
/// (and embedders) can hold independent stores. The map is mutex-guarded: the
/// check is a read-modify-write and must not interleave, even though an
/// off-by-one overshoot under a concurrent burst would be tolerable.
#[derive(Debug)]
pub struct WindowStore {
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<(String, String), Window>>,
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock, windows: Mutex::new(HashMap::new()) }
    }

    /// Record one request from `client_id` under `policy` and report whether
    /// it fits the window.
    ///
    /// A missing or expired window is (re)created with a count of one.
    /// Otherwise the count increments unconditionally, so an over-quota client
    /// that keeps calling never earns a fresh window early; it must wait for
    /// `reset_at`. Never fails; an empty `client_id` is a valid (degenerate)
    /// key.
    pub fn check(&self, client_id: &str, policy: &Policy) -> RateLimitResult {
        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap();
        let key = (policy.name().to_string(), client_id.to_string());

        let fresh = Window { count: 1, reset_at: now + policy.window() };
        let window = windows
            .entry(key)
            .and_modify(|window| {
                if now < window.reset_at {
                    window.count = window.count.saturating_add(1);
                } else {
                    // An expired entry is indistinguishable from an absent
                    // one; the sweep is purely a memory bound.
                    *window = fresh.clone();
                }
            })
            .or_insert(fresh)
            .clone();

        RateLimitResult {
            allowed: window.count <= policy.max_requests(),
            limit: policy.max_requests(),
            remaining: policy.max_requests().saturating_sub(window.count),
            reset_at: window.reset_at,
        }
    }

    /// Drop windows whose `reset_at` has passed; returns how many were
    /// removed. Skipping this only costs memory, never correctness.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap();
        let before = windows.len();
        windows.retain(|_, window| window.reset_at > now);
        before - windows.len()
    }

    /// Number of live window entries (including expired ones not yet swept).
    pub fn len(&self) -> usize {
        self.windows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn a background task sweeping the store at a fixed cadence.
    ///
    /// Aborting the returned handle stops the sweep; the store itself needs no
    /// teardown.
    pub fn spawn_sweeper(store: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = store.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "swept expired rate-limit windows");
                }
            }
        })
    }
}
