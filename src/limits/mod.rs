//! Usage-limits state: the user's AI quota snapshot and its observers.
//!
//! One [`UsageLimitsService`] instance holds the latest server-reported
//! snapshot for a session. Snapshots are applied wholesale — never merged —
//! so the client cannot drift from the server's counters.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// The server's authoritative AI quota snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLimits {
    /// Requests remaining in the current period.
    pub remaining: u64,
    /// Requests allowed per weekly period.
    #[serde(default)]
    pub weekly_limit: u64,
    /// When the period resets (UTC), if the server reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageLimits {
    pub fn exhausted(&self) -> bool {
        self.remaining == 0
    }
}

type Callback = Arc<dyn Fn(&UsageLimits) + Send + Sync>;

struct Registry {
    subscribers: Mutex<Vec<(u64, Callback)>>,
}

/// Holds the latest known usage snapshot and notifies subscribers on change.
pub struct UsageLimitsService {
    state: Mutex<Option<UsageLimits>>,
    registry: Arc<Registry>,
    next_id: AtomicU64,
}

impl UsageLimitsService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
            registry: Arc::new(Registry {
                subscribers: Mutex::new(Vec::new()),
            }),
            next_id: AtomicU64::new(0),
        }
    }

    /// The latest snapshot, if any has been applied this session.
    pub fn current(&self) -> Option<UsageLimits> {
        self.state.lock().clone()
    }

    /// Replace the held snapshot wholesale and notify every subscriber.
    ///
    /// A missing snapshot is a warned no-op: known-good state is never
    /// cleared on absent input.
    pub fn apply(&self, snapshot: Option<UsageLimits>) {
        let Some(snapshot) = snapshot else {
            tracing::warn!("usage snapshot missing, keeping previous state");
            return;
        };

        *self.state.lock() = Some(snapshot.clone());
        tracing::debug!(
            remaining = snapshot.remaining,
            weekly_limit = snapshot.weekly_limit,
            "usage limits updated"
        );

        // Clone the list out of the lock so callbacks may subscribe or
        // unsubscribe without deadlocking.
        let subscribers: Vec<(u64, Callback)> = self
            .registry
            .subscribers
            .lock()
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect();

        for (id, callback) in subscribers {
            // Delivery is fire-and-forget: a panicking subscriber must not
            // take down the publisher or starve later subscribers.
            if catch_unwind(AssertUnwindSafe(|| callback(&snapshot))).is_err() {
                tracing::warn!(subscriber = id, "usage-limits subscriber panicked");
            }
        }
    }

    /// Register a callback invoked with every applied snapshot. Dropping the
    /// returned guard unsubscribes.
    pub fn subscribe(
        &self,
        callback: impl Fn(&UsageLimits) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback = Arc::new(callback);
        self.registry.subscribers.lock().push((id, callback));
        Subscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    /// Forget the held snapshot (logout). Subscribers are not notified.
    pub fn clear(&self) {
        *self.state.lock() = None;
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers.lock().len()
    }
}

impl Default for UsageLimitsService {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for a registered subscriber; unsubscribes on drop.
pub struct Subscription {
    registry: Weak<Registry>,
    id: u64,
}

impl Subscription {
    /// Unsubscribe now instead of at drop time.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .subscribers
                .lock()
                .retain(|(id, _)| *id != self.id);
        }
    }
}
