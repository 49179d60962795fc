use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cache::token::Token;
use crate::cache::watchdog::ExpiryWatchdog;
use crate::helpers::time::Clock;
use crate::observability::metrics::get_metrics;
use crate::provider::signal::InvalidationSignal;

/// Cached token slot plus its expiry watchdog.
///
/// Every mutation goes through one mutex so the watchdog callback, the
/// fetch pipeline and logout handling never interleave.
#[derive(Clone)]
pub struct TokenCache {
    inner: Arc<Mutex<Slot>>,
    clock: Arc<dyn Clock>,
    signal: InvalidationSignal,
}

#[derive(Default)]
struct Slot {
    token: Option<Token>,
    watchdog: Option<ExpiryWatchdog>,
    next_watchdog_id: u64,
    /// login-state logout count already applied to this slot
    logouts_applied: u64,
}

impl Slot {
    fn clear(&mut self) -> bool {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.cancel();
        }
        self.token.take().is_some()
    }
}

impl TokenCache {
    pub fn new(clock: Arc<dyn Clock>, signal: InvalidationSignal) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Slot::default())),
            clock,
            signal,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn signal(&self) -> &InvalidationSignal {
        &self.signal
    }

    /// Cached token if it has not expired yet
    pub fn current_if_valid(&self) -> Option<Token> {
        let now = self.clock.now();
        self.inner
            .lock()
            .token
            .as_ref()
            .filter(|token| token.is_valid(now))
            .cloned()
    }

    /// Raw slot content, expired or not
    pub fn peek(&self) -> Option<Token> {
        self.inner.lock().token.clone()
    }

    pub fn is_watchdog_armed(&self) -> bool {
        self.inner.lock().watchdog.is_some()
    }

    /// Store a freshly fetched token; arms the watchdog unless one is already armed.
    pub fn store(&self, token: Token) {
        let now = self.clock.now();
        let mut slot = self.inner.lock();
        self.store_locked(&mut slot, token, now);
    }

    /// Store a token fetched while the login state had seen `logouts` logouts.
    ///
    /// A token from before an applied logout is discarded and `false` returned.
    pub fn store_for(&self, token: Token, logouts: u64) -> bool {
        let now = self.clock.now();
        let mut slot = self.inner.lock();
        if logouts < slot.logouts_applied {
            debug!(logouts, applied = slot.logouts_applied, "discarding token fetched before logout");
            return false;
        }
        let mut dropped = false;
        if logouts > slot.logouts_applied {
            slot.logouts_applied = logouts;
            dropped = slot.clear();
        }
        self.store_locked(&mut slot, token, now);
        drop(slot);

        if dropped {
            record_logout();
        }
        true
    }

    fn store_locked(&self, slot: &mut Slot, token: Token, now: DateTime<Utc>) {
        get_metrics().token_expiry_unix.set(token.valid_until.timestamp());
        info!(valid_until = %token.valid_until, "token stored");

        if slot.watchdog.is_none() {
            slot.next_watchdog_id += 1;
            let id = slot.next_watchdog_id;
            let weak = Arc::downgrade(&self.inner);
            let signal = self.signal.clone();
            slot.watchdog = Some(ExpiryWatchdog::arm(
                id,
                token.ttl(now),
                token.valid_until,
                move |id| on_watchdog_fire(weak, signal, id),
            ));
        }
        slot.token = Some(token);
    }

    /// Clear slot and disarm watchdog. Does not pulse.
    pub fn on_logout(&self) -> bool {
        let had_token = self.inner.lock().clear();
        if had_token {
            record_logout();
        }
        had_token
    }

    /// Clear the slot if the login state reports logouts not applied yet.
    ///
    /// Returns whether a token was dropped.
    pub fn apply_logouts(&self, logouts: u64) -> bool {
        let mut slot = self.inner.lock();
        if logouts <= slot.logouts_applied {
            return false;
        }
        slot.logouts_applied = logouts;
        let had_token = slot.clear();
        drop(slot);

        if had_token {
            record_logout();
        }
        had_token
    }

    #[cfg(test)]
    pub(crate) fn watchdog_deadline(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().watchdog.as_ref().map(|watchdog| watchdog.deadline())
    }
}

fn record_logout() {
    info!("logged out, cached token dropped");
    get_metrics().logouts.inc();
    get_metrics().token_expiry_unix.set(0);
}

fn on_watchdog_fire(slot: Weak<Mutex<Slot>>, signal: InvalidationSignal, id: u64) {
    let Some(slot) = slot.upgrade() else {
        return;
    };
    let mut guard = slot.lock();
    if guard.watchdog.as_ref().map(|watchdog| watchdog.id()) != Some(id) {
        debug!(watchdog_id = id, "stale watchdog firing ignored");
        return;
    }
    guard.watchdog = None;
    if guard.token.take().is_none() {
        return;
    }
    drop(guard);

    info!(watchdog_id = id, "token expired, cache cleared");
    let metrics = get_metrics();
    metrics.watchdog_fires.inc();
    metrics.token_expiry_unix.set(0);
    signal.pulse();
}
