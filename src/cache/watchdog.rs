use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::AbortHandle;
use tracing::debug;

/// One-shot expiry timer for the cached token.
///
/// The callback receives the arming id so the owner can tell a live firing
/// from one that lost a race with a cancel.
#[derive(Debug)]
pub struct ExpiryWatchdog {
    id: u64,
    deadline: DateTime<Utc>,
    handle: AbortHandle,
}

impl ExpiryWatchdog {
    pub fn arm<F>(id: u64, delay: Duration, deadline: DateTime<Utc>, on_fire: F) -> Self
    where
        F: FnOnce(u64) + Send + 'static,
    {
        debug!(watchdog_id = id, delay_ms = delay.as_millis() as u64, %deadline, "arming expiry watchdog");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(id);
        })
        .abort_handle();

        Self { id, deadline, handle }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn cancel(self) {
        debug!(watchdog_id = self.id, "cancelling expiry watchdog");
        // abort happens in drop
    }
}

impl Drop for ExpiryWatchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
