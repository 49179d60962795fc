use tokio::sync::watch;

/// Content-free re-evaluation trigger.
///
/// Backed by a `watch` channel, so only the latest pulse is retained and
/// pulses sent while nobody is listening are not queued.
#[derive(Debug, Clone)]
pub struct InvalidationSignal {
    tx: watch::Sender<u64>,
}

impl InvalidationSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    pub fn pulse(&self) {
        self.tx.send_modify(|seq| *seq = seq.wrapping_add(1));
    }

    /// Subscribe with one pending initial pulse.
    pub fn subscribe(&self) -> Pulses {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        Pulses { rx }
    }
}

impl Default for InvalidationSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct Pulses {
    rx: watch::Receiver<u64>,
}

impl Pulses {
    /// Wait for the next pulse. Never resolves once the signal is gone.
    pub async fn next(&mut self) {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Drop any pulse that arrived since the last one was consumed.
    pub fn absorb(&mut self) {
        self.rx.borrow_and_update();
    }

    pub fn has_pending(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}
