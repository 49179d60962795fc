use tokio::sync::watch;

/// Latest login state plus the number of logouts seen so far.
///
/// `logouts` grows on every `false`, so a logout followed by a quick login
/// stays visible even to a reader that only sees the final value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginSnapshot {
    pub authenticated: bool,
    pub logouts: u64,
}

/// Producer side of the login state stream. Dropping every sender completes it.
#[derive(Debug, Clone)]
pub struct LoginSender {
    tx: watch::Sender<LoginSnapshot>,
}

/// Consumer side of the login state stream; the latest value is replayed on attach.
#[derive(Debug, Clone)]
pub struct LoginState {
    rx: watch::Receiver<LoginSnapshot>,
}

pub fn login_channel(authenticated: bool) -> (LoginSender, LoginState) {
    let (tx, rx) = watch::channel(LoginSnapshot { authenticated, logouts: 0 });
    (LoginSender { tx }, LoginState { rx })
}

impl LoginSender {
    pub fn set(&self, authenticated: bool) {
        self.tx.send_modify(|state| {
            state.authenticated = authenticated;
            if !authenticated {
                state.logouts += 1;
            }
        });
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().authenticated
    }
}

impl LoginState {
    pub fn current(&self) -> LoginSnapshot {
        *self.rx.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().authenticated
    }

    /// Current value, marking it as seen by this reader.
    pub fn mark_seen(&mut self) -> LoginSnapshot {
        *self.rx.borrow_and_update()
    }

    /// Wait for the next change. `None` once every sender is gone.
    pub async fn changed(&mut self) -> Option<LoginSnapshot> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn logout_then_login_keeps_the_logout_visible() {
        let (tx, mut rx) = login_channel(true);
        rx.mark_seen();

        tx.set(false);
        tx.set(true);

        let seen = rx.changed().await.expect("sender alive");
        assert!(seen.authenticated);
        assert_eq!(seen.logouts, 1);
    }

    #[tokio::test]
    async fn completes_when_senders_are_dropped() {
        let (tx, mut rx) = login_channel(false);
        let other = tx.clone();
        rx.mark_seen();

        drop(tx);
        other.set(true);
        assert!(rx.changed().await.is_some());

        drop(other);
        assert!(rx.changed().await.is_none());
        assert!(rx.is_authenticated(), "last value stands");
    }
}
