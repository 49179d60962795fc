use tokio::task::AbortHandle;
use tracing::debug;

use crate::cache::token_cache::TokenCache;
use crate::sources::LoginState;

/// Applies every logout to the cache for as long as the provider lives,
/// whether or not a consumer is attached.
#[derive(Debug)]
pub(crate) struct LoginWatch {
    task: AbortHandle,
}

impl LoginWatch {
    pub(crate) fn spawn(login: LoginState, cache: TokenCache) -> Self {
        let task = tokio::spawn(apply_logouts(login, cache)).abort_handle();
        Self { task }
    }
}

impl Drop for LoginWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn apply_logouts(mut login: LoginState, cache: TokenCache) {
    let mut snapshot = login.mark_seen();
    loop {
        cache.apply_logouts(snapshot.logouts);
        match login.changed().await {
            Some(next) => snapshot = next,
            None => {
                debug!("login state stream completed, logout watch stopped");
                return;
            }
        }
    }
}
