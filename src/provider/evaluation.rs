use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::cache::token::Token;
use crate::cache::token_cache::TokenCache;
use crate::observability::metrics::get_metrics;
use crate::provider::distribution::SharedDistribution;
use crate::provider::error::{ProviderError, TokenEvent};
use crate::sources::executor::token_fetch::{FetchOutcome, FetchPipeline};
use crate::sources::{LoginState, TokenSource};

/// Everything one pipeline generation needs.
pub(crate) struct Generation<S> {
    pub(crate) id: u64,
    pub(crate) cache: TokenCache,
    pub(crate) pipeline: Arc<FetchPipeline<S>>,
    pub(crate) login: LoginState,
    pub(crate) tx: broadcast::Sender<TokenEvent>,
    pub(crate) distribution: SharedDistribution,
}

impl<S: TokenSource> Generation<S> {
    /// Evaluate on every pulse until aborted or a fetch fails for good.
    ///
    /// Login changes are watched alongside the pulses: a logout clears the
    /// cache, being authenticated after a logout or an empty round
    /// re-evaluates.
    pub(crate) async fn run(mut self) {
        let mut pulses = self.cache.signal().subscribe();
        let mut seen_logouts = self.login.mark_seen().logouts;
        let mut login_open = true;
        let mut awaiting_auth = false;

        loop {
            tokio::select! {
                biased;
                _ = pulses.next() => {}
                changed = self.login.changed(), if login_open => {
                    let snapshot = match changed {
                        Some(snapshot) => snapshot,
                        None => {
                            debug!(generation = self.id, "login state stream completed");
                            login_open = false;
                            self.login.current()
                        }
                    };
                    if snapshot.logouts != seen_logouts {
                        seen_logouts = snapshot.logouts;
                        self.cache.apply_logouts(snapshot.logouts);
                        awaiting_auth = true;
                    }
                    if !snapshot.authenticated {
                        self.cache.on_logout();
                        awaiting_auth = true;
                        continue;
                    }
                    if !awaiting_auth {
                        continue;
                    }
                    info!(generation = self.id, "authenticated again, re-evaluating");
                }
            }

            match self.evaluate().await {
                Ok(Some(token)) => {
                    awaiting_auth = false;
                    let _ = self.tx.send(Ok(token.value));
                }
                Ok(None) => awaiting_auth = true,
                Err(err) => {
                    self.distribution.lock().fail(self.id, err);
                    return;
                }
            }
            // pulses raised while evaluating are answered by this evaluation
            pulses.absorb();
        }
    }

    async fn evaluate(&self) -> Result<Option<Token>, ProviderError> {
        // a logout may have happened while nobody was watching
        self.cache.apply_logouts(self.login.current().logouts);

        if let Some(token) = self.cache.current_if_valid() {
            debug!(generation = self.id, "serving cached token");
            get_metrics().cache_hits.inc();
            return Ok(Some(token));
        }

        match self.pipeline.run(&self.login).await {
            Ok(FetchOutcome::Fetched(token)) => Ok(Some(token)),
            Ok(FetchOutcome::Empty) | Ok(FetchOutcome::LoggedOut) => Ok(None),
            Err(err) => Err(ProviderError::source_failure(err)),
        }
    }
}
