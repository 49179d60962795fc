use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::token::Token;
use crate::cache::token_cache::TokenCache;
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::resilience::retry::RetrySettings;
use crate::sources::{LoginState, TokenSource};

static INLINE_MSG: &str = "inline";
static FALLBACK_MSG: &str = "fallback";

/// Result of one fetch pipeline run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched(Token),
    /// neither block produced an unexpired token
    Empty,
    /// not authenticated at a gate, or logged out while fetching
    LoggedOut,
}

enum BlockOutcome {
    /// token plus the logout count seen at the gate
    Fetched(Token, u64),
    Empty,
    LoggedOut,
}

/// Login-gated, retrying acquisition of a fresh token.
///
/// An inline block calls the source up to `inline_retries + 1` times while it
/// errors. A block ending in an expired token is empty and triggers one
/// fallback block with its own budget. Errors left after a block's budget is
/// spent are terminal. Runs are serialized, so at most one is in flight.
pub struct FetchPipeline<S> {
    source: S,
    cache: TokenCache,
    retry: RetrySettings,
    in_flight: Mutex<()>,
}

impl<S: TokenSource> FetchPipeline<S> {
    pub fn new(source: S, cache: TokenCache, retry: RetrySettings) -> Self {
        Self { source, cache, retry, in_flight: Mutex::new(()) }
    }

    pub async fn run(&self, login: &LoginState) -> Result<FetchOutcome> {
        let _flight = self.in_flight.lock().await;
        let metrics = get_metrics();
        let start = get_instant();

        let outcome = match self.gated_block(login, INLINE_MSG, self.retry.inline_retries).await {
            Ok(BlockOutcome::Empty) => {
                info!("inline block produced no valid token, running fallback block");
                self.gated_block(login, FALLBACK_MSG, self.retry.fallback_retries).await
            }
            other => other,
        };

        let outcome = match outcome {
            Ok(BlockOutcome::Fetched(token, logouts)) => {
                if self.cache.store_for(token.clone(), logouts) {
                    FetchOutcome::Fetched(token)
                } else {
                    FetchOutcome::LoggedOut
                }
            }
            Ok(BlockOutcome::Empty) => {
                warn!("no valid token this round, waiting for the next login signal");
                FetchOutcome::Empty
            }
            Ok(BlockOutcome::LoggedOut) => {
                self.cache.on_logout();
                FetchOutcome::LoggedOut
            }
            Err(e) => {
                metrics.fetch_outcomes.with_label_values(&["failed"]).inc();
                metrics.fetch_duration.with_label_values(&["failed"]).observe(start.elapsed().as_secs_f64());
                return Err(e);
            }
        };

        let label = outcome_label(&outcome);
        metrics.fetch_outcomes.with_label_values(&[label]).inc();
        metrics.fetch_duration.with_label_values(&[label]).observe(start.elapsed().as_secs_f64());
        Ok(outcome)
    }

    async fn gated_block(&self, login: &LoginState, phase: &'static str, retries: u32) -> Result<BlockOutcome> {
        let session = login.current();
        if !session.authenticated {
            debug!(phase, "not authenticated, skipping fetch");
            return Ok(BlockOutcome::LoggedOut);
        }

        let metrics = get_metrics();
        let source = &self.source;
        let token = self
            .retry
            .run_with_retry(retries, move || {
                metrics.source_invocations.inc();
                async move {
                    source.refresh().await.inspect_err(|_| {
                        metrics.source_failures.with_label_values(&[phase]).inc();
                    })
                }
            })
            .await?;

        if login.current().logouts != session.logouts {
            info!(phase, "logged out while fetching, result dropped");
            return Ok(BlockOutcome::LoggedOut);
        }

        let now = self.cache.now();
        if token.is_valid(now) {
            debug!(phase, valid_until = %token.valid_until, "token fetched");
            Ok(BlockOutcome::Fetched(token, session.logouts))
        } else {
            warn!(phase, valid_until = %token.valid_until, %now, "fetched token already expired");
            Ok(BlockOutcome::Empty)
        }
    }
}

fn outcome_label(outcome: &FetchOutcome) -> &'static str {
    match outcome {
        FetchOutcome::Fetched(_) => "fetched",
        FetchOutcome::Empty => "empty",
        FetchOutcome::LoggedOut => "logged_out",
    }
}
