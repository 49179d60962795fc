//! Token provider: the coordinator handed to consumers.
//!
//! - `signal` — invalidation pulses
//! - `evaluation` — one pipeline generation: pulse -> cache check -> fetch
//! - `distribution` — consumer refcount and the multicast `TokenStream`
//! - `login_watch` — applies logouts to the cache while no consumer is attached

pub mod distribution;
pub mod error;
pub mod evaluation;
pub mod login_watch;
pub mod signal;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::token::Token;
use crate::cache::token_cache::TokenCache;
use crate::helpers::time::{Clock, SystemClock};
use crate::resilience::retry::RetrySettings;
use crate::sources::executor::token_fetch::FetchPipeline;
use crate::sources::{LoginState, TokenSource};

pub use distribution::TokenStream;
pub use error::ProviderError;

use distribution::{Distribution, SharedDistribution};
use evaluation::Generation;
use login_watch::LoginWatch;
use signal::InvalidationSignal;

/// Supplies a continuously valid token to any number of consumers.
///
/// Cheap to clone; clones share the cache, the watchdog and the running
/// pipeline.
pub struct TokenProvider<S> {
    cache: TokenCache,
    pipeline: Arc<FetchPipeline<S>>,
    login: LoginState,
    distribution: SharedDistribution,
    _login_watch: Arc<LoginWatch>,
}

impl<S> Clone for TokenProvider<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            pipeline: self.pipeline.clone(),
            login: self.login.clone(),
            distribution: self.distribution.clone(),
            _login_watch: self._login_watch.clone(),
        }
    }
}

impl<S: TokenSource> TokenProvider<S> {
    /// Must be called within a tokio runtime: the login state is watched from
    /// a background task for the provider's whole life.
    pub fn new(source: S, login: LoginState, clock: Arc<dyn Clock>, retry: RetrySettings) -> Self {
        let cache = TokenCache::new(clock, InvalidationSignal::new());
        let pipeline = Arc::new(FetchPipeline::new(source, cache.clone(), retry));
        let login_watch = Arc::new(LoginWatch::spawn(login.clone(), cache.clone()));
        Self {
            cache,
            pipeline,
            login,
            distribution: Arc::new(Mutex::new(Distribution::default())),
            _login_watch: login_watch,
        }
    }

    /// System clock and default retry budgets
    pub fn with_defaults(source: S, login: LoginState) -> Self {
        Self::new(source, login, Arc::new(SystemClock), RetrySettings::default())
    }

    /// Attach a consumer to the shared token stream.
    ///
    /// The first attached consumer starts the pipeline. Values emitted before
    /// this call are not replayed.
    pub fn observe_token(&self) -> TokenStream {
        let (generation, rx) = self.distribution.lock().attach(|id, tx| {
            let generation = Generation {
                id,
                cache: self.cache.clone(),
                pipeline: self.pipeline.clone(),
                login: self.login.clone(),
                tx,
                distribution: self.distribution.clone(),
            };
            tokio::spawn(generation.run()).abort_handle()
        });
        TokenStream::new(rx, generation, self.distribution.clone())
    }

    /// Consumers attached to the running pipeline
    pub fn consumers(&self) -> usize {
        self.distribution.lock().consumers()
    }

    /// Cached token, if any and still valid
    pub fn cached_token(&self) -> Option<Token> {
        self.cache.current_if_valid()
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &TokenCache {
        &self.cache
    }
}
