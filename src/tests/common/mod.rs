// tests/common/mod.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::TimeDelta;
use futures::StreamExt;

use crate::cache::token::Token;
use crate::helpers::time::{Clock, TokioClock};
use crate::provider::{ProviderError, TokenProvider, TokenStream};
use crate::resilience::retry::RetrySettings;
use crate::sources::{login_channel, LoginSender, TokenSource};

/// Token source driven by a closure over the 0-based call number.
pub struct ScriptedSource<F> {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    script: F,
}

impl<F> ScriptedSource<F>
where
    F: Fn(usize) -> Result<Token> + Send + Sync + 'static,
{
    pub fn new(script: F) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Self { calls: calls.clone(), delay: Duration::ZERO, script }, calls)
    }

    /// Every call takes `delay` before answering
    pub fn slow(script: F, delay: Duration) -> (Self, Arc<AtomicUsize>) {
        let (mut source, calls) = Self::new(script);
        source.delay = delay;
        (source, calls)
    }
}

impl<F> TokenSource for ScriptedSource<F>
where
    F: Fn(usize) -> Result<Token> + Send + Sync + 'static,
{
    async fn refresh(&self) -> Result<Token> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(n)
    }
}

pub fn clock() -> Arc<TokioClock> {
    Arc::new(TokioClock::new())
}

pub fn token_valid_for(clock: &dyn Clock, value: impl Into<String>, seconds: i64) -> Token {
    Token::new(value, clock.now() + TimeDelta::seconds(seconds))
}

pub fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

pub fn provider<S: TokenSource>(
    source: S,
    authenticated: bool,
    clock: Arc<TokioClock>,
    retry: RetrySettings,
) -> (TokenProvider<S>, LoginSender) {
    let (login_tx, login_rx) = login_channel(authenticated);
    (TokenProvider::new(source, login_rx, clock, retry), login_tx)
}

/// Next stream item, or `None` if nothing arrives within `within`.
pub async fn next_within(stream: &mut TokenStream, within: Duration) -> Option<Option<Result<String, ProviderError>>> {
    tokio::time::timeout(within, stream.next()).await.ok()
}

/// Let spawned tasks run without moving the paused clock meaningfully.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
