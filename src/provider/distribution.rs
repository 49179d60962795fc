use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::observability::metrics::get_metrics;
use crate::provider::error::{ProviderError, TokenEvent};

/// Consumer bookkeeping for the single evaluation pipeline.
///
/// A generation starts on the 0 -> 1 consumer transition and is aborted on
/// 1 -> 0, or ends by itself after a terminal failure.
#[derive(Default)]
pub(crate) struct Distribution {
    next_generation: u64,
    active: Option<ActiveGeneration>,
}

pub(crate) struct ActiveGeneration {
    pub(crate) id: u64,
    consumers: usize,
    tx: broadcast::Sender<TokenEvent>,
    task: AbortHandle,
}

pub(crate) type SharedDistribution = Arc<Mutex<Distribution>>;

impl Distribution {
    pub(crate) fn consumers(&self) -> usize {
        self.active.as_ref().map(|active| active.consumers).unwrap_or(0)
    }

    /// Attach one consumer, starting a generation through `start` when none is active.
    ///
    /// `start` receives the new generation id and its sender and returns the
    /// spawned task's abort handle.
    pub(crate) fn attach<F>(&mut self, start: F) -> (u64, broadcast::Receiver<TokenEvent>)
    where
        F: FnOnce(u64, broadcast::Sender<TokenEvent>) -> AbortHandle,
    {
        let next_generation = &mut self.next_generation;
        let active = self.active.get_or_insert_with(|| {
            *next_generation += 1;
            let id = *next_generation;
            let tx = crate::utils::channel::token_channel();
            info!(generation = id, "starting token pipeline");
            get_metrics().pipeline_generations.inc();
            let task = start(id, tx.clone());
            ActiveGeneration { id, consumers: 0, tx, task }
        });

        active.consumers += 1;
        get_metrics().active_consumers.set(active.consumers as i64);
        debug!(generation = active.id, consumers = active.consumers, "consumer attached");
        (active.id, active.tx.subscribe())
    }

    pub(crate) fn detach(&mut self, generation: u64) {
        let Some(active) = self.active.as_mut().filter(|active| active.id == generation) else {
            return;
        };
        active.consumers -= 1;
        get_metrics().active_consumers.set(active.consumers as i64);
        debug!(generation, consumers = active.consumers, "consumer detached");

        if active.consumers == 0 {
            if let Some(active) = self.active.take() {
                info!(generation, "last consumer gone, stopping token pipeline");
                active.task.abort();
            }
        }
    }

    /// Retire `generation` after a terminal failure. Consumers still holding
    /// its stream no longer count towards the next generation.
    pub(crate) fn fail(&mut self, generation: u64, err: ProviderError) {
        if self.active.as_ref().map(|active| active.id) == Some(generation) {
            if let Some(active) = self.active.take() {
                warn!(generation, consumers = active.consumers, error = %err, "token pipeline failed");
                get_metrics().terminal_failures.inc();
                get_metrics().active_consumers.set(0);
                let _ = active.tx.send(Err(err));
            }
        }
    }
}

/// Token values as seen by one consumer.
///
/// Yields `Ok(value)` for every token the shared pipeline emits after this
/// stream was attached. A terminal `Err` is yielded at most once and ends the
/// stream. Dropping it detaches the consumer.
pub struct TokenStream {
    inner: BroadcastStream<TokenEvent>,
    generation: u64,
    distribution: SharedDistribution,
    done: bool,
}

impl TokenStream {
    pub(crate) fn new(rx: broadcast::Receiver<TokenEvent>, generation: u64, distribution: SharedDistribution) -> Self {
        Self {
            inner: BroadcastStream::new(rx),
            generation,
            distribution,
            done: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Stream for TokenStream {
    type Item = Result<String, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        loop {
            match ready!(Pin::new(&mut self.inner).poll_next(cx)) {
                Some(Ok(Ok(value))) => return Poll::Ready(Some(Ok(value))),
                Some(Ok(Err(err))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(generation = self.generation, skipped, "consumer lagged behind, skipping stale tokens");
                }
                None => {
                    self.done = true;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl Drop for TokenStream {
    fn drop(&mut self) {
        self.distribution.lock().detach(self.generation);
    }
}
