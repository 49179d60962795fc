use std::time::Duration;

use futures::StreamExt;
use tracing::{error, info};

use crate::observability::metrics::get_metrics;
use crate::provider::TokenProvider;
use crate::sinks::sink_file::FileSink;
use crate::sources::TokenSource;

/// Long-lived consumer used by the binary.
///
/// Subscribes, propagates every token to the optional file sink, and after a
/// terminal failure waits `resubscribe_delay` before attaching again.
#[derive(Debug, Clone)]
pub struct SinkManager {
    pub(crate) file_sink: Option<FileSink>,
    pub(crate) resubscribe_delay: Duration,
}

impl SinkManager {
    pub fn new(file_sink: Option<FileSink>, resubscribe_delay: Duration) -> Self {
        Self { file_sink, resubscribe_delay }
    }

    pub async fn run<S: TokenSource>(&self, provider: TokenProvider<S>) {
        loop {
            let mut stream = provider.observe_token();
            info!(generation = stream.generation(), "subscribed to token stream");

            while let Some(item) = stream.next().await {
                match item {
                    Ok(value) => self.propagate(&value).await,
                    Err(err) => error!(error = %err, "token stream failed"),
                }
            }
            drop(stream);

            info!(delay_ms = self.resubscribe_delay.as_millis() as u64, "resubscribing after failure");
            tokio::time::sleep(self.resubscribe_delay).await;
        }
    }

    async fn propagate(&self, value: &str) {
        let Some(sink) = &self.file_sink else {
            info!("token refreshed");
            return;
        };
        if let Err(err) = sink.write(value).await {
            error!(path = %sink.path().display(), error = %err, "file sink write failed");
            get_metrics().sink_failures.inc();
        } else {
            get_metrics().sink_propagations.inc();
            info!(path = %sink.path().display(), "token propagated to file");
        }
    }

    /// Remove propagated state on shutdown.
    pub async fn cleanup(&self) {
        if let Some(sink) = &self.file_sink {
            if let Err(err) = sink.clear().await {
                error!(error = %err, "file sink cleanup failed");
            }
        }
    }
}
