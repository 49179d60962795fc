use tokio::time::{sleep, Duration};
use anyhow::Result;
use tracing::{error, warn};

use crate::config::settings::RetryConfig;

pub const INLINE_RETRIES_DEFAULT: u32 = 2;
pub const FALLBACK_RETRIES_DEFAULT: u32 = 2;

/// Retry budgets for the two fetch blocks.
///
/// `inline_retries` and `fallback_retries` count *additional* attempts, so a
/// block makes `retries + 1` calls at most.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    pub inline_retries: u32,
    pub fallback_retries: u32,
    /// doubled after every failed attempt, capped by `max_delay_ms`; 0 retries immediately
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            inline_retries: INLINE_RETRIES_DEFAULT,
            fallback_retries: FALLBACK_RETRIES_DEFAULT,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

impl RetrySettings {
    pub fn new(inline_retries: u32, fallback_retries: u32) -> Self {
        Self { inline_retries, fallback_retries, ..Self::default() }
    }

    pub fn from_config(retry: &Option<RetryConfig>) -> Self {
        let default = Self::default();
        Self {
            inline_retries: retry.as_ref().and_then(|r| r.inline_retries).unwrap_or(default.inline_retries),
            fallback_retries: retry.as_ref().and_then(|r| r.fallback_retries).unwrap_or(default.fallback_retries),
            base_delay_ms: retry.as_ref().and_then(|r| r.base_delay_ms).unwrap_or(default.base_delay_ms),
            max_delay_ms: retry.as_ref().and_then(|r| r.max_delay_ms).unwrap_or(default.max_delay_ms),
        }
    }

    /// Run `operation` once plus up to `retries` more times while it fails.
    pub async fn run_with_retry<F, Fut, T>(&self, retries: u32, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let attempts = retries.saturating_add(1);
        let mut delay = self.base_delay_ms;

        for attempt in 1..=attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    warn!("Attempt {attempt}/{attempts} failed: {e}");
                    if delay > 0 {
                        sleep(Duration::from_millis(delay)).await;
                        delay = (delay * 2).min(self.max_delay_ms.max(self.base_delay_ms));
                    }
                }
                Err(e) => {
                    error!("all {attempt} attempts failed: {e}");
                    return Err(e);
                }
            }
        }
        unreachable!("Retry loop exhausted unexpectedly")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn stops_after_budget_is_spent() {
        let calls = AtomicU32::new(0);
        let retry = RetrySettings::new(1, 0);

        let result: Result<()> = retry
            .run_with_retry(retry.inline_retries, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow!("boom")) }
            })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let retry = RetrySettings::new(5, 0);

        let result = retry
            .run_with_retry(retry.inline_retries, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err(anyhow!("transient")) } else { Ok(n) } }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_up_to_cap() {
        let retry = RetrySettings { inline_retries: 3, fallback_retries: 0, base_delay_ms: 100, max_delay_ms: 150 };
        let start = tokio::time::Instant::now();

        let result: Result<()> = retry
            .run_with_retry(retry.inline_retries, || async { Err(anyhow!("down")) })
            .await;

        assert!(result.is_err());
        // 100 + 150 + 150
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[test]
    fn config_overrides_defaults_field_by_field() {
        let cfg = Some(RetryConfig { inline_retries: Some(1), fallback_retries: None, base_delay_ms: Some(10), max_delay_ms: None });
        let retry = RetrySettings::from_config(&cfg);

        assert_eq!(retry.inline_retries, 1);
        assert_eq!(retry.fallback_retries, FALLBACK_RETRIES_DEFAULT);
        assert_eq!(retry.base_delay_ms, 10);
        assert_eq!(RetrySettings::from_config(&None), RetrySettings::default());
    }
}
