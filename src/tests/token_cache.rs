#[cfg(test)]
mod test {
    use std::time::Duration;

    use chrono::TimeDelta;

    use crate::cache::token_cache::TokenCache;
    use crate::helpers::time::Clock;
    use crate::provider::signal::InvalidationSignal;
    use crate::tests::common::{clock, settle, token_valid_for};

    fn cache() -> (TokenCache, std::sync::Arc<crate::helpers::time::TokioClock>) {
        let clock = clock();
        (TokenCache::new(clock.clone(), InvalidationSignal::new()), clock)
    }

    #[tokio::test(start_paused = true)]
    async fn store_arms_watchdog_at_expiry() {
        let (cache, clock) = cache();
        assert!(!cache.is_watchdog_armed());
        assert!(cache.current_if_valid().is_none());

        let token = token_valid_for(clock.as_ref(), "a", 100);
        cache.store(token.clone());

        assert_eq!(cache.current_if_valid(), Some(token.clone()));
        assert!(cache.is_watchdog_armed());
        assert_eq!(cache.watchdog_deadline(), Some(token.valid_until));
    }

    #[tokio::test(start_paused = true)]
    async fn second_store_keeps_armed_watchdog() {
        let (cache, clock) = cache();
        let first = token_valid_for(clock.as_ref(), "a", 100);
        cache.store(first.clone());
        cache.store(token_valid_for(clock.as_ref(), "b", 500));

        assert_eq!(cache.peek().map(|t| t.value), Some("b".to_owned()));
        assert_eq!(cache.watchdog_deadline(), Some(first.valid_until));
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_fire_clears_slot_and_pulses() {
        let (cache, clock) = cache();
        let mut pulses = cache.signal().subscribe();
        pulses.absorb();

        cache.store(token_valid_for(clock.as_ref(), "a", 100));
        tokio::time::sleep(Duration::from_secs(99)).await;
        assert!(cache.peek().is_some());
        assert!(!pulses.has_pending());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(cache.peek().is_none());
        assert!(!cache.is_watchdog_armed());
        assert!(pulses.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn logout_disarms_without_pulse() {
        let (cache, clock) = cache();
        let mut pulses = cache.signal().subscribe();
        pulses.absorb();

        cache.store(token_valid_for(clock.as_ref(), "a", 100));
        assert!(cache.on_logout());
        assert!(cache.peek().is_none());
        assert!(!cache.is_watchdog_armed());

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert!(!pulses.has_pending(), "cancelled watchdog must not fire");
        assert!(!cache.on_logout(), "second logout has nothing to clear");
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_is_not_served_and_fires_immediately() {
        let (cache, clock) = cache();
        let expired = crate::cache::token::Token::new("old", clock.now() - TimeDelta::seconds(1));
        cache.store(expired);

        assert!(cache.current_if_valid().is_none());
        assert!(cache.peek().is_some());

        settle().await;
        assert!(cache.peek().is_none());
        assert!(!cache.is_watchdog_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rearms_after_fire() {
        let (cache, clock) = cache();
        cache.store(token_valid_for(clock.as_ref(), "a", 10));
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(!cache.is_watchdog_armed());

        let next = token_valid_for(clock.as_ref(), "b", 10);
        cache.store(next.clone());
        assert_eq!(cache.watchdog_deadline(), Some(next.valid_until));
    }

    #[tokio::test(start_paused = true)]
    async fn applied_logouts_clear_once() {
        let (cache, clock) = cache();
        cache.store(token_valid_for(clock.as_ref(), "a", 100));

        assert!(cache.apply_logouts(1));
        assert!(cache.peek().is_none());
        assert!(!cache.is_watchdog_armed());

        cache.store(token_valid_for(clock.as_ref(), "b", 100));
        assert!(!cache.apply_logouts(1), "same logout count is applied only once");
        assert_eq!(cache.peek().map(|t| t.value), Some("b".to_owned()));
    }

    #[tokio::test(start_paused = true)]
    async fn token_from_before_logout_is_not_stored() {
        let (cache, clock) = cache();
        cache.apply_logouts(2);

        assert!(!cache.store_for(token_valid_for(clock.as_ref(), "old-session", 100), 1));
        assert!(cache.peek().is_none());
        assert!(!cache.is_watchdog_armed());

        assert!(cache.store_for(token_valid_for(clock.as_ref(), "current", 100), 2));
        assert_eq!(cache.peek().map(|t| t.value), Some("current".to_owned()));
    }

    #[tokio::test(start_paused = true)]
    async fn store_for_newer_session_drops_previous_token() {
        let (cache, clock) = cache();
        let first = token_valid_for(clock.as_ref(), "a", 100);
        cache.store(first.clone());

        let second = token_valid_for(clock.as_ref(), "b", 300);
        assert!(cache.store_for(second.clone(), 1));

        assert_eq!(cache.peek(), Some(second.clone()));
        assert_eq!(cache.watchdog_deadline(), Some(second.valid_until), "re-armed for the new session");
    }
}
