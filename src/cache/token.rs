use std::time::Duration;

use chrono::{DateTime, Utc};

/// Bearer credential issued by a token source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub valid_until: DateTime<Utc>,
}

impl Token {
    pub fn new(value: impl Into<String>, valid_until: DateTime<Utc>) -> Self {
        Self { value: value.into(), valid_until }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_until
    }

    /// Remaining lifetime, zero once expired
    pub fn ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.valid_until - now).to_std().unwrap_or(Duration::ZERO)
    }
}
