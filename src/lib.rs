//! # Token Provider Library
//!
//! Hands a continuously valid bearer token to any number of concurrent
//! consumers. Refresh, login gating, expiry and retries stay behind
//! [`TokenProvider::observe_token`].
//!
//! Modules:
//! - `cache` — token, cache slot and expiry watchdog
//! - `sources` — token source / login state contracts, HTTP source, fetch pipeline
//! - `provider` — invalidation signal, evaluation loop, multicast distribution
//! - `resilience` — two-phase retry budgets
//! - `config` — YAML configuration and validation

pub mod config;
pub mod cache;
pub mod sources;
pub mod resilience;
pub mod parser;
pub mod provider;
#[cfg(test)]
pub mod tests;
pub mod observability;
pub mod server;
pub mod sinks;
pub mod helpers;
pub mod utils;


pub use crate::cache::token::Token;
pub use crate::config::sources::ServiceConfig;
pub use crate::provider::{ProviderError, TokenProvider, TokenStream};
pub use crate::sources::{login_channel, LoginSender, LoginState, TokenSource};
