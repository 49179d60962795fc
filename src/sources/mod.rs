//! Collaborators the coordinator consumes: the token source and the login state.

pub mod executor;
pub mod fetch;
pub mod login;

use anyhow::Result;

use crate::cache::token::Token;

pub use login::{login_channel, LoginSender, LoginSnapshot, LoginState};

/// Issues fresh tokens. Every call is independent of the previous ones.
pub trait TokenSource: Send + Sync + 'static {
    fn refresh(&self) -> impl std::future::Future<Output = Result<Token>> + Send;
}
