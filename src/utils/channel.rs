use tokio::sync::broadcast::{self, Sender};

use crate::provider::error::TokenEvent;

/// Slow consumers skip to the latest values once this many are queued.
const BUFFER_SIZE: usize = 16;

pub fn token_channel() -> Sender<TokenEvent> {
    let (token_sender, _) = broadcast::channel(BUFFER_SIZE);
    token_sender
}
