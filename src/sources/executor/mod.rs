pub mod token_fetch;
