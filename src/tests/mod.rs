pub mod common;

mod sink_file;
mod token_cache;
