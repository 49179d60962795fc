pub mod manager;
pub mod sink_file;
