//! Engine module: CLI surface, progress reporting, identity hashing

pub mod arg_parser;
pub mod cli;
pub mod hashing;
pub mod progress;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cli::handle_run;
pub use hashing::{derived_uid, hash_id};
pub use progress::{LiveStats, spawn_reporter};
