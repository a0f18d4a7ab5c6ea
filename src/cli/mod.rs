// CLI module for retag
//
// Command-line front end over the library readers and writers.

pub mod commands;
pub mod config;
pub mod output;

pub use commands::RetagOptions;
pub use config::{Commands, Config, OutputFormat};
pub use output::OutputFormatter;
