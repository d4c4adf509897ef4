//! Command-line interface.
//!
//! Command definitions (clap) and output formatting for the `stratus`
//! binary.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
