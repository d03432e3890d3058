//! The `pcert` command line interface.

pub mod args;
pub mod commands;
pub mod completions;
pub mod show;

pub use args::Cli;
pub use commands::{handle_command, run};
