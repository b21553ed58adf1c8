//! License-server log analytics CLI library.
//!
//! This crate provides the CLI interface over `lmlog-core`.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, OptionsAction};
pub use config::Config;
