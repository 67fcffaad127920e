//! Focus time tracker host.
//!
//! This crate wires the tracker core to SQLite storage and the Linux
//! desktop, and provides the `ft` command-line interface.

mod cli;
pub mod commands;
mod config;
pub mod desktop;

pub use cli::{Cli, Commands, RulesAction};
pub use config::Config;
