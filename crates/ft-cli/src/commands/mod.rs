//! CLI subcommand implementations.

pub mod history;
pub mod rules;
pub mod run;
pub mod status;
mod util;
