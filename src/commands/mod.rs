//! CLI command implementations for adguard-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: One scrape cycle against every configured instance
//! - `config`: Configuration file generation

pub mod check;
pub mod config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
