//! Shift CLI library.
//!
//! This crate provides the command-line surface for workers and admins.

mod cli;
pub mod commands;
mod config;
pub mod identity;
pub mod locale;

pub use cli::{AdminCommand, ClockAction, Cli, Commands, ExportFormat};
pub use config::Config;
pub use locale::Locale;
