//! CLI subcommand implementations.

pub mod admin;
pub mod clock;
pub mod events;
pub mod export;
pub mod status;
pub mod summary;
pub mod util;
pub mod whoami;
