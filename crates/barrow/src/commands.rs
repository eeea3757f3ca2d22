//! CLI subcommand implementations.

pub mod cat;
pub mod paranoia;
