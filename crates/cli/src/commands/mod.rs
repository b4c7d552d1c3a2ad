//! CLI subcommands.

pub mod search;
pub mod sign;
