//! CLI subcommands.

pub mod challenge;
pub mod inspect;
