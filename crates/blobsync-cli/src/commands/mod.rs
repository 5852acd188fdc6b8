//! CLI subcommands
//!
//! Each command is a clap `Args` / `Subcommand` type with an async
//! `execute` method.

pub mod completions;
pub mod config;
pub mod credential;
pub mod status;
pub mod sync;
