//! # Keweave
//!
//! Library side of the Keweave binary: the TOML network loader and the CLI
//! command implementations, exposed so integration tests can drive them
//! without spawning a process.

pub mod cli;
pub mod network;
