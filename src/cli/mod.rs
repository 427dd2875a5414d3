//! Command handlers for the `daemon-client` binary

mod commands;

pub use commands::*;
