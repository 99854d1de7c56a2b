//! Unix socket control channel between the CLI and a running daemon.

pub mod client;
pub mod protocol;
pub mod server;
