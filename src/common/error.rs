//! Error types for nameserv

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Network Errors ===
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The peer answered, but its response envelope carried `success=false`.
    #[error("peer call failed: {0}")]
    Rpc(String),

    // === Validation Errors ===
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
