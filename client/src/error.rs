//! The client error type.

use std::io;

use thiserror::Error;

/// What the client surfaces to its host.
///
/// Malformed or unexpected replies are logged and dropped, never returned.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unable to encode a message: {0}")]
    Protocol(io::Error),
    #[error("{0}")]
    Validation(#[from] dhcp_protocol::Error),
    #[error("Lease database error: {0}")]
    LeaseFile(#[from] io::Error),
    #[error("Lease file syntax error at line {line}: {reason}")]
    LeaseFileSyntax { line: usize, reason: String },
    #[error("Unable to obtain a lease on first try")]
    NoLeaseOnFirstTry,
}

impl Error {
    /// The process exit status a daemon wrapping the client terminates with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NoLeaseOnFirstTry => 2,
            _ => 1,
        }
    }
}
