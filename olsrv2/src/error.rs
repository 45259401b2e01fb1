//! The engine error type.

use thiserror::Error;

/// What the engine surfaces to its host.
///
/// Invalid messages are returned by the codec and the validators, but the
/// engine itself only logs and drops them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid OLSRv2 message: {0}")]
    InvalidMessage(&'static str),
    #[error("The store capacity of {0} entries has been exhausted")]
    ResourceExhausted(usize),
}

impl From<routing_core::Error> for Error {
    fn from(error: routing_core::Error) -> Self {
        match error {
            routing_core::Error::ResourceExhausted(capacity) => Error::ResourceExhausted(capacity),
        }
    }
}
