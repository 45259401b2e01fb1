//! The engine error type.

use thiserror::Error;

/// What the engine surfaces to its host.
///
/// Undecodable, duplicate or out of place messages are logged and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid AODV message: {0}")]
    Codec(&'static str),
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
