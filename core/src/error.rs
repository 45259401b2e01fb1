//! Error module

use thiserror::Error;

/// Errors shared by the stores of every engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("The store capacity of {0} entries has been exhausted")]
    ResourceExhausted(usize),
}
