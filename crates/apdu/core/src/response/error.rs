//! Error types specific to APDU responses

use thiserror::Error;

/// Error for APDU response framing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// Incomplete response (less than 2 bytes, no status word)
    #[error("Incomplete response")]
    Incomplete,

    /// Payload longer than the command asked for
    #[error("Unexpected payload length: expected at most {expected}, got {actual}")]
    UnexpectedLength {
        /// Largest payload the command can produce
        expected: usize,
        /// Payload length actually received
        actual: usize,
    },
}
