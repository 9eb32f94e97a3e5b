//! Core error type for all APDU operations
//!
//! Transport, response and command failures are consolidated here so callers
//! higher up the stack only have to match on one type.

use crate::response::error::ResponseError;
use crate::response::status::StatusWord;
use crate::transport::TransportError;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// Error raised by the card transport
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed response frame
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// Well-formed response carrying a non-success status word
    #[error("Status error {status}: {}", status.description())]
    Status {
        /// Status word returned by the card
        status: StatusWord,
    },

    /// Invalid command length
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },
}

impl Error {
    /// Create a new error with context information
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a new status error
    pub const fn status(sw1: u8, sw2: u8) -> Self {
        Self::Status {
            status: StatusWord::new(sw1, sw2),
        }
    }

    /// Whether the root cause is a transport failure
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Context { source, .. } => source.is_transport(),
            _ => false,
        }
    }
}

/// Result type for APDU operations
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Extension trait for Result with APDU Errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<S: Into<String>>(self, context: S) -> Self {
        self.map_err(|e| e.with_context(context))
    }
}
