//! Error type for the access engine
//!
//! The variants follow the four failure kinds the engine recovers from at the
//! session or registry boundary (transport, protocol, capacity, not found),
//! plus configuration and remote-service failures.

use nfc_access_apdu_core::{Error as ApduError, StatusWord, TransportError};

use crate::session::SessionState;
use crate::uid::CardUid;

/// Errors raised by the access engine
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// Reader or context failure; fatal to the current operation only
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed or rejected APDU response
    #[error("Protocol error: {0}")]
    Protocol(ApduError),

    /// GET UID did not produce a usable identifier
    #[error("Invalid card response")]
    InvalidCardResponse,

    /// Every candidate key was rejected and the policy does not fail open
    #[error("Could not authenticate block {block} with either key")]
    AuthenticationFailed {
        /// Block that stayed locked
        block: u8,
    },

    /// Operation not permitted in the session's current state
    #[error("Operation not allowed while session is {state}")]
    InvalidState {
        /// State the session was in
        state: SessionState,
    },

    /// Registry already holds its maximum number of entries
    #[error("Registry full: capacity of {capacity} cards reached")]
    Capacity {
        /// Registry capacity
        capacity: usize,
    },

    /// Card is not in the registry
    #[error("Card {0} not found in registry")]
    NotFound(CardUid),

    /// Display name is empty after cleaning
    #[error("Invalid display name")]
    InvalidName,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Remote authorization service failure
    #[error("Authorization service error: {0}")]
    Remote(String),
}

impl AccessError {
    /// Create a protocol error from a non-success status word
    pub const fn status(status: StatusWord) -> Self {
        Self::Protocol(ApduError::Status { status })
    }

    /// Whether this error came from the reader transport
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<ApduError> for AccessError {
    fn from(error: ApduError) -> Self {
        match error {
            ApduError::Transport(e) => Self::Transport(e),
            other => Self::Protocol(other),
        }
    }
}

impl From<figment::Error> for AccessError {
    fn from(error: figment::Error) -> Self {
        Self::Config(Box::new(error))
    }
}

impl From<ureq::Error> for AccessError {
    fn from(error: ureq::Error) -> Self {
        Self::Remote(error.to_string())
    }
}
