//! Error types specific to card transport

use thiserror::Error;

use crate::reader::ReaderState;

/// Transport error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection error
    #[error("Failed to connect to card: {0}")]
    Connection(String),

    /// Transmission error
    #[error("Failed to transmit data")]
    Transmission,

    /// No card present in the reader
    #[error("No card present in reader: {0}")]
    NoCard(String),

    /// The card handle was already released
    #[error("Card handle already released")]
    Disconnected,

    /// Reader or context is no longer available
    #[error("Reader unavailable: {0}")]
    ReaderUnavailable(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection(message.into())
    }
}

/// Failure of a status-change wait
///
/// Carries the reader state observed alongside the failure so the caller can
/// still advance its own snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Status change error: {source}")]
pub struct WaitError {
    /// Reader state reported with the failure
    pub event_state: ReaderState,
    /// Underlying transport failure
    #[source]
    pub source: TransportError,
}

impl WaitError {
    /// Create a new wait error
    pub const fn new(event_state: ReaderState, source: TransportError) -> Self {
        Self {
            event_state,
            source,
        }
    }
}
