//! Transport traits for APDU communication with cards
//!
//! This module provides abstractions for communicating with smart cards through
//! a reader. Implementations are blocking: every call holds the calling thread
//! until the reader answers.

pub mod error;

use std::fmt;

use bytes::Bytes;
pub use error::{TransportError, WaitError};
use tracing::{debug, trace};

use crate::reader::CardStatus;

/// Trait for basic card transports
///
/// A transport is responsible for sending and receiving raw APDU bytes over
/// one connected card handle. It has no knowledge of command structure.
pub trait CardTransport: fmt::Debug {
    /// Send raw APDU bytes to card and return response bytes
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode_upper(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode_upper(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = %e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    /// This is the method that concrete implementations should override
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Query the ATR and negotiated protocol of the connected card
    fn status(&self) -> Result<CardStatus, TransportError>;

    /// Release the card handle
    ///
    /// Releasing an already released handle is a no-op.
    fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Opens card transports on a named reader
pub trait CardConnector {
    /// Transport produced by a successful connect
    type Transport: CardTransport;

    /// Connect to the card currently in `reader`
    fn connect(&mut self, reader: &str) -> Result<Self::Transport, TransportError>;
}
