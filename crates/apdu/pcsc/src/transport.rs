//! PC/SC transport implementation

use std::fmt;

use bytes::Bytes;
use nfc_access_apdu_core::prelude::*;
use nfc_access_apdu_core::Protocol;
use pcsc::{Card, MAX_BUFFER_SIZE};
use tracing::{debug, warn};

use crate::config::PcscConfig;
use crate::error::PcscError;

/// Transport over one connected PC/SC card handle
///
/// The handle is released exactly once: by [`CardTransport::disconnect`] or,
/// failing that, when the transport is dropped.
pub struct PcscTransport {
    /// Card connection, `None` once released
    card: Option<Card>,
    /// Reader name
    reader_name: String,
    /// Configuration
    config: PcscConfig,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl PcscTransport {
    /// Wrap an already connected card
    pub(crate) const fn new(card: Card, reader_name: String, config: PcscConfig) -> Self {
        Self {
            card: Some(card),
            reader_name,
            config,
        }
    }

    /// Get the reader name
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    fn card(&self) -> Result<&Card, TransportError> {
        self.card.as_ref().ok_or(TransportError::Disconnected)
    }

    fn transmit_command(&mut self, command: &[u8]) -> Result<Bytes, PcscError> {
        let card = self
            .card
            .as_ref()
            .ok_or_else(|| PcscError::NoCard(self.reader_name.clone()))?;

        let mut response_buffer = [0u8; MAX_BUFFER_SIZE];
        let response = card.transmit(command, &mut response_buffer)?;
        Ok(Bytes::copy_from_slice(response))
    }

    fn release(&mut self) -> Result<(), PcscError> {
        let Some(card) = self.card.take() else {
            return Ok(());
        };

        debug!(reader = %self.reader_name, "Releasing card handle");
        card.disconnect(self.config.disposition.into())
            .map_err(|(_, e)| PcscError::Pcsc(e))
    }
}

impl CardTransport for PcscTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.transmit_command(command).map_err(TransportError::from)
    }

    fn status(&self) -> Result<CardStatus, TransportError> {
        let status = self
            .card()?
            .status2_owned()
            .map_err(|e| TransportError::from(PcscError::from(e)))?;

        let protocol = status.protocol2().map(|p| match p {
            pcsc::Protocol::T0 => Protocol::T0,
            pcsc::Protocol::T1 => Protocol::T1,
            pcsc::Protocol::RAW => Protocol::Raw,
        });

        Ok(CardStatus {
            atr: status.atr().to_vec(),
            protocol,
        })
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.release().map_err(TransportError::from)
    }
}

impl Drop for PcscTransport {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(reader = %self.reader_name, error = %e, "Failed to release card handle");
        }
    }
}
