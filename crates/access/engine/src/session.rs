//! One card, from connect to disconnect
//!
//! ```text
//! Connecting -> Connected -> Identified -> (Authenticating <-> BlockIo)* -> Disconnected
//! ```
//!
//! The transport handle is released exactly once: by [`CardSession::close`],
//! by an unrecoverable transport error, by a failed identification, or on
//! drop, whichever comes first.

use derive_more::Display;
use nfc_access_apdu_core::{CardConnector, CardStatus, CardTransport, TransportError};
use tracing::{debug, info, warn};

use crate::AccessError;
use crate::auth::Authenticator;
use crate::codec::{self, BlockData};
use crate::keys::KeyType;
use crate::uid::CardUid;

/// Lifecycle state of a [`CardSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    /// Connect in progress
    Connecting,
    /// Handle acquired, card not yet identified
    Connected,
    /// UID read
    Identified,
    /// Key trial in progress
    Authenticating,
    /// Block read or write completed
    #[display("BlockIO")]
    BlockIo,
    /// Handle released
    Disconnected,
}

/// Exclusive session with the card currently in a reader
#[derive(Debug)]
pub struct CardSession<T: CardTransport> {
    transport: T,
    reader: String,
    state: SessionState,
    uid: Option<CardUid>,
    authenticator: Authenticator,
}

impl<T: CardTransport> CardSession<T> {
    /// Connect to the card in `reader`
    ///
    /// A failed connect is not retried.
    pub fn open<C>(
        connector: &mut C,
        reader: &str,
        authenticator: Authenticator,
    ) -> Result<Self, AccessError>
    where
        C: CardConnector<Transport = T>,
    {
        debug!(reader, state = %SessionState::Connecting, "Opening card session");
        let transport = connector.connect(reader).inspect_err(|e| {
            warn!(reader, error = %e, "Failed to connect to card");
        })?;
        Ok(Self::from_transport(transport, reader, authenticator))
    }

    /// Wrap an already connected transport
    pub fn from_transport(transport: T, reader: &str, authenticator: Authenticator) -> Self {
        debug!(reader, "Card connected");
        Self {
            transport,
            reader: reader.to_string(),
            state: SessionState::Connected,
            uid: None,
            authenticator,
        }
    }

    /// Current state
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Reader the card sits in
    pub fn reader(&self) -> &str {
        &self.reader
    }

    /// UID, once identified
    pub const fn uid(&self) -> Option<&CardUid> {
        self.uid.as_ref()
    }

    /// ATR and negotiated protocol
    pub fn card_status(&self) -> Result<CardStatus, AccessError> {
        self.ensure_open()?;
        let status = self.transport.status()?;
        info!(
            atr = %status.atr_hex(),
            protocol = %status.protocol.map_or_else(|| "unknown".to_string(), |p| p.to_string()),
            "Card status"
        );
        Ok(status)
    }

    /// Read the card UID
    ///
    /// A `90 00` response carries 0..=10 UID bytes. Anything else is an
    /// invalid card response and the session is then disconnected.
    pub fn identify(&mut self) -> Result<CardUid, AccessError> {
        if self.state != SessionState::Connected {
            return Err(AccessError::InvalidState { state: self.state });
        }

        let result = codec::exchange(&mut self.transport, &codec::get_uid_command())
            .and_then(|payload| CardUid::from_slice(&payload));

        match result {
            Ok(uid) => {
                info!(%uid, len = uid.len(), "Card identified");
                self.uid = Some(uid);
                self.state = SessionState::Identified;
                Ok(uid)
            }
            Err(e) => {
                warn!(error = %e, "Invalid card response");
                self.release();
                Err(match e {
                    AccessError::Transport(_) => e,
                    _ => AccessError::InvalidCardResponse,
                })
            }
        }
    }

    /// Run the key trial for `block` and `key_type`
    pub fn authenticate(&mut self, block: u8, key_type: KeyType) -> Result<bool, AccessError> {
        self.ensure_identified()?;
        self.state = SessionState::Authenticating;
        let ok = self.authenticator.authenticate(&mut self.transport, block, key_type);
        self.state = SessionState::BlockIo;
        Ok(ok)
    }

    /// Authenticate and read one block
    pub fn read_block(&mut self, block: u8) -> Result<BlockData, AccessError> {
        self.ensure_identified()?;
        self.state = SessionState::Authenticating;
        let result = codec::read_block(&mut self.transport, &self.authenticator, block);
        self.after_block_io(result)
    }

    /// Authenticate and write one block, truncating or zero-padding `data` to 16 bytes
    pub fn write_block(&mut self, block: u8, data: &[u8]) -> Result<(), AccessError> {
        self.ensure_identified()?;
        self.state = SessionState::Authenticating;
        let result = codec::write_block(&mut self.transport, &self.authenticator, block, data);
        self.after_block_io(result)
    }

    /// Release the card handle
    pub fn close(mut self) -> Result<(), AccessError> {
        self.try_release().map_err(AccessError::from)
    }

    fn after_block_io<R>(&mut self, result: Result<R, AccessError>) -> Result<R, AccessError> {
        match &result {
            Err(AccessError::Transport(e)) if is_unrecoverable(e) => {
                warn!(error = %e, "Card lost during block I/O");
                self.release();
            }
            _ => self.state = SessionState::BlockIo,
        }
        result
    }

    fn ensure_open(&self) -> Result<(), AccessError> {
        if self.state == SessionState::Disconnected {
            return Err(AccessError::InvalidState { state: self.state });
        }
        Ok(())
    }

    fn ensure_identified(&self) -> Result<(), AccessError> {
        match self.state {
            SessionState::Identified | SessionState::Authenticating | SessionState::BlockIo => {
                Ok(())
            }
            state => Err(AccessError::InvalidState { state }),
        }
    }

    fn try_release(&mut self) -> Result<(), TransportError> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }
        self.state = SessionState::Disconnected;
        debug!(reader = %self.reader, "Disconnecting card");
        self.transport.disconnect()
    }

    fn release(&mut self) {
        if let Err(e) = self.try_release() {
            warn!(error = %e, "Failed to disconnect card");
        }
    }
}

impl<T: CardTransport> Drop for CardSession<T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Errors after which the handle is no longer usable
const fn is_unrecoverable(error: &TransportError) -> bool {
    matches!(
        error,
        TransportError::NoCard(_)
            | TransportError::Disconnected
            | TransportError::ReaderUnavailable(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nfc_access_apdu_core::mock::{MockCard, MockConnector};

    fn open(card: &MockCard) -> CardSession<MockCard> {
        let mut connector = MockConnector::new(card.clone());
        CardSession::open(&mut connector, "Mock Reader 0", Authenticator::default()).unwrap()
    }

    #[test]
    fn test_identify() {
        let card = MockCard::new(&[0x04, 0xA1, 0xB2, 0xC3]);
        let mut session = open(&card);
        assert_eq!(session.state(), SessionState::Connected);

        let uid = session.identify().unwrap();
        assert_eq!(uid.to_string(), "04A1B2C3");
        assert_eq!(session.state(), SessionState::Identified);
        assert_eq!(session.uid(), Some(&uid));
    }

    #[test]
    fn test_invalid_uid_response_disconnects() {
        let card = MockCard::new(&[0x04]).with_uid_response(&[0x6A, 0x82]);
        let mut session = open(&card);
        assert!(matches!(session.identify(), Err(AccessError::InvalidCardResponse)));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(card.disconnects(), 1);

        drop(session);
        assert_eq!(card.disconnects(), 1);
    }

    #[test]
    fn test_truncated_uid_response_is_invalid() {
        let card = MockCard::new(&[0x04]).with_uid_response(&[0x90]);
        let mut session = open(&card);
        assert!(matches!(session.identify(), Err(AccessError::InvalidCardResponse)));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_bare_success_yields_empty_uid() {
        let card = MockCard::new(&[]).with_uid_response(&[0x90, 0x00]);
        let mut session = open(&card);
        let uid = session.identify().unwrap();
        assert!(uid.is_empty());
        assert_eq!(uid.to_string(), "");
        assert_eq!(session.uid(), Some(&uid));
        assert_eq!(session.state(), SessionState::Identified);
        assert_eq!(card.disconnects(), 0);
    }

    #[test]
    fn test_oversized_uid_is_invalid() {
        let card = MockCard::new(&[0x01; 11]);
        let mut session = open(&card);
        assert!(matches!(session.identify(), Err(AccessError::InvalidCardResponse)));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_block_io_requires_identification() {
        let card = MockCard::new(&[0x01]);
        let mut session = open(&card);
        assert!(matches!(
            session.read_block(4),
            Err(AccessError::InvalidState { state: SessionState::Connected })
        ));
    }

    #[test]
    fn test_block_io_states() {
        let card = MockCard::new(&[0x01]);
        let mut session = open(&card);
        session.identify().unwrap();

        session.write_block(4, b"Alice").unwrap();
        assert_eq!(session.state(), SessionState::BlockIo);
        assert!(session.authenticate(5, KeyType::A).unwrap());
        assert_eq!(&session.read_block(4).unwrap().as_slice()[..5], b"Alice");
        assert_eq!(card.block(4)[..5], *b"Alice");
    }

    #[test]
    fn test_close_releases_once() {
        let card = MockCard::new(&[0x01]);
        let mut session = open(&card);
        session.identify().unwrap();
        session.close().unwrap();
        assert_eq!(card.disconnects(), 1);
    }

    #[test]
    fn test_drop_releases() {
        let card = MockCard::new(&[0x01]);
        {
            let _session = open(&card);
        }
        assert_eq!(card.disconnects(), 1);
    }

    #[test]
    fn test_failed_connect() {
        let mut connector = MockConnector::failing();
        let err = CardSession::open(&mut connector, "Mock Reader 0", Authenticator::default())
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_recoverable_transport_error_keeps_session() {
        let card = MockCard::new(&[0x01]).failing_instruction(0xB0);
        let mut session = open(&card);
        session.identify().unwrap();
        assert!(session.read_block(4).unwrap_err().is_transport());
        assert_eq!(session.state(), SessionState::BlockIo);
        assert!(session.write_block(4, b"x").is_ok());
    }

    #[test]
    fn test_card_status() {
        let card = MockCard::new(&[0x01]);
        let session = open(&card);
        let status = session.card_status().unwrap();
        assert_eq!(status.atr_hex().len(), 40);
    }
}
