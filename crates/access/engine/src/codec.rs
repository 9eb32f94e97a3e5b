//! 16-byte block read and write
//!
//! Both operations authenticate the block first (key A, then key B) and
//! then issue READ BINARY (`FF B0 00 <block> 10`) or UPDATE BINARY
//! (`FF D6 00 <block> 10 <16 bytes>`). Writes are truncated or zero-padded
//! to exactly one block.

use std::fmt;

use nfc_access_apdu_core::response::error::ResponseError;
use nfc_access_apdu_core::{
    Bytes, CardTransport, Command, Error as ApduError, Response, ResultExt, StatusWord,
};
use tracing::{Level, debug, info, warn};

use crate::AccessError;
use crate::auth::Authenticator;
use crate::keys::KeyType;

/// Size of one card block in bytes
pub const BLOCK_SIZE: usize = 16;

const CLA: u8 = 0xFF;
const INS_GET_UID: u8 = 0xCA;
const INS_READ: u8 = 0xB0;
const INS_WRITE: u8 = 0xD6;

/// Data read from one block
///
/// Holds at most [`BLOCK_SIZE`] bytes; only the first `len()` are valid.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BlockData {
    bytes: [u8; BLOCK_SIZE],
    len: usize,
}

impl BlockData {
    /// Copy a response payload, rejecting anything longer than a block
    pub fn from_payload(payload: &[u8]) -> Result<Self, AccessError> {
        if payload.len() > BLOCK_SIZE {
            return Err(AccessError::Protocol(
                ResponseError::UnexpectedLength {
                    expected: BLOCK_SIZE,
                    actual: payload.len(),
                }
                .into(),
            ));
        }
        let mut bytes = [0; BLOCK_SIZE];
        bytes[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            bytes,
            len: payload.len(),
        })
    }

    /// Valid bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Number of valid bytes
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether no bytes were returned
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Valid bytes rendered as ASCII, non-printable bytes as `.`
    pub fn to_ascii(&self) -> String {
        self.as_slice()
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect()
    }

    /// Valid bytes as spaced uppercase hex, e.g. `41 6C 00`
    pub fn to_spaced_hex(&self) -> String {
        self.as_slice()
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl AsRef<[u8]> for BlockData {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for BlockData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockData({})", self.to_spaced_hex())
    }
}

/// Pad or truncate `data` to exactly one block
pub fn pad_block(data: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut block = [0; BLOCK_SIZE];
    let n = data.len().min(BLOCK_SIZE);
    block[..n].copy_from_slice(&data[..n]);
    block
}

/// GET UID (`FF CA 00 00 00`)
pub const fn get_uid_command() -> Command {
    Command::new_with_le(CLA, INS_GET_UID, 0x00, 0x00, 0x00)
}

/// READ BINARY of one block
pub const fn read_command(block: u8) -> Command {
    Command::new_with_le(CLA, INS_READ, 0x00, block, BLOCK_SIZE as u8)
}

/// UPDATE BINARY of one block with `data` padded or truncated to 16 bytes
pub fn write_command(block: u8, data: &[u8]) -> Result<Command, AccessError> {
    let block_data = Bytes::copy_from_slice(&pad_block(data));
    Ok(Command::new_with_data(CLA, INS_WRITE, 0x00, block, block_data)?)
}

/// Transmit `command` and return the payload of a `90 00` response
pub fn exchange<T: CardTransport + ?Sized>(
    transport: &mut T,
    command: &Command,
) -> Result<Bytes, AccessError> {
    let name = instruction_name(command.ins);
    let raw = transport.transmit_raw(&command.to_bytes()).inspect_err(|e| {
        warn!(command = name, error = %e, "Transmit failed");
    })?;
    let response = Response::from_bytes(&raw).map_err(ApduError::from).context(name)?;
    if !response.is_success() {
        log_rejection(name, command.p2, response.status());
    }
    Ok(response.into_payload().context(name)?)
}

fn instruction_name(ins: u8) -> &'static str {
    match ins {
        INS_GET_UID => "GET UID",
        INS_READ => "READ BINARY",
        INS_WRITE => "UPDATE BINARY",
        _ => "APDU",
    }
}

fn log_rejection(name: &str, p2: u8, status: StatusWord) {
    let level = status.tracing_level();
    if level == Level::INFO {
        info!(command = name, p2, %status, "{}", status.description());
    } else if level == Level::DEBUG {
        debug!(command = name, p2, %status, "{}", status.description());
    } else {
        warn!(command = name, p2, %status, "{}", status.description());
    }
}

fn authenticate_either<T: CardTransport + ?Sized>(
    transport: &mut T,
    authenticator: &Authenticator,
    block: u8,
) -> Result<(), AccessError> {
    if authenticator.authenticate(transport, block, KeyType::A)
        || authenticator.authenticate(transport, block, KeyType::B)
    {
        Ok(())
    } else {
        Err(AccessError::AuthenticationFailed { block })
    }
}

/// Authenticate and read one block
pub fn read_block<T: CardTransport + ?Sized>(
    transport: &mut T,
    authenticator: &Authenticator,
    block: u8,
) -> Result<BlockData, AccessError> {
    authenticate_either(transport, authenticator, block)?;
    let payload = exchange(transport, &read_command(block))?;
    let data = BlockData::from_payload(&payload)?;
    debug!(block, len = data.len(), "Read block");
    Ok(data)
}

/// Authenticate and write one block
///
/// Input longer than a block is silently truncated; shorter input is
/// zero-padded. The write is not read back.
pub fn write_block<T: CardTransport + ?Sized>(
    transport: &mut T,
    authenticator: &Authenticator,
    block: u8,
    data: &[u8],
) -> Result<(), AccessError> {
    authenticate_either(transport, authenticator, block)?;
    exchange(transport, &write_command(block, data)?)?;
    debug!(block, "Wrote block");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthPolicy;
    use nfc_access_apdu_core::mock::MockCard;

    #[test]
    fn test_command_frames() {
        assert_eq!(get_uid_command().to_bytes().as_ref(), &[0xFF, 0xCA, 0x00, 0x00, 0x00]);
        assert_eq!(read_command(4).to_bytes().as_ref(), &[0xFF, 0xB0, 0x00, 0x04, 0x10]);

        let frame = write_command(5, b"Alice").unwrap().to_bytes();
        assert_eq!(frame.len(), 5 + BLOCK_SIZE);
        assert_eq!(&frame[..5], &[0xFF, 0xD6, 0x00, 0x05, 0x10]);
        assert_eq!(&frame[5..10], b"Alice");
        assert!(frame[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_pad_block_truncates() {
        let long = [0xAB; 40];
        assert_eq!(pad_block(&long), [0xAB; BLOCK_SIZE]);
        assert_eq!(pad_block(&[]), [0; BLOCK_SIZE]);
    }

    #[test]
    fn test_write_then_read() {
        let mut card = MockCard::new(&[0x01]);
        let auth = Authenticator::default();
        write_block(&mut card, &auth, 4, b"Alice").unwrap();

        let data = read_block(&mut card, &auth, 4).unwrap();
        assert_eq!(data.len(), BLOCK_SIZE);
        assert_eq!(&data.as_slice()[..5], b"Alice");
        assert!(data.as_slice()[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_failed_status_yields_no_data() {
        // locked block: fail-open lets the read through, the card refuses it
        let mut card = MockCard::new(&[0x01]).with_block_key(4, 0x61, [0x42; 6]);
        let err = read_block(&mut card, &Authenticator::default(), 4).unwrap_err();
        assert!(matches!(err, AccessError::Protocol(_)));
    }

    #[test]
    fn test_fail_closed_skips_io_when_locked() {
        let mut card = MockCard::new(&[0x01]).with_block_key(4, 0x61, [0x42; 6]);
        let auth = Authenticator::new(AuthPolicy::FailClosed);
        let err = read_block(&mut card, &auth, 4).unwrap_err();
        assert!(matches!(err, AccessError::AuthenticationFailed { block: 4 }));
        assert!(card.commands_with_ins(0xB0).is_empty());
    }

    #[test]
    fn test_key_b_fallback() {
        let mut card = MockCard::new(&[0x01])
            .with_block_key(4, 0x61, [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5])
            .with_block(4, *b"0123456789abcdef");
        let auth = Authenticator::new(AuthPolicy::FailClosed);
        let data = read_block(&mut card, &auth, 4).unwrap();
        assert_eq!(data.as_slice(), b"0123456789abcdef");
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut card = MockCard::new(&[0x01]).failing_instruction(0xB0);
        let err = read_block(&mut card, &Authenticator::default(), 4).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_display_helpers() {
        let data = BlockData::from_payload(&[0x41, 0x6C, 0x00, 0x7F]).unwrap();
        assert_eq!(data.to_ascii(), "Al..");
        assert_eq!(data.to_spaced_hex(), "41 6C 00 7F");
        assert!(BlockData::from_payload(&[0; 17]).is_err());
    }
}
