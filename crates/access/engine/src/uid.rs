//! Card identifiers

use std::fmt;
use std::str::FromStr;

use crate::AccessError;

/// Longest UID a reader reports (triple-size ISO 14443 UID)
pub const UID_MAX_LENGTH: usize = 10;

/// Card serial number as returned by GET UID
///
/// Compared byte for byte; UIDs of different lengths never match.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CardUid {
    bytes: [u8; UID_MAX_LENGTH],
    len: u8,
}

impl CardUid {
    /// Build a UID from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AccessError> {
        if bytes.len() > UID_MAX_LENGTH {
            return Err(AccessError::InvalidCardResponse);
        }
        let mut buf = [0; UID_MAX_LENGTH];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            bytes: buf,
            len: bytes.len() as u8,
        })
    }

    /// UID bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    /// Number of UID bytes
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the UID has no bytes
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Uppercase hex without separators, e.g. `04A1B2C3`
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.as_bytes())
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardUid({self})")
    }
}

impl FromStr for CardUid {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| AccessError::InvalidCardResponse)?;
        Self::from_slice(&bytes)
    }
}

impl TryFrom<&[u8]> for CardUid {
    type Error = AccessError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_rendering() {
        let uid = CardUid::from_slice(&[0x04, 0xA1, 0xB2, 0xC3]).unwrap();
        assert_eq!(uid.to_string(), "04A1B2C3");
        assert_eq!(uid.len(), 4);
        assert_eq!("04a1b2c3".parse::<CardUid>().unwrap(), uid);
    }

    #[test]
    fn test_length_is_part_of_identity() {
        let short = CardUid::from_slice(&[0x04, 0xA1]).unwrap();
        let padded = CardUid::from_slice(&[0x04, 0xA1, 0x00]).unwrap();
        assert_ne!(short, padded);
    }

    #[test]
    fn test_too_long() {
        assert!(CardUid::from_slice(&[0; 11]).is_err());
        assert!(CardUid::from_slice(&[0; 10]).is_ok());
        assert!(CardUid::from_slice(&[]).unwrap().is_empty());
    }
}
