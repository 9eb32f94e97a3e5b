//! Mifare Classic key material tried during authentication

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Which of the two block keys to present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum KeyType {
    /// Key A (0x60)
    #[display("A")]
    A,
    /// Key B (0x61)
    #[display("B")]
    B,
}

impl KeyType {
    /// Key type byte used in the authenticate APDU
    pub const fn code(self) -> u8 {
        match self {
            Self::A => 0x60,
            Self::B => 0x61,
        }
    }
}

/// Well-known transport keys, in trial order
pub const DEFAULT_KEYS: [[u8; 6]; 6] = [
    // factory default
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    // NXP MAD key
    [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5],
    // NFC Forum NDEF key
    [0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7],
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    [0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5],
    [0x4D, 0x3A, 0x99, 0xC3, 0x51, 0xDD],
];

/// A key value paired with the key slot it is presented for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCandidate {
    /// Key slot
    pub key_type: KeyType,
    /// 6-byte key value
    pub key: [u8; 6],
}

impl KeyCandidate {
    /// Create a candidate
    pub const fn new(key_type: KeyType, key: [u8; 6]) -> Self {
        Self { key_type, key }
    }

    /// The default keys presented as `key_type`, in trial order
    pub fn defaults(key_type: KeyType) -> impl Iterator<Item = Self> {
        DEFAULT_KEYS.into_iter().map(move |key| Self::new(key_type, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_codes() {
        assert_eq!(KeyType::A.code(), 0x60);
        assert_eq!(KeyType::B.code(), 0x61);
        assert_eq!(KeyType::B.to_string(), "B");
    }

    #[test]
    fn test_defaults_order() {
        let keys: Vec<_> = KeyCandidate::defaults(KeyType::B).collect();
        assert_eq!(keys.len(), 6);
        assert_eq!(keys[0].key, [0xFF; 6]);
        assert_eq!(keys[3].key, [0x00; 6]);
        assert!(keys.iter().all(|k| k.key_type == KeyType::B));
    }
}
