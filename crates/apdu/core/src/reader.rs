//! Reader presence state and status-change monitoring

use std::fmt;
use std::time::Duration;

use bitflags::bitflags;
use derive_more::Display;

use crate::transport::WaitError;

bitflags! {
    /// Snapshot of a reader's state, as PC/SC-style flags
    ///
    /// Bit values match the `SCARD_STATE_*` constants. [`ReaderState::UNAWARE`]
    /// is the empty set; the remaining flags may be combined (a mute card is
    /// reported as `PRESENT | MUTE`).
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReaderState: u32 {
        /// The reader is unplugged or otherwise unusable
        const UNAVAILABLE = 0x0008;
        /// No card in the reader
        const EMPTY = 0x0010;
        /// A card is in the reader
        const PRESENT = 0x0020;
        /// The card does not answer reset
        const MUTE = 0x0200;
    }
}

impl ReaderState {
    /// State not yet known
    pub const UNAWARE: Self = Self::empty();

    const NAMED: [(Self, &'static str); 4] = [
        (Self::EMPTY, "Empty"),
        (Self::PRESENT, "Card Present"),
        (Self::MUTE, "Mute"),
        (Self::UNAVAILABLE, "Unavailable"),
    ];

    /// Whether a card is present
    pub const fn is_present(self) -> bool {
        self.contains(Self::PRESENT)
    }

    /// Whether no flag is set
    pub const fn is_unaware(self) -> bool {
        self.is_empty()
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unaware() {
            return f.write_str("Unaware");
        }

        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReaderState({self})")
    }
}

/// Transmission protocol negotiated with the card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Protocol {
    /// Character-oriented T=0
    #[display("T=0")]
    T0,
    /// Block-oriented T=1
    #[display("T=1")]
    T1,
    /// Raw reader access
    #[display("RAW")]
    Raw,
}

/// Status of a connected card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardStatus {
    /// Answer To Reset
    pub atr: Vec<u8>,
    /// Negotiated protocol, if the reader reported one
    pub protocol: Option<Protocol>,
}

impl CardStatus {
    /// ATR as uppercase hex
    pub fn atr_hex(&self) -> String {
        hex::encode_upper(&self.atr)
    }
}

/// Blocking source of reader status changes
pub trait ReaderMonitor {
    /// Name of the watched reader
    fn reader_name(&self) -> &str;

    /// Block until the reader's state differs from `current` or `timeout` elapses
    ///
    /// `None` waits indefinitely. A timeout is not an error: the returned
    /// state then equals `current`.
    fn wait_status_change(
        &mut self,
        current: ReaderState,
        timeout: Option<Duration>,
    ) -> Result<ReaderState, WaitError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_combine() {
        let state = ReaderState::PRESENT | ReaderState::MUTE;
        assert!(state.contains(ReaderState::PRESENT));
        assert!(state.contains(ReaderState::MUTE));
        assert!(!state.contains(ReaderState::EMPTY));
        assert!(state.is_present());
        assert!(!ReaderState::EMPTY.is_present());
        assert!(!ReaderState::UNAWARE.is_present());
    }

    #[test]
    fn test_display() {
        assert_eq!(ReaderState::UNAWARE.to_string(), "Unaware");
        assert_eq!(ReaderState::EMPTY.to_string(), "Empty");
        assert_eq!(
            (ReaderState::PRESENT | ReaderState::MUTE).to_string(),
            "Card Present Mute"
        );
    }

    #[test]
    fn test_from_bits_truncate() {
        assert_eq!(ReaderState::from_bits_truncate(0x0020), ReaderState::PRESENT);
        // CHANGED | INUSE and the event counter are not tracked
        assert_eq!(
            ReaderState::from_bits_truncate(0x0003_0122),
            ReaderState::PRESENT
        );
        assert_eq!(
            (ReaderState::EMPTY | ReaderState::UNAVAILABLE).bits(),
            0x0018
        );
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(Protocol::T1.to_string(), "T=1");
        let status = CardStatus {
            atr: vec![0x3B, 0x8F, 0x80],
            protocol: Some(Protocol::T1),
        };
        assert_eq!(status.atr_hex(), "3B8F80");
    }
}
