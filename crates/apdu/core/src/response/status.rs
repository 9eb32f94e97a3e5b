//! Status words returned by contactless readers

use std::fmt;

use tracing::Level;

/// Status Word (SW1-SW2) trailing every reader response
///
/// Compared as the exact byte pair, never as a numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Whether the reader accepted the command (exactly `90 00`)
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Whether the reader refused without a protocol fault
    ///
    /// A rejected key (`63 00`) or a block read before authentication
    /// (`69 82`) is an expected outcome of the key trial, not a malfunction.
    pub const fn is_refusal(&self) -> bool {
        matches!((self.sw1, self.sw2), (0x63, 0x00) | (0x69, 0x82))
    }

    /// Level at which a response carrying this status is logged
    pub const fn tracing_level(&self) -> Level {
        if self.is_success() {
            Level::DEBUG
        } else if self.is_refusal() {
            Level::INFO
        } else {
            Level::WARN
        }
    }

    /// What the reader means by this status
    pub const fn description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "Success",
            (0x62, 0x82) => "End of data reached before Le bytes",
            (0x63, 0x00) => "Operation failed",
            (0x65, 0x81) => "Memory failure",
            (0x67, 0x00) => "Wrong length",
            (0x68, 0x00) => "Class byte function not supported",
            (0x69, 0x82) => "Security status not satisfied",
            (0x69, 0x86) => "Command not allowed",
            (0x6A, 0x81) => "Function not supported",
            (0x6A, 0x82) => "Card not found or block out of range",
            (0x6B, 0x00) => "Wrong parameters P1-P2",
            (0x6D, 0x00) => "Instruction not supported",
            (0x6E, 0x00) => "Class not supported",
            _ => "Unknown status word",
        }
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.sw1, self.sw2)
    }
}

/// Status words a Mifare Classic reader answers with
pub mod common {
    use super::StatusWord;

    /// Command accepted (90 00)
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);

    /// Rejected key or failed card operation (63 00)
    pub const OPERATION_FAILED: StatusWord = StatusWord::new(0x63, 0x00);

    /// Frame length does not match the instruction (67 00)
    pub const WRONG_LENGTH: StatusWord = StatusWord::new(0x67, 0x00);

    /// Block accessed without authentication (69 82)
    pub const SECURITY_CONDITION_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x82);

    /// Unknown instruction (6D 00)
    pub const INVALID_INSTRUCTION: StatusWord = StatusWord::new(0x6D, 0x00);
}
