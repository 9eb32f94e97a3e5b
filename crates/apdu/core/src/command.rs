//! APDU command definitions
//!
//! This module provides the short-form command frame used by PC/SC
//! contactless readers (class `FF` pseudo-APDUs and ISO/IEC 7816-4 commands).

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::Error;

/// Maximum length of a short APDU data field
pub const MAX_SHORT_DATA: usize = 255;

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<u8>,
}

impl Command {
    /// Create a new command with expected response length (Le)
    pub const fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: Some(le),
        }
    }

    /// Create a new command with data payload
    ///
    /// # Errors
    /// Returns [`Error::InvalidCommandLength`] if the payload does not fit a
    /// short APDU.
    pub fn new_with_data<T: Into<Bytes>>(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: T,
    ) -> Result<Self, Error> {
        let data = data.into();
        if data.len() > MAX_SHORT_DATA {
            return Err(Error::InvalidCommandLength(data.len()));
        }

        Ok(Self {
            cla,
            ins,
            p1,
            p2,
            data: Some(data),
            le: None,
        })
    }

    /// Calculate length of serialized command
    pub fn command_length(&self) -> usize {
        // CLA, INS, P1, P2
        let mut length = 4;
        if let Some(data) = &self.data {
            length += 1 + data.len();
        }
        if self.le.is_some() {
            length += 1;
        }
        length
    }

    /// Convert to raw APDU bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if let Some(data) = &self.data {
            // Length is bounded by the constructors
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.to_bytes()))
    }
}
