//! Core traits and types for APDU exchange with contactless card readers
//!
//! This crate provides the foundational types for talking to cards through a
//! PC/SC-style reader:
//!
//! - Building short APDU command frames
//! - Parsing responses and interpreting status words
//! - The blocking [`CardTransport`], [`CardConnector`] and [`ReaderMonitor`]
//!   seams that concrete readers implement
//!
//! With the `mock` feature an in-memory card and reader are available for tests.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod reader;
pub mod response;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

mod error;
pub use error::{Error, Result, ResultExt};

pub use command::Command;
pub use reader::{CardStatus, Protocol, ReaderMonitor, ReaderState};
pub use response::status::StatusWord;
pub use response::{Response, utils};
pub use transport::{CardConnector, CardTransport, TransportError, WaitError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, CardConnector, CardStatus, CardTransport, Command, Error, ReaderMonitor,
        ReaderState, Response, Result, StatusWord, TransportError, WaitError,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let cmd = Command::new_with_le(0xFF, 0xCA, 0x00, 0x00, 0x00);
        assert_eq!(cmd.cla, 0xFF);
        assert_eq!(cmd.ins, 0xCA);

        let resp = Response::from_bytes(&[0x01, 0x02, 0x03, 0x90, 0x00]).unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.payload().as_ref(), &[0x01, 0x02, 0x03]);
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
    }
}
