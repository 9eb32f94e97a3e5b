//! PC/SC transport implementation for contactless card readers
//!
//! This crate implements the `CardTransport`, `CardConnector` and
//! `ReaderMonitor` seams from `nfc-access-apdu-core` on top of the PC/SC API.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use nfc_access_apdu_core::prelude::*;
//! use nfc_access_transport_pcsc::PcscDeviceManager;
//!
//! let manager = PcscDeviceManager::new()?;
//!
//! let readers = manager.list_readers()?;
//! let reader = &readers[0];
//! println!("Connecting to reader: {} ({})", reader.name, reader.state);
//!
//! let mut transport = manager.open_reader(&reader.name)?;
//! let response = Response::from_bytes(&transport.transmit_raw(&[0xFF, 0xCA, 0x00, 0x00, 0x00])?)?;
//! println!("UID response: {:?}", response);
//! transport.disconnect()?;
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod error;
mod manager;
mod monitor;
mod transport;

pub use config::{ConnectStrategy, Disposition, PcscConfig, ShareMode};
pub use error::PcscError;
pub use manager::{PcscDeviceManager, ReaderEntry};
pub use monitor::PcscMonitor;
pub use transport::PcscTransport;

// Re-export some pcsc types for convenience
pub use pcsc::Protocols;
