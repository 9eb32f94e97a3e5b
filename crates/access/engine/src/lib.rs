//! Card session protocol engine for NFC door access
//!
//! Watches a contactless reader for cards, runs one exclusive session per
//! inserted card and decides whether the card may enter:
//!
//! - [`presence`] turns reader status changes into insert/remove edges
//! - [`session`] owns the card handle from connect to disconnect
//! - [`auth`] and [`codec`] unlock and move 16-byte blocks
//! - [`registry`] keeps the locally authorized cards
//! - [`report`] asks and informs the remote authorization service
//! - [`gate`] wires all of the above into a door controller
//!
//! Everything is blocking and single threaded. Readers are reached through
//! the [`CardConnector`](nfc_access_apdu_core::CardConnector) and
//! [`ReaderMonitor`](nfc_access_apdu_core::ReaderMonitor) traits, so the
//! engine runs unchanged against PC/SC or the in-memory mock.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

pub mod auth;
pub mod codec;
pub mod config;
pub mod gate;
pub mod keys;
pub mod presence;
pub mod profile;
pub mod registry;
pub mod report;
pub mod session;
pub mod uid;

mod error;
pub use error::AccessError;

pub use auth::{AuthPolicy, Authenticator};
pub use codec::{BLOCK_SIZE, BlockData};
pub use config::AccessConfig;
pub use gate::{
    AuthorizationDecision, DecisionSource, Flow, Gate, GateEvent, GateOptions, NoopHandler,
    SessionHandler, Step,
};
pub use keys::{KeyCandidate, KeyType};
pub use presence::{PresenceEvent, PresenceLoop};
pub use profile::{StoredProfile, UserProfile};
pub use registry::{AddOutcome, Registry};
pub use report::{
    AccessEvent, AuthorizationService, HttpAuthorizationService, OfflineAuthorizationService,
};
pub use session::{CardSession, SessionState};
pub use uid::CardUid;
