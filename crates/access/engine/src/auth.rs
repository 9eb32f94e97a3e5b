//! Key-trial authentication of single blocks
//!
//! Every default key is offered in turn with a LOAD/AUTHENTICATE pseudo-APDU
//! (`FF 88 00 <block> <60|61> <key>`) until the reader answers `90 00`.
//! A transport failure during one trial counts as a rejected key; no trial is
//! retried.
//!
//! What happens once every key is rejected is governed by [`AuthPolicy`].
//! Readers deployed with the reference firmware behave as
//! [`AuthPolicy::FailOpen`]: the block operation is attempted anyway and the
//! card itself refuses it if the block really is locked.

use derive_more::Display;
use nfc_access_apdu_core::{CardTransport, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::keys::{KeyCandidate, KeyType};

const AUTH_CLA: u8 = 0xFF;
const AUTH_INS: u8 = 0x88;

/// Outcome reported when no candidate key opens a block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthPolicy {
    /// Report success so the block operation is still attempted
    #[default]
    #[display("fail-open")]
    FailOpen,
    /// Report failure; the block operation is skipped
    #[display("fail-closed")]
    FailClosed,
}

/// Result of trying every candidate key on a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTrial {
    /// The candidate at `index` was accepted
    Accepted {
        /// Position of the key in the trial order
        index: usize,
        /// Accepted candidate
        candidate: KeyCandidate,
    },
    /// No candidate was accepted
    Exhausted,
}

/// Tries the default key list against a block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Authenticator {
    policy: AuthPolicy,
}

impl Authenticator {
    /// Authenticator applying `policy` when every key is rejected
    pub const fn new(policy: AuthPolicy) -> Self {
        Self { policy }
    }

    /// Configured policy
    pub const fn policy(&self) -> AuthPolicy {
        self.policy
    }

    /// Authenticate `block` with the default keys presented as `key_type`
    ///
    /// Returns `true` on the first accepted key. When all keys are rejected
    /// the result follows the policy.
    pub fn authenticate<T: CardTransport + ?Sized>(
        &self,
        transport: &mut T,
        block: u8,
        key_type: KeyType,
    ) -> bool {
        match Self::try_keys(transport, block, key_type) {
            KeyTrial::Accepted { index, .. } => {
                debug!(block, %key_type, key_index = index, "Authenticated block");
                true
            }
            KeyTrial::Exhausted => match self.policy {
                AuthPolicy::FailOpen => {
                    warn!(
                        block,
                        %key_type,
                        "No default key accepted; continuing (fail-open)"
                    );
                    true
                }
                AuthPolicy::FailClosed => {
                    warn!(block, %key_type, "No default key accepted");
                    false
                }
            },
        }
    }

    /// Offer each default key in order and report which one, if any, was accepted
    pub fn try_keys<T: CardTransport + ?Sized>(
        transport: &mut T,
        block: u8,
        key_type: KeyType,
    ) -> KeyTrial {
        for (index, candidate) in KeyCandidate::defaults(key_type).enumerate() {
            let frame = auth_frame(block, &candidate);
            match transport.transmit_raw(&frame) {
                Ok(raw) => match Response::from_bytes(&raw) {
                    Ok(response) if response.is_success() => {
                        return KeyTrial::Accepted { index, candidate };
                    }
                    Ok(response) => {
                        let status = response.status();
                        trace!(block, key_index = index, %status, "Key rejected");
                    }
                    Err(e) => {
                        trace!(block, key_index = index, error = %e, "Malformed auth response");
                    }
                },
                Err(e) => {
                    debug!(block, key_index = index, error = %e, "Auth trial failed in transport");
                }
            }
        }
        KeyTrial::Exhausted
    }
}

/// Build the 11-byte LOAD/AUTHENTICATE frame for one candidate
pub fn auth_frame(block: u8, candidate: &KeyCandidate) -> [u8; 11] {
    let mut frame = [0; 11];
    frame[..5].copy_from_slice(&[AUTH_CLA, AUTH_INS, 0x00, block, candidate.key_type.code()]);
    frame[5..].copy_from_slice(&candidate.key);
    frame
}
