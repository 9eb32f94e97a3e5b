//! In-memory stand-ins for a reader and a Mifare-Classic-style card
//!
//! [`MockCard`] answers the PC/SC pseudo-APDUs a contactless reader
//! understands (GET UID, LOAD/AUTHENTICATE, READ BINARY, UPDATE BINARY).
//! Clones share state, so a test can keep one handle while the code under
//! test owns another.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::reader::{CardStatus, Protocol, ReaderMonitor, ReaderState};
use crate::response::status::{StatusWord, common};
use crate::transport::{CardConnector, CardTransport, TransportError, WaitError};

const BLOCK_LEN: usize = 16;
const FACTORY_KEY: [u8; 6] = [0xFF; 6];

#[derive(Debug)]
struct CardState {
    uid: Vec<u8>,
    atr: Vec<u8>,
    blocks: HashMap<u8, [u8; BLOCK_LEN]>,
    keys: HashMap<u8, (u8, [u8; 6])>,
    authenticated: Option<u8>,
    uid_response: Option<Bytes>,
    failing_instructions: HashSet<u8>,
    commands: Vec<Bytes>,
    connected: bool,
    connects: usize,
    disconnects: usize,
}

/// Simulated contactless card
#[derive(Debug, Clone)]
pub struct MockCard {
    state: Rc<RefCell<CardState>>,
}

impl MockCard {
    /// Create a card with the given UID whose blocks all open with the factory key A
    pub fn new(uid: &[u8]) -> Self {
        Self {
            state: Rc::new(RefCell::new(CardState {
                uid: uid.to_vec(),
                atr: vec![
                    0x3B, 0x8F, 0x80, 0x01, 0x80, 0x4F, 0x0C, 0xA0, 0x00, 0x00, 0x03, 0x06,
                    0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x6A,
                ],
                blocks: HashMap::new(),
                keys: HashMap::new(),
                authenticated: None,
                uid_response: None,
                failing_instructions: HashSet::new(),
                commands: Vec::new(),
                connected: true,
                connects: 0,
                disconnects: 0,
            })),
        }
    }

    /// Protect `block` with a specific key type (0x60 or 0x61) and value
    pub fn with_block_key(self, block: u8, key_type: u8, key: [u8; 6]) -> Self {
        self.state.borrow_mut().keys.insert(block, (key_type, key));
        self
    }

    /// Answer GET UID with these raw bytes instead of `uid || 90 00`
    pub fn with_uid_response(self, raw: &[u8]) -> Self {
        self.state.borrow_mut().uid_response = Some(Bytes::copy_from_slice(raw));
        self
    }

    /// Fail every transmit whose INS byte is `ins`
    pub fn failing_instruction(self, ins: u8) -> Self {
        self.state.borrow_mut().failing_instructions.insert(ins);
        self
    }

    /// Preload a block
    pub fn with_block(self, block: u8, data: [u8; BLOCK_LEN]) -> Self {
        self.state.borrow_mut().blocks.insert(block, data);
        self
    }

    /// Current content of a block
    pub fn block(&self, block: u8) -> [u8; BLOCK_LEN] {
        self.state
            .borrow()
            .blocks
            .get(&block)
            .copied()
            .unwrap_or([0; BLOCK_LEN])
    }

    /// Every command received so far
    pub fn commands(&self) -> Vec<Bytes> {
        self.state.borrow().commands.clone()
    }

    /// Commands received with the given INS byte
    pub fn commands_with_ins(&self, ins: u8) -> Vec<Bytes> {
        self.commands()
            .into_iter()
            .filter(|c| c.len() > 1 && c[1] == ins)
            .collect()
    }

    /// Number of times the handle was released
    pub fn disconnects(&self) -> usize {
        self.state.borrow().disconnects
    }

    /// Number of times a connector handed this card out
    pub fn connects(&self) -> usize {
        self.state.borrow().connects
    }

    fn respond(state: &mut CardState, command: &[u8]) -> Bytes {
        let reply = |payload: &[u8], status: StatusWord| {
            let mut buf = BytesMut::with_capacity(payload.len() + 2);
            buf.put_slice(payload);
            buf.put_u8(status.sw1);
            buf.put_u8(status.sw2);
            buf.freeze()
        };

        match command {
            [0xFF, 0xCA, 0x00, 0x00, 0x00] => match &state.uid_response {
                Some(raw) => raw.clone(),
                None => reply(&state.uid, common::SUCCESS),
            },
            [0xFF, 0x88, 0x00, block, key_type, key @ ..] if key.len() == 6 => {
                let expected = state
                    .keys
                    .get(block)
                    .copied()
                    .unwrap_or((0x60, FACTORY_KEY));
                if expected.0 == *key_type && expected.1 == key {
                    state.authenticated = Some(*block);
                    reply(&[], common::SUCCESS)
                } else {
                    state.authenticated = None;
                    reply(&[], common::OPERATION_FAILED)
                }
            }
            [0xFF, 0xB0, 0x00, block, 0x10] => {
                if state.authenticated != Some(*block) {
                    return reply(&[], common::SECURITY_CONDITION_NOT_SATISFIED);
                }
                let data = state.blocks.get(block).copied().unwrap_or([0; BLOCK_LEN]);
                reply(&data, common::SUCCESS)
            }
            [0xFF, 0xD6, 0x00, block, 0x10, data @ ..] if data.len() == BLOCK_LEN => {
                if state.authenticated != Some(*block) {
                    return reply(&[], common::SECURITY_CONDITION_NOT_SATISFIED);
                }
                let mut stored = [0; BLOCK_LEN];
                stored.copy_from_slice(data);
                state.blocks.insert(*block, stored);
                reply(&[], common::SUCCESS)
            }
            [_, _, ..] => reply(&[], common::INVALID_INSTRUCTION),
            _ => reply(&[], common::WRONG_LENGTH),
        }
    }
}

impl CardTransport for MockCard {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        let mut state = self.state.borrow_mut();
        if !state.connected {
            return Err(TransportError::Disconnected);
        }

        state.commands.push(Bytes::copy_from_slice(command));

        if command.len() > 1 && state.failing_instructions.contains(&command[1]) {
            return Err(TransportError::Transmission);
        }

        Ok(Self::respond(&mut state, command))
    }

    fn status(&self) -> Result<CardStatus, TransportError> {
        let state = self.state.borrow();
        if !state.connected {
            return Err(TransportError::Disconnected);
        }
        Ok(CardStatus {
            atr: state.atr.clone(),
            protocol: Some(Protocol::T1),
        })
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.connected {
            state.connected = false;
            state.authenticated = None;
            state.disconnects += 1;
        }
        Ok(())
    }
}

/// Connector that hands out a [`MockCard`]
#[derive(Debug, Clone)]
pub struct MockConnector {
    card: Option<MockCard>,
}

impl MockConnector {
    /// Connector whose reader holds `card`
    pub const fn new(card: MockCard) -> Self {
        Self { card: Some(card) }
    }

    /// Connector whose connect attempts always fail
    pub const fn failing() -> Self {
        Self { card: None }
    }
}

impl CardConnector for MockConnector {
    type Transport = MockCard;

    fn connect(&mut self, reader: &str) -> Result<MockCard, TransportError> {
        let card = self
            .card
            .clone()
            .ok_or_else(|| TransportError::connection(format!("no card answers on {reader}")))?;
        {
            let mut state = card.state.borrow_mut();
            state.connected = true;
            state.authenticated = None;
            state.connects += 1;
        }
        Ok(card)
    }
}

/// Reader monitor replaying a fixed script of wait outcomes
///
/// Once the script runs out every wait reports "no change".
#[derive(Debug, Clone)]
pub struct ScriptedMonitor {
    reader: String,
    script: VecDeque<Result<ReaderState, WaitError>>,
    waits: usize,
}

impl ScriptedMonitor {
    /// Monitor for `reader` with an empty script
    pub fn new(reader: impl Into<String>) -> Self {
        Self {
            reader: reader.into(),
            script: VecDeque::new(),
            waits: 0,
        }
    }

    /// Append a successful wait reporting `state`
    pub fn then_state(mut self, state: ReaderState) -> Self {
        self.script.push_back(Ok(state));
        self
    }

    /// Append a failed wait
    pub fn then_error(mut self, event_state: ReaderState, source: TransportError) -> Self {
        self.script.push_back(Err(WaitError::new(event_state, source)));
        self
    }

    /// Number of waits performed
    pub const fn waits(&self) -> usize {
        self.waits
    }
}

impl ReaderMonitor for ScriptedMonitor {
    fn reader_name(&self) -> &str {
        &self.reader
    }

    fn wait_status_change(
        &mut self,
        current: ReaderState,
        _timeout: Option<Duration>,
    ) -> Result<ReaderState, WaitError> {
        self.waits += 1;
        self.script.pop_front().unwrap_or(Ok(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_uid() {
        let mut card = MockCard::new(&[0x04, 0xA1, 0xB2, 0xC3]);
        let resp = card.transmit_raw(&[0xFF, 0xCA, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(resp.as_ref(), &[0x04, 0xA1, 0xB2, 0xC3, 0x90, 0x00]);
    }

    #[test]
    fn test_read_requires_auth() {
        let mut card = MockCard::new(&[0x01]);
        let resp = card.transmit_raw(&[0xFF, 0xB0, 0x00, 0x04, 0x10]).unwrap();
        assert_eq!(resp.as_ref(), &[0x69, 0x82]);

        let auth = [0xFF, 0x88, 0x00, 0x04, 0x60, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(card.transmit_raw(&auth).unwrap().as_ref(), &[0x90, 0x00]);
        let resp = card.transmit_raw(&[0xFF, 0xB0, 0x00, 0x04, 0x10]).unwrap();
        assert_eq!(resp.len(), 18);
    }

    #[test]
    fn test_disconnect_is_counted_once() {
        let mut card = MockCard::new(&[0x01]);
        let observer = card.clone();
        card.disconnect().unwrap();
        card.disconnect().unwrap();
        assert_eq!(observer.disconnects(), 1);
        assert_eq!(
            card.transmit_raw(&[0xFF, 0xCA, 0x00, 0x00, 0x00]),
            Err(TransportError::Disconnected)
        );
    }
}
