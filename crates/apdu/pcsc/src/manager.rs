//! Device manager for PC/SC operations

use std::ffi::CString;

use nfc_access_apdu_core::{CardConnector, ReaderState, TransportError};
use pcsc::{Context, Scope};
use tracing::debug;

use crate::config::{ConnectStrategy, PcscConfig};
use crate::error::PcscError;
use crate::monitor::{PcscMonitor, from_pcsc_state};
use crate::transport::PcscTransport;

/// One reader as seen by [`PcscDeviceManager::list_readers`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderEntry {
    /// Reader name, as passed to [`PcscDeviceManager::open_reader`]
    pub name: String,
    /// Reader state at listing time
    pub state: ReaderState,
    /// ATR of the card in the reader, if one answered
    pub atr: Option<Vec<u8>>,
}

impl ReaderEntry {
    fn from_pcsc(reader_state: &pcsc::ReaderState) -> Self {
        let state = from_pcsc_state(reader_state.event_state());
        Self {
            name: reader_state.name().to_string_lossy().into_owned(),
            state,
            atr: Self::carries_atr(state).then(|| reader_state.atr().to_vec()),
        }
    }

    const fn carries_atr(state: ReaderState) -> bool {
        state.is_present() && !state.contains(ReaderState::MUTE)
    }

    /// Whether a card sits in the reader
    pub const fn has_card(&self) -> bool {
        self.state.is_present()
    }

    /// ATR as uppercase hex
    pub fn atr_hex(&self) -> Option<String> {
        self.atr.as_deref().map(hex::encode_upper)
    }
}

/// Manager for PC/SC device operations
///
/// Owns the PC/SC context; the context is released when the last clone of it
/// (held by this manager and any monitors it created) is dropped.
#[allow(missing_debug_implementations)]
pub struct PcscDeviceManager {
    /// PC/SC context
    context: Context,
    /// Configuration used for every connect
    config: PcscConfig,
}

impl PcscDeviceManager {
    /// Create a new PC/SC device manager
    pub fn new() -> Result<Self, PcscError> {
        Self::with_config(PcscConfig::default())
    }

    /// Create a new PC/SC device manager with a connect configuration
    pub fn with_config(config: PcscConfig) -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context, config })
    }

    /// List all available card readers
    ///
    /// A reader whose status cannot be read is listed as [`ReaderState::UNAVAILABLE`].
    pub fn list_readers(&self) -> Result<Vec<ReaderEntry>, PcscError> {
        let readers = match self.context.list_readers_owned() {
            Ok(readers) => readers,
            Err(pcsc::Error::NoReadersAvailable) => return Err(PcscError::NoReadersAvailable),
            Err(e) => return Err(e.into()),
        };
        if readers.is_empty() {
            return Err(PcscError::NoReadersAvailable);
        }

        let mut result = Vec::with_capacity(readers.len());

        for reader_name in readers {
            let mut reader_state =
                pcsc::ReaderState::new(reader_name.clone(), pcsc::State::UNAWARE);

            let entry = match self
                .context
                .get_status_change(None, std::slice::from_mut(&mut reader_state))
            {
                Ok(()) => ReaderEntry::from_pcsc(&reader_state),
                Err(e) => {
                    debug!(reader = ?reader_name, error = %e, "Reader status unavailable");
                    ReaderEntry {
                        name: reader_name.to_string_lossy().into_owned(),
                        state: ReaderState::UNAVAILABLE,
                        atr: None,
                    }
                }
            };
            result.push(entry);
        }

        Ok(result)
    }

    /// Choose a reader according to `strategy`
    pub fn select_reader(&self, strategy: &ConnectStrategy) -> Result<ReaderEntry, PcscError> {
        let readers = self.list_readers()?;
        let found = match strategy {
            ConnectStrategy::Reader(name) => {
                return readers
                    .into_iter()
                    .find(|r| r.name == *name)
                    .ok_or_else(|| PcscError::ReaderNotFound(name.clone()));
            }
            ConnectStrategy::AnyCard => readers.into_iter().find(ReaderEntry::has_card),
            ConnectStrategy::FirstAvailable => readers.into_iter().next(),
        };

        found.ok_or_else(|| PcscError::NoCard("No reader with card found".to_string()))
    }

    /// Open a connection to the card in `reader_name`
    pub fn open_reader(&self, reader_name: &str) -> Result<PcscTransport, PcscError> {
        let reader = CString::new(reader_name)
            .map_err(|_| PcscError::InvalidReaderName(reader_name.to_string()))?;

        let card = match self.context.connect(
            &reader,
            self.config.share_mode.into(),
            self.config.protocols,
        ) {
            Ok(card) => card,
            Err(pcsc::Error::NoSmartcard) => {
                return Err(PcscError::NoCard(reader_name.to_string()));
            }
            Err(pcsc::Error::UnknownReader) => {
                return Err(PcscError::ReaderNotFound(reader_name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        debug!(reader = reader_name, "Connected to card");
        Ok(PcscTransport::new(
            card,
            reader_name.to_string(),
            self.config.clone(),
        ))
    }

    /// Create a status-change monitor for one reader
    pub fn monitor(&self, reader_name: &str) -> Result<PcscMonitor, PcscError> {
        PcscMonitor::new(self.context.clone(), reader_name)
    }
}

impl CardConnector for PcscDeviceManager {
    type Transport = PcscTransport;

    fn connect(&mut self, reader: &str) -> Result<PcscTransport, TransportError> {
        self.open_reader(reader).map_err(|e| match e {
            PcscError::Pcsc(_) => TransportError::connection(e.to_string()),
            other => other.into(),
        })
    }
}
