//! Status-change monitor for a single PC/SC reader

use std::ffi::CString;
use std::time::Duration;

use nfc_access_apdu_core::{ReaderMonitor, ReaderState, TransportError, WaitError};
use pcsc::{Context, State};
use tracing::trace;

use crate::error::PcscError;

/// Blocking monitor for card insertion and removal on one reader
///
/// The raw PC/SC state of the last wait is kept and handed back to the
/// service on the next one, so a wait only returns on a real change.
#[allow(missing_debug_implementations)]
pub struct PcscMonitor {
    /// PC/SC context
    context: Context,
    /// Raw state of the watched reader as last reported by the service
    watched: pcsc::ReaderState,
    /// Watched reader, for display
    reader_name: String,
}

impl PcscMonitor {
    /// Create a new monitor
    pub(crate) fn new(context: Context, reader_name: &str) -> Result<Self, PcscError> {
        let reader = CString::new(reader_name)
            .map_err(|_| PcscError::InvalidReaderName(reader_name.to_string()))?;
        let watched = pcsc::ReaderState::new(reader, State::UNAWARE);

        Ok(Self {
            context,
            watched,
            reader_name: reader_name.to_string(),
        })
    }

    /// Make the next wait start from `current`
    ///
    /// When the caller still agrees with the last reported state the raw
    /// service state is reused as is. Otherwise the watch restarts from
    /// `UNAWARE` and the service reports the present state right away.
    fn prepare(&mut self, current: ReaderState) {
        if needs_resync(self.watched.event_state(), current) {
            self.watched = pcsc::ReaderState::new(self.watched.name().to_owned(), State::UNAWARE);
        } else {
            self.watched.sync_current_state();
        }
    }
}

/// Map PC/SC state flags onto [`ReaderState`]
///
/// Flags and event counter bits with no counterpart are dropped.
#[allow(clippy::unnecessary_cast)]
pub(crate) fn from_pcsc_state(state: State) -> ReaderState {
    ReaderState::from_bits_truncate(state.bits() as u32)
}

/// Whether the caller's view of the reader diverged from the last raw state
pub(crate) fn needs_resync(last_event: State, current: ReaderState) -> bool {
    from_pcsc_state(last_event) != current
}

impl ReaderMonitor for PcscMonitor {
    fn reader_name(&self) -> &str {
        &self.reader_name
    }

    fn wait_status_change(
        &mut self,
        current: ReaderState,
        timeout: Option<Duration>,
    ) -> Result<ReaderState, WaitError> {
        self.prepare(current);

        trace!(reader = %self.reader_name, %current, "Waiting for status change");
        match self
            .context
            .get_status_change(timeout, std::slice::from_mut(&mut self.watched))
        {
            Ok(()) => Ok(from_pcsc_state(self.watched.event_state())),
            Err(pcsc::Error::Timeout) => Ok(current),
            Err(e) => Err(WaitError::new(
                from_pcsc_state(self.watched.event_state()),
                TransportError::from(PcscError::from(e)),
            )),
        }
    }
}
