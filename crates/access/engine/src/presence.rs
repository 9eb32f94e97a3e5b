//! Reader presence edge detection

use std::time::Duration;

use nfc_access_apdu_core::{ReaderMonitor, ReaderState};
use tracing::{debug, info};

use crate::AccessError;

/// Change observed by one [`PresenceLoop::poll_next_event`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    /// A card arrived
    CardInserted {
        /// State reported with the edge
        state: ReaderState,
    },
    /// The card left
    CardRemoved {
        /// State reported with the edge
        state: ReaderState,
    },
    /// State changed without crossing the present edge
    StateChanged {
        /// State before the wait
        previous: ReaderState,
        /// State after the wait
        current: ReaderState,
    },
    /// Nothing changed before the timeout
    NoChange,
}

/// Tracks a single reader's state across status-change waits
#[derive(Debug)]
pub struct PresenceLoop<M> {
    monitor: M,
    current_state: ReaderState,
}

impl<M: ReaderMonitor> PresenceLoop<M> {
    /// Start tracking from [`ReaderState::UNAWARE`]
    ///
    /// The first wait returns immediately with the reader's actual state, so a
    /// card already in the reader produces a [`PresenceEvent::CardInserted`].
    pub const fn new(monitor: M) -> Self {
        Self {
            monitor,
            current_state: ReaderState::UNAWARE,
        }
    }

    /// Name of the watched reader
    pub fn reader_name(&self) -> &str {
        self.monitor.reader_name()
    }

    /// Last known state
    pub const fn current_state(&self) -> ReaderState {
        self.current_state
    }

    /// Underlying monitor
    pub const fn monitor(&self) -> &M {
        &self.monitor
    }

    /// Block until the reader state changes or `timeout` elapses
    ///
    /// `current_state` is advanced to the observed state even when the wait
    /// fails, so an edge is never reported twice.
    pub fn poll_next_event(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<PresenceEvent, AccessError> {
        let (observed, failure) = match self.monitor.wait_status_change(self.current_state, timeout)
        {
            Ok(state) => (state, None),
            Err(e) => (e.event_state, Some(e.source)),
        };
        let previous = std::mem::replace(&mut self.current_state, observed);

        if let Some(source) = failure {
            debug!(state = %observed, error = %source, "Status change wait failed");
            return Err(AccessError::Transport(source));
        }

        let event = if observed.is_present() && !previous.is_present() {
            info!(reader = self.monitor.reader_name(), "Card inserted");
            PresenceEvent::CardInserted { state: observed }
        } else if !observed.is_present() && previous.is_present() {
            info!(reader = self.monitor.reader_name(), "Card removed");
            PresenceEvent::CardRemoved { state: observed }
        } else if observed != previous {
            debug!(%previous, current = %observed, "Reader State");
            PresenceEvent::StateChanged {
                previous,
                current: observed,
            }
        } else {
            PresenceEvent::NoChange
        };
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nfc_access_apdu_core::TransportError;
    use nfc_access_apdu_core::mock::ScriptedMonitor;

    #[test]
    fn test_edges() {
        let monitor = ScriptedMonitor::new("Mock Reader 0")
            .then_state(ReaderState::EMPTY)
            .then_state(ReaderState::PRESENT)
            .then_state(ReaderState::PRESENT | ReaderState::MUTE)
            .then_state(ReaderState::EMPTY);
        let mut presence = PresenceLoop::new(monitor);

        assert_eq!(
            presence.poll_next_event(None).unwrap(),
            PresenceEvent::StateChanged {
                previous: ReaderState::UNAWARE,
                current: ReaderState::EMPTY
            }
        );
        assert_eq!(
            presence.poll_next_event(None).unwrap(),
            PresenceEvent::CardInserted {
                state: ReaderState::PRESENT
            }
        );
        assert!(matches!(
            presence.poll_next_event(None).unwrap(),
            PresenceEvent::StateChanged { .. }
        ));
        assert_eq!(
            presence.poll_next_event(None).unwrap(),
            PresenceEvent::CardRemoved {
                state: ReaderState::EMPTY
            }
        );
        assert_eq!(presence.poll_next_event(None).unwrap(), PresenceEvent::NoChange);
    }

    #[test]
    fn test_state_advances_on_error() {
        let monitor = ScriptedMonitor::new("Mock Reader 0")
            .then_error(
                ReaderState::PRESENT,
                TransportError::ReaderUnavailable("unplugged".into()),
            )
            .then_state(ReaderState::PRESENT);
        let mut presence = PresenceLoop::new(monitor);

        assert!(presence.poll_next_event(None).unwrap_err().is_transport());
        assert_eq!(presence.current_state(), ReaderState::PRESENT);
        // the edge was consumed by the failed wait
        assert_eq!(presence.poll_next_event(None).unwrap(), PresenceEvent::NoChange);
    }

    #[test]
    fn test_card_present_at_start() {
        let monitor = ScriptedMonitor::new("Mock Reader 0").then_state(ReaderState::PRESENT);
        let mut presence = PresenceLoop::new(monitor);
        assert!(matches!(
            presence.poll_next_event(Some(Duration::from_millis(10))).unwrap(),
            PresenceEvent::CardInserted { .. }
        ));
        assert_eq!(presence.monitor().waits(), 1);
    }
}
