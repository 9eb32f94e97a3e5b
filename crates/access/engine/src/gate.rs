//! Door controller tying presence, sessions, registry and reporting together
//!
//! One [`Gate::step`] waits for a reader event. On card insertion it runs a
//! full session: connect, log the ATR, identify, authorize, report, hand the
//! session to a [`SessionHandler`], disconnect. Card-level failures end that
//! session only; the gate keeps running.

use std::thread;
use std::time::Duration;

use derive_more::Display;
use nfc_access_apdu_core::{CardConnector, CardTransport, ReaderMonitor, ReaderState};
use tracing::{debug, info, warn};

use crate::AccessError;
use crate::auth::Authenticator;
use crate::config::AccessConfig;
use crate::presence::{PresenceEvent, PresenceLoop};
use crate::registry::Registry;
use crate::report::{AccessEvent, AuthorizationService};
use crate::session::CardSession;
use crate::uid::CardUid;

/// Where an authorization decision came from
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum DecisionSource {
    /// The card is in the local registry
    #[display("registry ({name})")]
    Registry {
        /// Registered display name
        name: String,
    },
    /// The remote service answered
    #[display("remote")]
    Remote,
    /// The remote service could not be reached or answered garbage
    #[display("remote unavailable")]
    RemoteUnavailable,
    /// Not registered and remote checks are disabled
    #[display("not registered")]
    NotRegistered,
}

/// Authorization outcome for one card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    /// Whether access is granted
    pub authorized: bool,
    /// Who decided
    pub source: DecisionSource,
}

/// Whether the gate should keep running after a card
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flow {
    /// Wait for the next card
    #[default]
    Continue,
    /// Stop [`Gate::run`]
    Stop,
}

/// Per-card hook run while the session is still connected
pub trait SessionHandler<T: CardTransport> {
    /// Work with the identified card before it is disconnected
    fn on_card(
        &mut self,
        session: &mut CardSession<T>,
        registry: &mut Registry,
        decision: &AuthorizationDecision,
    ) -> Flow;
}

/// Handler that does nothing with the card
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl<T: CardTransport> SessionHandler<T> for NoopHandler {
    fn on_card(
        &mut self,
        _session: &mut CardSession<T>,
        _registry: &mut Registry,
        _decision: &AuthorizationDecision,
    ) -> Flow {
        Flow::Continue
    }
}

impl<T, F> SessionHandler<T> for F
where
    T: CardTransport,
    F: FnMut(&mut CardSession<T>, &mut Registry, &AuthorizationDecision) -> Flow,
{
    fn on_card(
        &mut self,
        session: &mut CardSession<T>,
        registry: &mut Registry,
        decision: &AuthorizationDecision,
    ) -> Flow {
        self(session, registry, decision)
    }
}

/// What one [`Gate::step`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// A card was identified and granted access
    Admitted {
        /// Card UID
        uid: CardUid,
        /// Who granted access
        source: DecisionSource,
    },
    /// A card was identified and refused
    Denied {
        /// Card UID
        uid: CardUid,
        /// Who refused access
        source: DecisionSource,
    },
    /// The card did not return a usable UID
    InvalidCard,
    /// Connecting to the inserted card failed
    ConnectFailed,
    /// The card left the reader
    Removed,
    /// The reader state changed without a card edge
    StateChanged {
        /// State before the wait
        previous: ReaderState,
        /// State after the wait
        current: ReaderState,
    },
    /// Nothing happened before the wait timed out
    Idle,
}

/// Result of one [`Gate::step`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// What happened
    pub event: GateEvent,
    /// What the handler asked for
    pub flow: Flow,
}

impl Step {
    const fn new(event: GateEvent) -> Self {
        Self {
            event,
            flow: Flow::Continue,
        }
    }
}

/// Tunables for a [`Gate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOptions {
    /// Key-trial policy for block I/O
    pub authenticator: Authenticator,
    /// Consult the remote service for unregistered cards
    pub remote_check: bool,
    /// Status-change wait timeout; `None` waits indefinitely
    pub wait_timeout: Option<Duration>,
    /// Pause after a failed status-change wait
    pub error_backoff: Duration,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            authenticator: Authenticator::default(),
            remote_check: true,
            wait_timeout: None,
            error_backoff: Duration::from_secs(1),
        }
    }
}

impl GateOptions {
    /// Options taken from the `auth` section
    pub fn from_config(config: &AccessConfig) -> Self {
        Self {
            authenticator: Authenticator::new(config.auth.policy),
            remote_check: config.auth.remote_check,
            ..Self::default()
        }
    }
}

/// Single-reader access controller
#[derive(Debug)]
pub struct Gate<C, M, A> {
    connector: C,
    presence: PresenceLoop<M>,
    service: A,
    registry: Registry,
    options: GateOptions,
}

impl<C, M, A> Gate<C, M, A>
where
    C: CardConnector,
    M: ReaderMonitor,
    A: AuthorizationService,
{
    /// Gate with an empty registry
    pub fn new(connector: C, monitor: M, service: A, options: GateOptions) -> Self {
        Self {
            connector,
            presence: PresenceLoop::new(monitor),
            service,
            registry: Registry::new(),
            options,
        }
    }

    /// Replace the registry
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Authorized cards
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Authorized cards, mutably
    pub const fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Authorization service
    pub const fn service(&self) -> &A {
        &self.service
    }

    /// Presence tracker
    pub const fn presence(&self) -> &PresenceLoop<M> {
        &self.presence
    }

    /// Name of the watched reader
    pub fn reader_name(&self) -> &str {
        self.presence.reader_name()
    }

    /// Wait for one reader event and act on it
    ///
    /// Only a failed status-change wait is returned as an error.
    pub fn step<H>(&mut self, handler: &mut H) -> Result<Step, AccessError>
    where
        H: SessionHandler<C::Transport>,
    {
        let step = match self.presence.poll_next_event(self.options.wait_timeout)? {
            PresenceEvent::CardInserted { .. } => self.handle_card(handler),
            PresenceEvent::CardRemoved { .. } => Step::new(GateEvent::Removed),
            PresenceEvent::StateChanged { previous, current } => {
                info!(reader = self.presence.reader_name(), state = %current, "Reader State");
                Step::new(GateEvent::StateChanged { previous, current })
            }
            PresenceEvent::NoChange => Step::new(GateEvent::Idle),
        };
        Ok(step)
    }

    /// Run until the handler returns [`Flow::Stop`]
    ///
    /// Wait failures are logged and retried after the configured backoff.
    pub fn run<H>(&mut self, handler: &mut H)
    where
        H: SessionHandler<C::Transport>,
    {
        loop {
            match self.step(handler) {
                Ok(Step {
                    flow: Flow::Stop, ..
                }) => {
                    info!("Gate stopped");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Status change error");
                    thread::sleep(self.options.error_backoff);
                }
            }
        }
    }

    /// Decide whether `uid` may enter
    ///
    /// A registry hit wins without asking the remote service. Any remote
    /// failure is treated as a refusal.
    pub fn authorize(&mut self, uid: &CardUid) -> AuthorizationDecision {
        if let Some(name) = self.registry.contains(uid) {
            info!(%uid, name, "Access granted (registered card)");
            return AuthorizationDecision {
                authorized: true,
                source: DecisionSource::Registry {
                    name: name.to_string(),
                },
            };
        }

        if !self.options.remote_check {
            info!(%uid, "Access denied (not registered)");
            return AuthorizationDecision {
                authorized: false,
                source: DecisionSource::NotRegistered,
            };
        }

        match self.service.check_access(uid) {
            Ok(authorized) => {
                info!(%uid, authorized, "Remote access decision");
                AuthorizationDecision {
                    authorized,
                    source: DecisionSource::Remote,
                }
            }
            Err(e) => {
                warn!(%uid, error = %e, "Access check failed; treating card as unauthorized");
                AuthorizationDecision {
                    authorized: false,
                    source: DecisionSource::RemoteUnavailable,
                }
            }
        }
    }

    fn report(&mut self, uid: &CardUid, authorized: bool) {
        let event = AccessEvent::new(uid, authorized);
        if let Err(e) = self.service.report_access(&event) {
            warn!(%uid, error = %e, "Failed to report card access");
        }
    }

    fn handle_card<H>(&mut self, handler: &mut H) -> Step
    where
        H: SessionHandler<C::Transport>,
    {
        let reader = self.presence.reader_name().to_string();
        let mut session =
            match CardSession::open(&mut self.connector, &reader, self.options.authenticator) {
                Ok(session) => session,
                Err(_) => return Step::new(GateEvent::ConnectFailed),
            };

        if let Err(e) = session.card_status() {
            debug!(error = %e, "Could not query card status");
        }

        let Ok(uid) = session.identify() else {
            return Step::new(GateEvent::InvalidCard);
        };

        let decision = self.authorize(&uid);
        self.report(&uid, decision.authorized);

        let flow = handler.on_card(&mut session, &mut self.registry, &decision);

        if let Err(e) = session.close() {
            warn!(%uid, error = %e, "Failed to disconnect card");
        }

        let event = if decision.authorized {
            GateEvent::Admitted {
                uid,
                source: decision.source,
            }
        } else {
            GateEvent::Denied {
                uid,
                source: decision.source,
            }
        };
        Step { event, flow }
    }
}
