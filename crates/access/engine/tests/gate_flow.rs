//! End-to-end gate runs against the in-memory card and a scripted reader

use nfc_access::profile::{self, PROFILE_NAME_BLOCK, UserProfile};
use nfc_access::{
    AccessError, AccessEvent, AuthPolicy, Authenticator, AuthorizationDecision,
    AuthorizationService, CardSession, CardUid, DecisionSource, Flow, Gate, GateEvent,
    GateOptions, NoopHandler, Registry,
};
use nfc_access_apdu_core::mock::{MockCard, MockConnector, ScriptedMonitor};
use nfc_access_apdu_core::{ReaderState, TransportError};

const READER: &str = "Mock Reader 0";
const UID: [u8; 4] = [0x04, 0xA1, 0xB2, 0xC3];

type Session = CardSession<MockCard>;
type Decision = AuthorizationDecision;

#[derive(Debug, Default)]
struct RecordingService {
    answer: Option<bool>,
    checks: Vec<CardUid>,
    reports: Vec<AccessEvent>,
}

impl RecordingService {
    fn answering(authorized: bool) -> Self {
        Self {
            answer: Some(authorized),
            ..Self::default()
        }
    }

    fn unreachable() -> Self {
        Self::default()
    }
}

impl AuthorizationService for RecordingService {
    fn check_access(&mut self, uid: &CardUid) -> Result<bool, AccessError> {
        self.checks.push(*uid);
        self.answer
            .ok_or_else(|| AccessError::Remote("connection refused".to_string()))
    }

    fn report_access(&mut self, event: &AccessEvent) -> Result<(), AccessError> {
        self.reports.push(event.clone());
        match self.answer {
            Some(_) => Ok(()),
            None => Err(AccessError::Remote("connection refused".to_string())),
        }
    }
}

fn insert_once() -> ScriptedMonitor {
    ScriptedMonitor::new(READER).then_state(ReaderState::PRESENT)
}

fn uid() -> CardUid {
    CardUid::from_slice(&UID).unwrap()
}

#[test]
fn test_unregistered_card_is_denied_and_reported() {
    let card = MockCard::new(&UID);
    let mut gate = Gate::new(
        MockConnector::new(card.clone()),
        insert_once(),
        RecordingService::answering(false),
        GateOptions::default(),
    );

    let step = gate.step(&mut NoopHandler).unwrap();
    assert_eq!(
        step.event,
        GateEvent::Denied {
            uid: uid(),
            source: DecisionSource::Remote
        }
    );
    assert_eq!(step.flow, Flow::Continue);

    let service = gate.service();
    assert_eq!(service.checks, [uid()]);
    assert_eq!(service.reports.len(), 1);

    let report = serde_json::to_value(&service.reports[0]).unwrap();
    assert_eq!(report["uid"], "04A1B2C3");
    assert_eq!(report["authorized"], false);
    assert!(report["timestamp"].as_u64().unwrap() > 0);

    assert_eq!(card.connects(), 1);
    assert_eq!(card.disconnects(), 1);
    assert_eq!(
        card.commands_with_ins(0xCA)[0].as_ref(),
        &[0xFF, 0xCA, 0x00, 0x00, 0x00]
    );
}

#[test]
fn test_registered_card_skips_remote_check() {
    let mut registry = Registry::new();
    registry.add(uid(), "Alice").unwrap();

    let card = MockCard::new(&UID);
    let mut gate = Gate::new(
        MockConnector::new(card.clone()),
        insert_once(),
        RecordingService::answering(false),
        GateOptions::default(),
    )
    .with_registry(registry);

    let step = gate.step(&mut NoopHandler).unwrap();
    assert_eq!(
        step.event,
        GateEvent::Admitted {
            uid: uid(),
            source: DecisionSource::Registry {
                name: "Alice".to_string()
            }
        }
    );
    assert!(gate.service().checks.is_empty());
    assert!(gate.service().reports[0].authorized);
}

#[test]
fn test_remote_failure_denies_but_still_reports() {
    let card = MockCard::new(&UID);
    let mut gate = Gate::new(
        MockConnector::new(card.clone()),
        insert_once(),
        RecordingService::unreachable(),
        GateOptions::default(),
    );

    let step = gate.step(&mut NoopHandler).unwrap();
    assert_eq!(
        step.event,
        GateEvent::Denied {
            uid: uid(),
            source: DecisionSource::RemoteUnavailable
        }
    );
    assert_eq!(gate.service().reports.len(), 1);
    assert_eq!(card.disconnects(), 1);
}

#[test]
fn test_remote_check_disabled() {
    let options = GateOptions {
        remote_check: false,
        ..GateOptions::default()
    };
    let mut gate = Gate::new(
        MockConnector::new(MockCard::new(&UID)),
        insert_once(),
        RecordingService::answering(true),
        options,
    );

    let step = gate.step(&mut NoopHandler).unwrap();
    assert!(matches!(
        step.event,
        GateEvent::Denied {
            source: DecisionSource::NotRegistered,
            ..
        }
    ));
    assert!(gate.service().checks.is_empty());
}

#[test]
fn test_invalid_card_never_reaches_registry_or_service() {
    let card = MockCard::new(&UID).with_uid_response(&[0x6A, 0x82]);
    let mut gate = Gate::new(
        MockConnector::new(card.clone()),
        insert_once(),
        RecordingService::answering(true),
        GateOptions::default(),
    );

    let mut called = false;
    let mut handler = |_: &mut Session, _: &mut Registry, _: &Decision| {
        called = true;
        Flow::Continue
    };
    let step = gate.step(&mut handler).unwrap();

    assert_eq!(step.event, GateEvent::InvalidCard);
    assert!(!called);
    assert!(gate.service().checks.is_empty());
    assert!(gate.service().reports.is_empty());
    assert_eq!(card.disconnects(), 1);
}

#[test]
fn test_connect_failure() {
    let mut gate = Gate::new(
        MockConnector::failing(),
        insert_once(),
        RecordingService::answering(true),
        GateOptions::default(),
    );
    assert_eq!(gate.step(&mut NoopHandler).unwrap().event, GateEvent::ConnectFailed);
    assert!(gate.service().reports.is_empty());
}

#[test]
fn test_reader_events() {
    let monitor = ScriptedMonitor::new(READER)
        .then_state(ReaderState::EMPTY)
        .then_state(ReaderState::PRESENT)
        .then_state(ReaderState::EMPTY);
    let mut gate = Gate::new(
        MockConnector::new(MockCard::new(&UID)),
        monitor,
        RecordingService::answering(true),
        GateOptions::default(),
    );

    assert_eq!(
        gate.step(&mut NoopHandler).unwrap().event,
        GateEvent::StateChanged {
            previous: ReaderState::UNAWARE,
            current: ReaderState::EMPTY
        }
    );
    assert!(matches!(
        gate.step(&mut NoopHandler).unwrap().event,
        GateEvent::Admitted { .. }
    ));
    assert_eq!(gate.step(&mut NoopHandler).unwrap().event, GateEvent::Removed);
    assert_eq!(gate.step(&mut NoopHandler).unwrap().event, GateEvent::Idle);
}

#[test]
fn test_wait_error_is_returned_and_edge_consumed() {
    let monitor = ScriptedMonitor::new(READER)
        .then_error(
            ReaderState::PRESENT,
            TransportError::ReaderUnavailable(READER.to_string()),
        )
        .then_state(ReaderState::PRESENT);
    let card = MockCard::new(&UID);
    let mut gate = Gate::new(
        MockConnector::new(card.clone()),
        monitor,
        RecordingService::answering(true),
        GateOptions::default(),
    );

    assert!(gate.step(&mut NoopHandler).unwrap_err().is_transport());
    assert_eq!(gate.presence().current_state(), ReaderState::PRESENT);
    assert_eq!(gate.step(&mut NoopHandler).unwrap().event, GateEvent::Idle);
    assert_eq!(card.connects(), 0);
}

#[test]
fn test_handler_enrolls_card_for_next_visit() {
    let monitor = ScriptedMonitor::new(READER)
        .then_state(ReaderState::PRESENT)
        .then_state(ReaderState::EMPTY)
        .then_state(ReaderState::PRESENT);
    let card = MockCard::new(&UID);
    let mut gate = Gate::new(
        MockConnector::new(card.clone()),
        monitor,
        RecordingService::answering(false),
        GateOptions::default(),
    );

    let mut enroll = |session: &mut Session, registry: &mut Registry, decision: &Decision| {
        if !decision.authorized {
            let profile = UserProfile::new("Alice", "alice@example.org", "555-0100");
            assert!(profile::write_profile(session, &profile).is_complete());
            let uid = *session.uid().unwrap();
            registry.add(uid, &profile.name).unwrap();
        }
        Flow::Continue
    };

    assert!(matches!(
        gate.step(&mut enroll).unwrap().event,
        GateEvent::Denied { .. }
    ));
    assert_eq!(&card.block(PROFILE_NAME_BLOCK)[..5], b"Alice");
    assert_eq!(gate.step(&mut enroll).unwrap().event, GateEvent::Removed);
    assert!(matches!(
        gate.step(&mut enroll).unwrap().event,
        GateEvent::Admitted {
            source: DecisionSource::Registry { .. },
            ..
        }
    ));
    assert_eq!(gate.registry().len(), 1);
    assert_eq!(card.connects(), 2);
    assert_eq!(card.disconnects(), 2);
}

#[test]
fn test_run_stops_on_handler_request() {
    let monitor = ScriptedMonitor::new(READER)
        .then_state(ReaderState::EMPTY)
        .then_state(ReaderState::PRESENT);
    let card = MockCard::new(&UID);
    let mut gate = Gate::new(
        MockConnector::new(card.clone()),
        monitor,
        RecordingService::answering(true),
        GateOptions::default(),
    );

    let mut stop = |_: &mut Session, _: &mut Registry, _: &Decision| Flow::Stop;
    gate.run(&mut stop);

    assert_eq!(gate.presence().monitor().waits(), 2);
    assert_eq!(card.disconnects(), 1);
}

#[test]
fn test_fail_closed_handler_sees_locked_block() {
    let card = MockCard::new(&UID).with_block_key(PROFILE_NAME_BLOCK, 0x61, [0x42; 6]);
    let options = GateOptions {
        authenticator: Authenticator::new(AuthPolicy::FailClosed),
        ..GateOptions::default()
    };
    let mut gate = Gate::new(
        MockConnector::new(card.clone()),
        insert_once(),
        RecordingService::answering(true),
        options,
    );

    let mut result = None;
    let mut read = |session: &mut Session, _: &mut Registry, _: &Decision| {
        result = Some(session.read_block(PROFILE_NAME_BLOCK));
        Flow::Continue
    };
    gate.step(&mut read).unwrap();

    assert!(matches!(
        result,
        Some(Err(AccessError::AuthenticationFailed { block: PROFILE_NAME_BLOCK }))
    ));
    assert!(card.commands_with_ins(0xB0).is_empty());
}
