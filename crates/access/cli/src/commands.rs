//! Top-level CLI modes

use std::io;
use std::time::Duration;

use eyre::{Result, WrapErr};
use nfc_access::{
    AccessConfig, Authenticator, AuthorizationService, CardSession, Gate, GateOptions,
    HttpAuthorizationService, OfflineAuthorizationService,
};
use nfc_access_transport_pcsc::PcscDeviceManager;
use tracing::{debug, info};

use crate::console::{DoorHandler, InteractiveConsole};
use crate::display;

/// List all available readers
pub(crate) fn list_readers(manager: &PcscDeviceManager) -> Result<()> {
    let readers = manager.list_readers()?;

    println!("{}", display::section_title("Available readers"));
    for (i, reader) in readers.iter().enumerate() {
        println!("{}. {} ({})", i + 1, reader.name, reader.state);
        if let Some(atr) = reader.atr_hex() {
            debug!(reader = %reader.name, %atr, "Reader ATR");
        }
    }

    Ok(())
}

/// Identify the card currently in `reader` and print its UID
pub(crate) fn read_uid_once(
    manager: &mut PcscDeviceManager,
    reader: &str,
    authenticator: Authenticator,
) -> Result<()> {
    let mut session = CardSession::open(manager, reader, authenticator)
        .wrap_err_with(|| format!("no card could be connected in {reader}"))?;

    let status = session.card_status()?;
    let uid = session.identify()?;
    session.close()?;

    println!(
        "{}",
        display::key_value_box(
            "Card",
            vec![
                ("UID", uid.to_string()),
                ("UID length", uid.len().to_string()),
                ("ATR", status.atr_hex()),
            ],
        )
    );
    Ok(())
}

/// Authorization service selected by the `api` section
pub(crate) fn authorization_service(config: &AccessConfig) -> Box<dyn AuthorizationService> {
    if config.api.enabled {
        info!(base_url = %config.api.base_url, "Using remote authorization service");
        Box::new(HttpAuthorizationService::from_config(&config.api))
    } else {
        info!("Remote authorization service disabled");
        Box::new(OfflineAuthorizationService)
    }
}

/// Watch `reader` and run a session for every inserted card
pub(crate) fn watch(
    manager: PcscDeviceManager,
    reader: &str,
    config: &AccessConfig,
    interactive: bool,
) -> Result<()> {
    let monitor = manager
        .monitor(reader)
        .wrap_err_with(|| format!("cannot watch reader {reader}"))?;

    let options = GateOptions {
        error_backoff: Duration::from_secs(1),
        ..GateOptions::from_config(config)
    };
    info!(policy = %config.auth.policy, remote_check = options.remote_check, "Gate configured");

    let mut gate = Gate::new(manager, monitor, authorization_service(config), options);

    println!("{}", display::banner(reader));
    if interactive {
        let stdin = io::stdin();
        let mut console = InteractiveConsole::new(stdin.lock(), io::stdout());
        gate.run(&mut console);
    } else {
        gate.run(&mut DoorHandler);
    }
    Ok(())
}
