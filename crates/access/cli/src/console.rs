//! Interactive per-card console

use std::io::{self, BufRead, Write};

use nfc_access::profile::{self, ProfileField, UserProfile};
use nfc_access::{
    AddOutcome, AuthorizationDecision, BLOCK_SIZE, CardSession, Flow, Registry, SessionHandler,
    SessionState,
};
use nfc_access_apdu_core::CardTransport;
use tracing::warn;

use crate::display;

const USAGE: &str = "Commands:
    r <block>          - Read data from block
    w <block> <data>   - Write data to block (max 16 bytes)
    p                  - Read user profile
    n                  - Register new user profile
    a <name>           - Authorize this card
    x                  - Revoke this card
    l                  - List authorized cards
    q                  - Quit and disconnect";

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConsoleCommand {
    /// Read a block
    Read {
        /// Block number
        block: u8,
    },
    /// Write text to a block
    Write {
        /// Block number
        block: u8,
        /// Text, at most one block long
        data: String,
    },
    /// Show the stored profile
    Profile,
    /// Prompt for and write a new profile
    NewUser,
    /// Add the card to the registry
    Add {
        /// Display name
        name: String,
    },
    /// Remove the card from the registry
    Remove,
    /// List the registry
    List,
    /// Disconnect the card
    Quit,
}

/// Why a console line was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ParseError {
    /// Blank line
    #[error("Empty command")]
    Empty,
    /// Unknown command letter
    #[error("Unknown command: {0}")]
    Unknown(String),
    /// Block number missing
    #[error("Missing block number")]
    MissingBlock,
    /// Block number not in 0..=255
    #[error("Invalid block number: {0}")]
    InvalidBlock(String),
    /// Nothing to write
    #[error("Missing data")]
    MissingData,
    /// Data longer than one block
    #[error("Data too long ({0} bytes, max {BLOCK_SIZE})")]
    DataTooLong(usize),
    /// Name missing for `a`
    #[error("Missing name")]
    MissingName,
}

impl ConsoleCommand {
    /// Parse one input line
    pub(crate) fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let (head, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(h, r)| (h, r.trim()));

        match head {
            "" => Err(ParseError::Empty),
            "r" => Ok(Self::Read {
                block: parse_block(rest)?,
            }),
            "w" => {
                let (block, data) = rest
                    .split_once(char::is_whitespace)
                    .map_or((rest, ""), |(b, d)| (b, d.trim()));
                let block = parse_block(block)?;
                if data.is_empty() {
                    return Err(ParseError::MissingData);
                }
                if data.len() > BLOCK_SIZE {
                    return Err(ParseError::DataTooLong(data.len()));
                }
                Ok(Self::Write {
                    block,
                    data: data.to_string(),
                })
            }
            "p" => Ok(Self::Profile),
            "n" => Ok(Self::NewUser),
            "a" if rest.is_empty() => Err(ParseError::MissingName),
            "a" => Ok(Self::Add {
                name: rest.to_string(),
            }),
            "x" => Ok(Self::Remove),
            "l" => Ok(Self::List),
            "q" | "quit" => Ok(Self::Quit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

fn parse_block(value: &str) -> Result<u8, ParseError> {
    if value.is_empty() {
        return Err(ParseError::MissingBlock);
    }
    value
        .parse()
        .map_err(|_| ParseError::InvalidBlock(value.to_string()))
}

/// Console attached to every identified card
#[derive(Debug)]
pub(crate) struct InteractiveConsole<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> InteractiveConsole<R, W> {
    pub(crate) const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}: ")?;
        self.output.flush()?;
        self.read_line()
    }

    fn session_loop<T: CardTransport>(
        &mut self,
        session: &mut CardSession<T>,
        registry: &mut Registry,
        decision: &AuthorizationDecision,
    ) -> io::Result<Flow> {
        if let Some(uid) = session.uid() {
            writeln!(self.output, "{}", display::decision(uid, decision))?;
        }
        writeln!(self.output, "{}", display::section_title("Card Interactive Mode"))?;
        writeln!(self.output, "{USAGE}")?;

        loop {
            write!(self.output, "\nEnter command (or q to quit): ")?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                return Ok(Flow::Stop);
            };

            let command = match ConsoleCommand::parse(&line) {
                Ok(command) => command,
                Err(ParseError::Empty) => continue,
                Err(e) => {
                    writeln!(self.output, "{}", display::warning(&e.to_string()))?;
                    writeln!(self.output, "{USAGE}")?;
                    continue;
                }
            };

            match command {
                ConsoleCommand::Quit => return Ok(Flow::Continue),
                ConsoleCommand::NewUser => {
                    if !self.register_user(session)? {
                        return Ok(Flow::Stop);
                    }
                }
                command => self.execute(command, session, registry)?,
            }

            if session.state() == SessionState::Disconnected {
                writeln!(self.output, "{}", display::warning("Card connection lost"))?;
                return Ok(Flow::Continue);
            }
        }
    }

    fn execute<T: CardTransport>(
        &mut self,
        command: ConsoleCommand,
        session: &mut CardSession<T>,
        registry: &mut Registry,
    ) -> io::Result<()> {
        let line = match command {
            ConsoleCommand::Read { block } => match session.read_block(block) {
                Ok(data) => display::block(block, &data),
                Err(e) => display::warning(&format!("Read failed: {e}")),
            },
            ConsoleCommand::Write { block, data } => {
                match session.write_block(block, data.as_bytes()) {
                    Ok(()) => display::success(&format!("Wrote block {block}: {data}")),
                    Err(e) => display::warning(&format!("Write failed: {e}")),
                }
            }
            ConsoleCommand::Profile => {
                let stored = profile::read_profile(session);
                let items = ProfileField::ALL
                    .into_iter()
                    .map(|field| (field_label(field), display::field_value(stored.field(field))))
                    .collect();
                display::key_value_box("User Profile", items)
            }
            ConsoleCommand::Add { name } => {
                let Some(uid) = session.uid().copied() else {
                    return Ok(());
                };
                match registry.add(uid, &name) {
                    Ok(AddOutcome::Added) => {
                        display::success(&format!("Authorized {uid} as {name}"))
                    }
                    Ok(AddOutcome::AlreadyPresent(existing)) => {
                        display::info(&format!("{uid} already authorized as {existing}"))
                    }
                    Err(e) => display::warning(&e.to_string()),
                }
            }
            ConsoleCommand::Remove => {
                let Some(uid) = session.uid().copied() else {
                    return Ok(());
                };
                match registry.remove(&uid) {
                    Ok(entry) => display::success(&format!("Revoked {uid} ({})", entry.name)),
                    Err(e) => display::warning(&e.to_string()),
                }
            }
            ConsoleCommand::List => {
                let items = registry
                    .list()
                    .iter()
                    .map(|entry| (entry.name.as_str(), entry.uid.to_string()))
                    .collect();
                let title =
                    format!("Authorized Cards ({}/{})", registry.len(), registry.capacity());
                display::key_value_box(&title, items)
            }
            ConsoleCommand::NewUser | ConsoleCommand::Quit => return Ok(()),
        };
        writeln!(self.output, "{line}")
    }

    /// Prompt for a profile and write it; `false` when input ended
    fn register_user<T: CardTransport>(
        &mut self,
        session: &mut CardSession<T>,
    ) -> io::Result<bool> {
        let Some(name) = self.prompt("Enter name")? else {
            return Ok(false);
        };
        let Some(email) = self.prompt("Enter email")? else {
            return Ok(false);
        };
        let Some(phone) = self.prompt("Enter phone")? else {
            return Ok(false);
        };

        let user = UserProfile::new(&name, &email, &phone);
        let report = profile::write_profile(session, &user);
        for (field, result) in &report.results {
            let label = field_label(*field);
            let line = match result {
                Ok(()) => display::success(&format!("Wrote {label} to block {}", field.block())),
                Err(e) => display::warning(&format!("Could not write {label}: {e}")),
            };
            writeln!(self.output, "{line}")?;
        }
        if report.is_complete() {
            writeln!(self.output, "{}", display::success("Registration complete!"))?;
        }
        Ok(true)
    }
}

const fn field_label(field: ProfileField) -> &'static str {
    match field {
        ProfileField::Name => "Name",
        ProfileField::Email => "Email",
        ProfileField::Phone => "Phone",
    }
}

impl<T, R, W> SessionHandler<T> for InteractiveConsole<R, W>
where
    T: CardTransport,
    R: BufRead,
    W: Write,
{
    fn on_card(
        &mut self,
        session: &mut CardSession<T>,
        registry: &mut Registry,
        decision: &AuthorizationDecision,
    ) -> Flow {
        match self.session_loop(session, registry, decision) {
            Ok(flow) => flow,
            Err(e) => {
                warn!(error = %e, "Console I/O failed");
                Flow::Stop
            }
        }
    }
}

/// Prints the decision for each card and disconnects it immediately
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DoorHandler;

impl<T: CardTransport> SessionHandler<T> for DoorHandler {
    fn on_card(
        &mut self,
        session: &mut CardSession<T>,
        _registry: &mut Registry,
        decision: &AuthorizationDecision,
    ) -> Flow {
        if let Some(uid) = session.uid() {
            println!("{}", display::decision(uid, decision));
        }
        Flow::Continue
    }
}
