//! Display utilities for the access CLI

use std::fmt::{self, Display};

use colored::Colorize;
use nfc_access::{AuthorizationDecision, BlockData, CardUid};

/// A formatted section title
pub(crate) struct SectionTitle(pub(crate) &'static str);

impl Display for SectionTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\n{}", self.0.bold().underline())
    }
}

/// Format a section header
pub(crate) const fn section_title(title: &'static str) -> SectionTitle {
    SectionTitle(title)
}

/// Format a success message
pub(crate) fn success(message: &str) -> String {
    format!("[+] {}", message.green().bold())
}

/// Format a warning message
pub(crate) fn warning(message: &str) -> String {
    format!("[-] {}", message.yellow().bold())
}

/// Format an info message
pub(crate) fn info(message: &str) -> String {
    format!("[*] {}", message.blue())
}

/// Format a key-value section
pub(crate) fn key_value_box(title: &str, items: Vec<(&str, String)>) -> String {
    let mut result = format!("{}", title.bold().underline());

    for (key, value) in items {
        result.push_str(&format!("\n  {}: {}", key.bold(), value));
    }

    result
}

/// Start-up banner
pub(crate) fn banner(reader: &str) -> String {
    format!(
        "{}\n{}\n{}",
        "NFC Access Control".bold(),
        info(&format!("Using reader: {reader}")),
        info("Waiting for cards... (Ctrl+C to exit)")
    )
}

/// Access decision for a card
pub(crate) fn decision(uid: &CardUid, decision: &AuthorizationDecision) -> String {
    let verdict = if decision.authorized {
        "ACCESS GRANTED".green().bold()
    } else {
        "ACCESS DENIED".red().bold()
    };
    format!("{verdict} {uid} ({})", decision.source)
}

/// Block content as ASCII and spaced hex
pub(crate) fn block(block: u8, data: &BlockData) -> String {
    key_value_box(
        &format!("Block {block}"),
        vec![
            ("Data (ASCII)", data.to_ascii()),
            ("Data (HEX)", data.to_spaced_hex()),
        ],
    )
}

/// Profile field value or a placeholder
pub(crate) fn field_value(value: Option<&str>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "<not set>".dimmed().to_string(),
    }
}
