//! User profile stored in three fixed card blocks

use derive_more::Display;
use tracing::{info, warn};

use nfc_access_apdu_core::CardTransport;

use crate::AccessError;
use crate::session::CardSession;

/// Block holding the user name
pub const PROFILE_NAME_BLOCK: u8 = 4;
/// Block holding the email address
pub const PROFILE_EMAIL_BLOCK: u8 = 5;
/// Block holding the phone number
pub const PROFILE_PHONE_BLOCK: u8 = 6;

/// Longest name accepted at input
pub const MAX_NAME_LENGTH: usize = 49;
/// Longest email accepted at input
pub const MAX_EMAIL_LENGTH: usize = 99;
/// Longest phone number accepted at input
pub const MAX_PHONE_LENGTH: usize = 19;

/// One profile field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ProfileField {
    /// User name
    Name,
    /// Email address
    Email,
    /// Phone number
    Phone,
}

impl ProfileField {
    /// All fields, in block order
    pub const ALL: [Self; 3] = [Self::Name, Self::Email, Self::Phone];

    /// Block the field is stored in
    pub const fn block(self) -> u8 {
        match self {
            Self::Name => PROFILE_NAME_BLOCK,
            Self::Email => PROFILE_EMAIL_BLOCK,
            Self::Phone => PROFILE_PHONE_BLOCK,
        }
    }

    /// Longest value accepted at input
    pub const fn max_length(self) -> usize {
        match self {
            Self::Name => MAX_NAME_LENGTH,
            Self::Email => MAX_EMAIL_LENGTH,
            Self::Phone => MAX_PHONE_LENGTH,
        }
    }
}

/// Profile to be written to a card
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    /// User name
    pub name: String,
    /// Email address
    pub email: String,
    /// Phone number
    pub phone: String,
}

impl UserProfile {
    /// Build a profile, capping each field at its input limit
    pub fn new(name: &str, email: &str, phone: &str) -> Self {
        Self {
            name: limit(name, MAX_NAME_LENGTH),
            email: limit(email, MAX_EMAIL_LENGTH),
            phone: limit(phone, MAX_PHONE_LENGTH),
        }
    }

    /// Value of `field`
    pub fn field(&self, field: ProfileField) -> &str {
        match field {
            ProfileField::Name => &self.name,
            ProfileField::Email => &self.email,
            ProfileField::Phone => &self.phone,
        }
    }
}

/// Profile as read back from a card; unreadable fields are `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredProfile {
    /// User name
    pub name: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Phone number
    pub phone: Option<String>,
}

impl StoredProfile {
    /// Value of `field`, if it could be read
    pub fn field(&self, field: ProfileField) -> Option<&str> {
        match field {
            ProfileField::Name => self.name.as_deref(),
            ProfileField::Email => self.email.as_deref(),
            ProfileField::Phone => self.phone.as_deref(),
        }
    }
}

/// Per-field outcome of [`write_profile`]
#[derive(Debug, Default)]
pub struct ProfileWriteReport {
    /// Result for each field, in block order
    pub results: Vec<(ProfileField, Result<(), AccessError>)>,
}

impl ProfileWriteReport {
    /// Whether every field was written
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(|(_, result)| result.is_ok())
    }
}

/// Read the name, email and phone blocks
pub fn read_profile<T: CardTransport>(session: &mut CardSession<T>) -> StoredProfile {
    let mut read = |field: ProfileField| match session.read_block(field.block()) {
        Ok(data) => Some(decode_text(data.as_slice())),
        Err(e) => {
            warn!(%field, block = field.block(), error = %e, "Could not read profile field");
            None
        }
    };
    StoredProfile {
        name: read(ProfileField::Name),
        email: read(ProfileField::Email),
        phone: read(ProfileField::Phone),
    }
}

/// Write all three profile blocks
///
/// A failed field does not stop the remaining writes. Values longer than one
/// block are truncated by the codec.
pub fn write_profile<T: CardTransport>(
    session: &mut CardSession<T>,
    profile: &UserProfile,
) -> ProfileWriteReport {
    let results = ProfileField::ALL
        .into_iter()
        .map(|field| {
            let result = session.write_block(field.block(), profile.field(field).as_bytes());
            if let Err(e) = &result {
                warn!(%field, block = field.block(), error = %e, "Could not write profile field");
            }
            (field, result)
        })
        .collect();
    let report = ProfileWriteReport { results };
    if report.is_complete() {
        info!(name = %profile.name, "Profile written");
    }
    report
}

/// Decode block text up to the first NUL byte
pub fn decode_text(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

fn limit(value: &str, max: usize) -> String {
    value.trim_end_matches(['\r', '\n']).chars().take(max).collect()
}
