//! In-memory list of authorized cards
//!
//! Bounded, insertion ordered and unique by UID. Nothing is persisted; the
//! registry lives as long as the [`Gate`](crate::gate::Gate) that owns it.

use tracing::{info, warn};

use crate::AccessError;
use crate::uid::CardUid;

/// Maximum number of registered cards
pub const REGISTRY_CAPACITY: usize = 100;

/// Maximum display name length in characters
pub const MAX_NAME_CHARS: usize = 49;

/// A registered card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedCard {
    /// Card UID
    pub uid: CardUid,
    /// Display name
    pub name: String,
}

/// Outcome of [`Registry::add`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The card was appended
    Added,
    /// The card was already registered under this name; nothing changed
    AlreadyPresent(String),
}

/// Ordered, capacity-bounded set of authorized cards
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<AuthorizedCard>,
    capacity: usize,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty registry with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(REGISTRY_CAPACITY)
    }

    /// Empty registry holding at most `capacity` cards
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Register `uid` under `name`
    ///
    /// Adding a UID that is already present keeps the first name.
    pub fn add(&mut self, uid: CardUid, name: &str) -> Result<AddOutcome, AccessError> {
        if let Some(existing) = self.contains(&uid) {
            info!(%uid, name = existing, "Card already authorized");
            return Ok(AddOutcome::AlreadyPresent(existing.to_string()));
        }
        if self.is_full() {
            warn!(%uid, capacity = self.capacity, "Registry full");
            return Err(AccessError::Capacity {
                capacity: self.capacity,
            });
        }

        let name = clean_name(name)?;
        info!(%uid, %name, "Added authorized card");
        self.entries.push(AuthorizedCard { uid, name });
        Ok(AddOutcome::Added)
    }

    /// Remove `uid`, keeping the remaining cards in order
    pub fn remove(&mut self, uid: &CardUid) -> Result<AuthorizedCard, AccessError> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.uid == *uid)
            .ok_or(AccessError::NotFound(*uid))?;
        let removed = self.entries.remove(index);
        info!(%uid, name = %removed.name, "Removed authorized card");
        Ok(removed)
    }

    /// Name of the card if it is registered
    pub fn contains(&self, uid: &CardUid) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.uid == *uid)
            .map(|entry| entry.name.as_str())
    }

    /// Registered cards in insertion order
    pub fn list(&self) -> &[AuthorizedCard] {
        &self.entries
    }

    /// Number of registered cards
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no card is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of cards
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether another card can be added
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }
}

/// Strip control characters and cap the name at [`MAX_NAME_CHARS`]
pub fn clean_name(name: &str) -> Result<String, AccessError> {
    let cleaned: String = name
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_CHARS)
        .collect();
    if cleaned.is_empty() {
        return Err(AccessError::InvalidName);
    }
    Ok(cleaned)
}
