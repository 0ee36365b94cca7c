//! Push registration state and the persisted-vs-desired comparison.
//!
//! Everything here is pure: the SDK crate loads a [`RegistrationState`] from
//! storage, builds a [`DesiredRegistration`] from the current session and asks
//! [`decide`] whether the server record needs to be written.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Set of push tags.
///
/// Tags are trimmed and lower-cased; empty entries are dropped. The string
/// encoding is the sorted, comma-joined list, so two equal sets always encode
/// to the same string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list. Never fails: blanks are skipped.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect(),
        )
    }

    /// Build a tag set from individual tags.
    ///
    /// Unlike [`TagSet::parse`], a single tag containing a comma is rejected
    /// since it could not survive the string encoding.
    pub fn from_tags<I, S>(tags: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for tag in tags {
            let tag = tag.as_ref();
            if tag.contains(',') {
                return Err(CoreError::InvalidTag(tag.to_string()));
            }
            let normalized = tag.trim().to_lowercase();
            if !normalized.is_empty() {
                set.insert(normalized);
            }
        }
        Ok(Self(set))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(&tag.trim().to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    /// Sorted, comma-joined encoding.
    pub fn encode(&self) -> String {
        self.0.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for TagSet {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for TagSet {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<TagSet> for String {
    fn from(value: TagSet) -> Self {
        value.encode()
    }
}

/// Locally persisted registration state.
///
/// Empty strings mean "absent"; an empty `device_id` means no server record
/// is known. `device_token` is the push token reused by session-triggered
/// reconciliations, `registered_token` the one the server confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationState {
    pub device_token: String,
    pub registered_token: String,
    pub registered_username: String,
    pub registered_tags: TagSet,
    pub pending_tags: TagSet,
    pub device_id: String,
}

impl RegistrationState {
    pub fn is_registered(&self) -> bool {
        !self.device_id.is_empty()
    }
}

/// What the application currently wants the server record to say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRegistration {
    pub username: String,
    pub tags: TagSet,
    pub device_token: String,
}

impl DesiredRegistration {
    /// Desired state from the pending tags and latest token of `state`.
    pub fn from_state(state: &RegistrationState, username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            tags: state.pending_tags.clone(),
            device_token: state.device_token.clone(),
        }
    }

    /// Replace the token with one not yet persisted.
    pub fn with_device_token(mut self, device_token: impl Into<String>) -> Self {
        self.device_token = device_token.into();
        self
    }
}

/// Why a registration write is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterReason {
    /// No server record exists
    NotRegistered,
    /// Signed-in user differs from the one registered
    UsernameChanged,
    /// Push token was rotated
    TokenChanged,
    /// Registered tags differ from the requested ones
    TagsChanged,
}

impl RegisterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterReason::NotRegistered => "not_registered",
            RegisterReason::UsernameChanged => "username_changed",
            RegisterReason::TokenChanged => "token_changed",
            RegisterReason::TagsChanged => "tags_changed",
        }
    }
}

impl fmt::Display for RegisterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of comparing persisted and desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationDecision {
    AlreadyRegistered,
    Register(RegisterReason),
}

impl RegistrationDecision {
    pub fn needs_write(&self) -> bool {
        matches!(self, RegistrationDecision::Register(_))
    }
}

/// Lifecycle of the device record as seen by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPhase {
    Unregistered,
    Registering,
    Registered,
    Stale,
    Unregistering,
}

impl RegistrationPhase {
    /// Phase implied by persisted state and a decision, outside of any
    /// in-flight network call.
    pub fn at_rest(state: &RegistrationState, decision: RegistrationDecision) -> Self {
        match decision {
            RegistrationDecision::AlreadyRegistered => RegistrationPhase::Registered,
            RegistrationDecision::Register(_) if state.is_registered() => RegistrationPhase::Stale,
            RegistrationDecision::Register(_) => RegistrationPhase::Unregistered,
        }
    }

    pub fn can_transition_to(&self, next: RegistrationPhase) -> bool {
        use RegistrationPhase::*;
        matches!(
            (self, next),
            (Unregistered, Registering)
                | (Registering, Registered)
                | (Registering, Unregistered)
                | (Registering, Stale)
                | (Registered, Stale)
                | (Registered, Unregistering)
                | (Stale, Registering)
                | (Stale, Unregistering)
                | (Unregistering, Unregistered)
                | (Unregistering, Registered)
                | (Unregistering, Stale)
        )
    }
}

/// Compare persisted state to the desired state.
///
/// Checks run in a fixed order (record, username, token, tags) and the first
/// difference wins.
pub fn decide(state: &RegistrationState, desired: &DesiredRegistration) -> RegistrationDecision {
    if !state.is_registered() {
        return RegistrationDecision::Register(RegisterReason::NotRegistered);
    }
    if state.registered_username != desired.username {
        return RegistrationDecision::Register(RegisterReason::UsernameChanged);
    }
    if state.registered_token != desired.device_token {
        return RegistrationDecision::Register(RegisterReason::TokenChanged);
    }
    if state.registered_tags != desired.tags {
        return RegistrationDecision::Register(RegisterReason::TagsChanged);
    }
    RegistrationDecision::AlreadyRegistered
}
