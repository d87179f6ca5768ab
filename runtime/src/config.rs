//! Engine configuration loaded from environment variables with sensible defaults.

use rsvp_core::admission::DEFAULT_MAX_ATTENDEE_COUNT;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How widely the admission guard serializes mutations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockScope {
    /// One lock per event; mutations to different events run in parallel
    #[default]
    PerEvent,
    /// One process-wide lock for every event
    Global,
}

/// Unknown value for `RSVP_LOCK_SCOPE`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown lock scope '{0}' (expected 'per_event' or 'global')")]
pub struct ParseLockScopeError(String);

impl FromStr for LockScope {
    type Err = ParseLockScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_event" | "per-event" | "event" => Ok(Self::PerEvent),
            "global" | "process" => Ok(Self::Global),
            other => Err(ParseLockScopeError(other.to_string())),
        }
    }
}

impl fmt::Display for LockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerEvent => f.write_str("per_event"),
            Self::Global => f.write_str("global"),
        }
    }
}

/// Admission engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Largest accepted attendee count (the user plus `max - 1` guests)
    pub max_attendee_count: u32,
    /// Granularity of the admission lock
    pub lock_scope: LockScope,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attendee_count: DEFAULT_MAX_ATTENDEE_COUNT,
            lock_scope: LockScope::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// - `RSVP_MAX_ATTENDEE_COUNT` (default `2`)
    /// - `RSVP_LOCK_SCOPE`: `per_event` (default) or `global`
    ///
    /// Unparseable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_attendee_count: env::var("RSVP_MAX_ATTENDEE_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_ATTENDEE_COUNT),
            lock_scope: env::var("RSVP_LOCK_SCOPE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        }
    }

    /// Set the attendee ceiling
    #[must_use]
    pub const fn with_max_attendee_count(mut self, max_attendee_count: u32) -> Self {
        self.max_attendee_count = max_attendee_count;
        self
    }

    /// Set the lock scope
    #[must_use]
    pub const fn with_lock_scope(mut self, lock_scope: LockScope) -> Self {
        self.lock_scope = lock_scope;
        self
    }
}
