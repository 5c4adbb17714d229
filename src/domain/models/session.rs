//! Session identity and ownership.
//!
//! A session is one isolated execution context (a browser tab, a helper
//! process) used for a single query interaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exclusive handle to a live session.
///
/// Deliberately not `Clone`: whoever holds the handle owns the session and is
/// the only party that can give it back to the driver for destruction.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionHandle {
    id: SessionId,
    label: String,
    created_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Handle for a newly opened session.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            label: label.into(),
            created_at: Utc::now(),
        }
    }

    /// Rebuild the handle of a session whose owner is gone, so the session
    /// can still be handed back to the driver. Drivers key sessions by id.
    pub fn reclaim(id: SessionId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            created_at: Utc::now(),
        }
    }

    /// Id the driver keys the session by.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Human-readable purpose, e.g. `query-2` or `synthesis`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// When the handle was made.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
