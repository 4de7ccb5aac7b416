use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::{PricedItem, PricingContext};

/// One smart search, as it was answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: Uuid,
    pub query: String,
    pub results: Vec<PricedItem>,
    pub timestamp: DateTime<Utc>,
    pub context: PricingContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

/// What caused a snapshot to be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotTrigger {
    Auto,
    Manual,
    Periodic,
}

impl SnapshotTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotTrigger::Auto => "auto",
            SnapshotTrigger::Manual => "manual",
            SnapshotTrigger::Periodic => "periodic",
        }
    }

    /// Prefix for generated snapshot names.
    pub(crate) fn label(&self) -> &'static str {
        match self {
            SnapshotTrigger::Auto => "Auto save",
            SnapshotTrigger::Manual => "Manual save",
            SnapshotTrigger::Periodic => "Periodic save",
        }
    }
}

/// A saved copy of a project's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Time-ordered (UUIDv7).
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    /// Opaque to this crate.
    pub payload: serde_json::Value,
    pub trigger: SnapshotTrigger,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}
