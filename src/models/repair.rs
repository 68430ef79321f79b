// Repair issues raised for resources that stay missing

use super::{ResourceKey, ResourceKind};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairIssue {
    /// `missing_{kind}_{key}`
    pub id: String,
    pub kind: ResourceKind,
    pub key: ResourceKey,
    pub display_name: String,
    pub opened_at: DateTime<Utc>,
}

impl RepairIssue {
    pub fn new(key: ResourceKey, display_name: String) -> Self {
        RepairIssue {
            id: issue_id(&key),
            kind: key.kind(),
            key,
            display_name,
            opened_at: Utc::now(),
        }
    }
}

pub fn issue_id(key: &ResourceKey) -> String {
    format!("missing_{}_{}", key.kind(), key)
}

/// Emitted to the repair subsystem; serializes as `{"event": "opened", "issue": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "issue", rename_all = "lowercase")]
pub enum RepairEvent {
    Opened(RepairIssue),
    Resolved(RepairIssue),
}

impl RepairEvent {
    pub fn issue(&self) -> &RepairIssue {
        match self {
            RepairEvent::Opened(i) | RepairEvent::Resolved(i) => i,
        }
    }
}
