//! Entities written through the degraded-mode persister

use serde::{Deserialize, Serialize};

/// A create/update that should land in the internal store and, best-effort,
/// in the ERP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPayload {
    pub tenant_id: String,
    /// ERP resource name, e.g. `produtos` or `pedidos/vendas`.
    pub entity_type: String,
    /// Internal id when updating an existing row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    /// ERP id when the entity was mirrored before; switches create to update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub data: serde_json::Value,
}

impl EntityPayload {
    pub fn new(
        tenant_id: impl Into<String>,
        entity_type: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            entity_type: entity_type.into(),
            local_id: None,
            external_id: None,
            data,
        }
    }

    #[must_use]
    pub fn with_local_id(mut self, local_id: impl Into<String>) -> Self {
        self.local_id = Some(local_id.into());
        self
    }

    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

/// External mirror sub-state of a persisted write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalSyncState {
    Skipped,
    Succeeded,
    Failed,
}

impl ExternalSyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "skipped" => Some(Self::Skipped),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Result of a degraded-mode write. The internal store was always written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistOutcome {
    pub internal_id: String,
    pub external_id: Option<String>,
    pub external: ExternalSyncState,
    /// Set when the ERP mirror failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Informational, e.g. integration not active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
