//! Core data models for the reconciliation pipeline.
//!
//! Offers hold id-based references to their provider and price group;
//! resolution happens through map lookups at computation time, so there are
//! no back-references or ownership cycles between records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ChansyncError, Result};

// =============================================================================
// Price Feed Schema
// =============================================================================

/// Wire schema of an upstream pricing endpoint.
///
/// Each upstream vendor exposes `/api/pricing` in one of four incompatible
/// shapes; the provider record carries which one to expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceSchema {
    /// Flat `data` array of per-model records.
    FlatArray,
    /// `model_info` entries with per-group price tables.
    GroupedTable,
    /// Parallel ratio / completion-ratio / fixed-price maps.
    ColumnMaps,
    /// Per-group table with `priceType`-tagged price entries.
    GroupPriceTable,
}

impl PriceSchema {
    /// All schemas in display order.
    pub const ALL: &'static [Self] = &[
        Self::FlatArray,
        Self::GroupedTable,
        Self::ColumnMaps,
        Self::GroupPriceTable,
    ];

    /// CLI name for this schema.
    #[must_use]
    pub const fn cli_name(self) -> &'static str {
        match self {
            Self::FlatArray => "flat",
            Self::GroupedTable => "grouped",
            Self::ColumnMaps => "columns",
            Self::GroupPriceTable => "group-price",
        }
    }

    /// Parse from CLI argument or database column.
    pub fn from_cli_name(name: &str) -> Result<Self> {
        let lower = name.to_lowercase();
        Self::ALL
            .iter()
            .find(|s| s.cli_name() == lower)
            .copied()
            .ok_or_else(|| ChansyncError::UnknownSchema(name.to_string()))
    }
}

// =============================================================================
// Quota Kind
// =============================================================================

/// Billing mode of a model offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuotaKind {
    /// Usage-ratio based billing.
    Metered,
    /// Flat per-call price.
    PerRequest,
    /// Advertised but not billable/usable.
    Unsupported,
}

impl QuotaKind {
    /// Canonical wire/storage code (0 = metered, 1 = per-request, 999 = unsupported).
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Metered => 0,
            Self::PerRequest => 1,
            Self::Unsupported => 999,
        }
    }

    /// Decode from a stored or upstream integer code.
    ///
    /// Unknown codes decode as [`QuotaKind::Unsupported`].
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Metered,
            1 => Self::PerRequest,
            _ => Self::Unsupported,
        }
    }

    /// Human label for listings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Metered => "metered",
            Self::PerRequest => "per-request",
            Self::Unsupported => "unsupported",
        }
    }
}

// =============================================================================
// Probe Status
// =============================================================================

/// Outcome status of an availability probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// No probe recorded yet.
    #[default]
    Untested,
    /// Model answered a qualifying request.
    Success,
    /// Request failed or returned a non-success status.
    Failed,
    /// Probe skipped (price threshold or quota kind).
    Skipped,
}

impl ProbeStatus {
    /// Storage code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Untested => 0,
            Self::Success => 1,
            Self::Failed => 2,
            Self::Skipped => 3,
        }
    }

    /// Decode from a stored integer code; unknown codes decode as Untested.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Success,
            2 => Self::Failed,
            3 => Self::Skipped,
            _ => Self::Untested,
        }
    }

    /// Human label for listings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Untested => "untested",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

// =============================================================================
// Upstream Provider
// =============================================================================

/// An external vendor reselling LLM access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamProvider {
    pub id: i64,
    /// Unique provider name.
    pub name: String,
    /// API base URL (no trailing slash required).
    pub base_url: String,
    /// Provider-level cost multiplier.
    pub ratio: f64,
    /// Wire schema of the provider's pricing endpoint.
    pub schema: PriceSchema,
    pub created_at: DateTime<Utc>,
}

impl UpstreamProvider {
    /// URL of the provider's pricing endpoint.
    #[must_use]
    pub fn pricing_url(&self) -> String {
        format!("{}/api/pricing", self.base_url.trim_end_matches('/'))
    }
}

// =============================================================================
// Price Group
// =============================================================================

/// A named billing tier under a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceGroup {
    pub id: i64,
    /// Owning provider id.
    pub provider_id: i64,
    /// Group name as it appears in the vendor's price tables.
    pub name: String,
    /// Group-level cost multiplier.
    pub ratio: f64,
    /// Access credential for this tier.
    pub access_key: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Model Offer
// =============================================================================

/// One (model, provider, group) priced entry, as stored.
///
/// Identity is the model name: re-import updates the existing row in place,
/// preserving `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOffer {
    pub id: i64,
    /// Model name.
    pub name: String,
    /// Model ratio used by the metered cost formula.
    pub ratio: f64,
    /// Fixed per-call price (zero for metered offers).
    pub price: Decimal,
    /// Completion ratio used by the metered cost formula.
    pub completion_ratio: f64,
    pub quota_kind: QuotaKind,
    pub provider_id: i64,
    pub group_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A normalized offer produced from a pricing feed, before storage.
///
/// Carries no id or creation time; the store assigns those on insert and
/// preserves them on update.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedOffer {
    pub name: String,
    pub ratio: f64,
    pub price: Decimal,
    pub completion_ratio: f64,
    pub quota_kind: QuotaKind,
    pub provider_id: i64,
    pub group_id: i64,
}

// =============================================================================
// Test Result
// =============================================================================

/// One append-only availability probe record for an offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: i64,
    pub offer_id: i64,
    pub tested_at: DateTime<Utc>,
    pub status: ProbeStatus,
    pub error: Option<String>,
    /// Probe kind tag ("chat", "embedding", "skip").
    pub probe_kind: String,
}

// =============================================================================
// Channel Request
// =============================================================================

/// A gateway-facing channel definition emitted by the consolidator.
///
/// Serialized field names match the gateway's channel-management API; the
/// calling layer wraps this in a `{ mode: "single", channel: ... }` envelope
/// for creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: i64,
    pub key: String,
    pub base_url: String,
    /// Comma-joined model list.
    pub models: String,
    /// JSON-serialized alias map.
    pub model_mapping: String,
    pub groups: Vec<String>,
    /// Priority tier, 1-100; higher is preferred.
    pub priority: i64,
    pub weight: i64,
}
