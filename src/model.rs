//! Core data model shared across the orchestrator
//!
//! Queries, provider results, normalized records and aggregated results are
//! immutable once constructed; the dispatcher owns `ProviderResult`s only for
//! the duration of one dispatch.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Username,
    Email,
    Domain,
    Ip,
    Whois,
    Exif,
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Username => write!(f, "username"),
            Self::Email => write!(f, "email"),
            Self::Domain => write!(f, "domain"),
            Self::Ip => write!(f, "ip"),
            Self::Whois => write!(f, "whois"),
            Self::Exif => write!(f, "exif"),
        }
    }
}

/// One submitted lookup, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub kind: QueryKind,
    /// Raw user-supplied target string
    pub target: String,
    pub submitted_at: DateTime<Utc>,
}

impl Query {
    pub fn new(kind: QueryKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// Terminal state of one provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    NotFound,
    Error,
    Timeout,
}

/// Outcome of one provider call within a dispatch
///
/// Produced exactly once per provider per dispatch. The output list of a
/// dispatch preserves provider registration order, not completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider_id: String,
    pub status: Status,
    pub payload: Option<serde_json::Value>,
    pub latency: Duration,
}

impl ProviderResult {
    pub fn new(provider_id: impl Into<String>, status: Status, latency: Duration) -> Self {
        Self {
            provider_id: provider_id.into(),
            status,
            payload: None,
            latency,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// A provider response mapped into the canonical per-kind shape
///
/// At most one record per successful provider result; `not_found`, `error`
/// and `timeout` results yield no record but are still counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum NormalizedRecord {
    /// Platform-presence check (username kind)
    Platform {
        platform: String,
        exists: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },
    /// One breach corpus hit (email kind)
    Breach {
        title: String,
        domain: String,
        pwn_count: u64,
        data_classes: Vec<String>,
        breach_date: String,
        added_date: String,
    },
    /// Domain-level breach exposure (domain kind)
    DomainBreach {
        total_breaches: u32,
        affected_records: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        most_recent_breach: Option<String>,
    },
    /// Geolocation answer (ip kind)
    Geo {
        city: String,
        country: String,
        org: String,
        latitude: f64,
        longitude: f64,
    },
    /// Threat/reputation answer (ip kind)
    Threat {
        threat_score: u32,
        blacklisted: bool,
        in_vpn_list: bool,
    },
    /// Registrar data (whois kind)
    Whois {
        domain_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        registrar: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        creation_date: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        expiration_date: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        updated_date: Option<String>,
    },
    /// DNS answer (whois kind)
    Dns {
        a: Vec<String>,
        ns: Vec<String>,
    },
}

/// Per-dispatch provider statistics
///
/// Invariant: `found + not_found + errors` equals the number of providers
/// queried for the kind. Timeouts are counted under `errors`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub found: usize,
    pub not_found: usize,
    pub errors: usize,
}

impl Statistics {
    pub fn total(&self) -> usize {
        self.found + self.not_found + self.errors
    }
}

/// Categorical exposure summary derived from the risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// The reduced view of one completed dispatch, immutable after construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub query: Query,
    pub records: Vec<NormalizedRecord>,
    pub statistics: Statistics,
    /// 0..=100, pure function of the normalized records
    pub risk_score: u32,
    pub risk_level: RiskLevel,
}

/// One line of the append-only query log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: QueryKind,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub statistics: Statistics,
    pub risk_level: RiskLevel,
}

impl HistoryEntry {
    pub fn from_result(result: &AggregatedResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: result.query.kind,
            query: result.query.target.clone(),
            timestamp: result.query.submitted_at,
            statistics: result.statistics,
            risk_level: result.risk_level,
        }
    }
}

/// Metadata of a generated report artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub notes: String,
    /// Opaque handle used to retrieve the artifact
    pub locator: String,
}
