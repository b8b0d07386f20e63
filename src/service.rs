//! Orchestration service
//!
//! Composes validation, fan-out, normalization and aggregation into the
//! per-kind request/response contracts the UI consumes. History appends are
//! best-effort: a persistence failure is logged and the aggregated result is
//! still returned.

use std::sync::Arc;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{Result, ValidationError};
use crate::exif::{self, ExifSummary};
use crate::history::HistoryStore;
use crate::model::{
    AggregatedResult, HistoryEntry, NormalizedRecord, ProviderResult, Query, QueryKind, RiskLevel,
    Statistics, Status,
};
use crate::normalize::normalize_all;
use crate::providers::{default_registry, ProviderRegistry, PLATFORMS};
use crate::report::{ReportStore, StoredReport};
use crate::risk;

const FREE_PROVIDERS: &[&str] = &["gmail.com", "yahoo.com", "outlook.com", "hotmail.com"];
const DISPOSABLE_PROVIDERS: &[&str] = &["tempmail.com", "guerrillamail.com", "10minutemail.com"];

/// The orchestrator behind every lookup endpoint
pub struct OsintService {
    registry: Arc<ProviderRegistry>,
    dispatcher: Dispatcher,
    history: HistoryStore,
    reports: ReportStore,
}

impl OsintService {
    pub fn new(
        registry: ProviderRegistry,
        dispatcher: Dispatcher,
        history: HistoryStore,
        reports: ReportStore,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            dispatcher,
            history,
            reports,
        }
    }

    /// Wire up the default registry and stores from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let history = HistoryStore::open(config.data_dir.join("search_history.json"))?;
        Ok(Self::new(
            default_registry(config),
            Dispatcher::from_config(config),
            history,
            ReportStore::new(&config.reports_dir),
        ))
    }

    /// Validate, fan out, normalize and aggregate one query
    ///
    /// Returns the per-provider results alongside the aggregate; most kinds
    /// only need the aggregate, but the username response also reports the
    /// providers that answered "not found".
    async fn run(
        &self,
        kind: QueryKind,
        target: &str,
    ) -> Result<(AggregatedResult, Vec<ProviderResult>)> {
        let query = Query::new(kind, target);
        let providers = self.registry.providers_for(kind);
        info!(%kind, target, providers = providers.len(), "dispatching");

        let mut results = self.dispatcher.dispatch(&query, providers).await;
        let records = normalize_all(kind, &mut results);
        let aggregated = aggregate(&query, &results, records)?;

        self.record(HistoryEntry::from_result(&aggregated)).await;
        Ok((aggregated, results))
    }

    /// Best-effort history append; failures degrade to a log line
    async fn record(&self, entry: HistoryEntry) {
        if let Err(error) = self.history.append(entry).await {
            warn!(%error, "history append failed, result returned anyway");
        }
    }

    pub async fn lookup_username(&self, username: &str) -> Result<UsernameResponse> {
        validate_username(username)?;
        let (aggregated, results) = self.run(QueryKind::Username, username).await?;

        // The platforms list covers hits and definitive misses: records carry
        // the hits (normalization yields one per success, in dispatch order),
        // and a "not found" provider contributes an exists:false entry named
        // after its platform.
        let mut records = aggregated.records.iter();
        let mut platforms = Vec::new();
        let mut found_on = Vec::new();
        for result in &results {
            match result.status {
                Status::Success => {
                    if let Some(NormalizedRecord::Platform {
                        platform,
                        exists,
                        url,
                        status_code,
                    }) = records.next()
                    {
                        if *exists {
                            found_on.push(platform.clone());
                        }
                        platforms.push(PlatformEntry {
                            platform: platform.clone(),
                            exists: *exists,
                            url: url.clone(),
                            status_code: *status_code,
                        });
                    }
                }
                Status::NotFound => {
                    if let Some(platform) = platform_display_name(&result.provider_id) {
                        platforms.push(PlatformEntry {
                            platform,
                            exists: false,
                            url: None,
                            status_code: None,
                        });
                    }
                }
                Status::Error | Status::Timeout => {}
            }
        }

        Ok(UsernameResponse {
            username: username.to_string(),
            timestamp: aggregated.query.submitted_at,
            total_platforms: aggregated.statistics.total(),
            statistics: aggregated.statistics,
            platforms,
            found_on,
            risk_score: aggregated.risk_score,
            risk_level: aggregated.risk_level,
        })
    }

    pub async fn scan_email(&self, email: &str) -> Result<EmailResponse> {
        let domain = validate_email(email)?;
        let (aggregated, _) = self.run(QueryKind::Email, email).await?;

        let breaches: Vec<BreachEntry> = aggregated
            .records
            .iter()
            .filter_map(|record| match record {
                NormalizedRecord::Breach {
                    title,
                    domain,
                    pwn_count,
                    data_classes,
                    breach_date,
                    added_date,
                } => Some(BreachEntry {
                    title: title.clone(),
                    domain: domain.clone(),
                    pwn_count: *pwn_count,
                    data_classes: data_classes.clone(),
                    breach_date: breach_date.clone(),
                    added_date: added_date.clone(),
                }),
                _ => None,
            })
            .collect();

        let mut recommendations = Vec::new();
        if !breaches.is_empty() {
            recommendations.push("Change your password immediately".to_string());
            recommendations.push("Enable two-factor authentication".to_string());
            recommendations.push("Monitor your accounts for suspicious activity".to_string());
        }

        Ok(EmailResponse {
            email: email.to_string(),
            domain: domain.clone(),
            timestamp: aggregated.query.submitted_at,
            statistics: aggregated.statistics,
            breach_data: BreachData {
                breach_count: breaches.len(),
                risk_score: aggregated.risk_score,
                risk_level: aggregated.risk_level,
                breaches,
            },
            email_reputation: EmailReputation {
                free_provider: FREE_PROVIDERS.contains(&domain.as_str()),
                disposable: DISPOSABLE_PROVIDERS.contains(&domain.as_str()),
            },
            recommendations,
        })
    }

    pub async fn scan_domain(&self, domain: &str) -> Result<DomainResponse> {
        validate_domain(domain)?;
        let (aggregated, _) = self.run(QueryKind::Domain, domain).await?;

        let mut total_breaches = 0u32;
        let mut affected_records = 0u64;
        let mut most_recent_breach = None;
        for record in &aggregated.records {
            if let NormalizedRecord::DomainBreach {
                total_breaches: breaches,
                affected_records: affected,
                most_recent_breach: recent,
            } = record
            {
                total_breaches += breaches;
                affected_records = affected_records.saturating_add(*affected);
                if most_recent_breach.is_none() {
                    most_recent_breach = recent.clone();
                }
            }
        }

        Ok(DomainResponse {
            domain: domain.to_string(),
            timestamp: aggregated.query.submitted_at,
            statistics: aggregated.statistics,
            breach_statistics: DomainBreachStats {
                risk_level: aggregated.risk_level,
                total_breaches,
                affected_records,
                most_recent_breach,
            },
        })
    }

    pub async fn lookup_ip(&self, ip: &str) -> Result<IpResponse> {
        validate_ip(ip)?;
        let (aggregated, _) = self.run(QueryKind::Ip, ip).await?;

        let geolocation = aggregated.records.iter().find_map(|record| match record {
            NormalizedRecord::Geo {
                city,
                country,
                org,
                latitude,
                longitude,
            } => Some(Geolocation {
                city: city.clone(),
                country: country.clone(),
                org: org.clone(),
                latitude: *latitude,
                longitude: *longitude,
            }),
            _ => None,
        });

        let mut blacklisted = false;
        let mut in_vpn_list = false;
        for record in &aggregated.records {
            if let NormalizedRecord::Threat {
                blacklisted: listed,
                in_vpn_list: vpn,
                ..
            } = record
            {
                blacklisted |= *listed;
                in_vpn_list |= *vpn;
            }
        }

        Ok(IpResponse {
            ip: ip.to_string(),
            timestamp: aggregated.query.submitted_at,
            statistics: aggregated.statistics,
            geolocation,
            threat_intelligence: ThreatIntelligence {
                threat_score: aggregated.risk_score,
                threat_level: aggregated.risk_level,
                blacklisted,
                in_vpn_list,
            },
        })
    }

    pub async fn lookup_whois(&self, domain: &str) -> Result<WhoisResponse> {
        validate_domain(domain)?;
        let (aggregated, _) = self.run(QueryKind::Whois, domain).await?;

        let whois = aggregated.records.iter().find_map(|record| match record {
            NormalizedRecord::Whois {
                domain_name,
                registrar,
                creation_date,
                expiration_date,
                updated_date,
            } => Some(WhoisData {
                domain_name: domain_name.clone(),
                registrar: registrar.clone(),
                creation_date: creation_date.clone(),
                expiration_date: expiration_date.clone(),
                updated_date: updated_date.clone(),
            }),
            _ => None,
        });

        let mut dns_records = DnsRecords::default();
        for record in &aggregated.records {
            if let NormalizedRecord::Dns { a, ns } = record {
                dns_records.a.extend(a.iter().cloned());
                dns_records.ns.extend(ns.iter().cloned());
            }
        }

        Ok(WhoisResponse {
            domain: domain.to_string(),
            timestamp: aggregated.query.submitted_at,
            statistics: aggregated.statistics,
            whois,
            dns_records,
        })
    }

    /// Local EXIF extraction; no providers are dispatched for this kind
    pub async fn extract_exif(&self, filename: &str, data: &[u8]) -> Result<ExifSummary> {
        let summary = exif::extract(filename, data)?;

        let exposure = if summary.gps.is_some() { 75 } else { 10 };
        self.record(HistoryEntry {
            id: Uuid::new_v4(),
            kind: QueryKind::Exif,
            query: filename.to_string(),
            timestamp: Utc::now(),
            statistics: Statistics {
                found: 1,
                not_found: 0,
                errors: 0,
            },
            risk_level: risk::level_for(exposure),
        })
        .await;

        Ok(summary)
    }

    pub fn generate_report(
        &self,
        title: &str,
        data: &serde_json::Value,
        notes: &str,
    ) -> Result<ReportResponse> {
        let report = self.reports.generate(title, data, notes)?;
        info!(locator = %report.locator, title, "report generated");
        Ok(ReportResponse {
            download_url: format!("/api/download-report/{}", report.locator),
            locator: report.locator,
            id: report.id,
            created_at: report.created_at,
        })
    }

    pub fn fetch_report(&self, locator: &str) -> Result<StoredReport> {
        Ok(self.reports.fetch(locator)?)
    }

    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.history.list().await
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.history.clear().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire response types (the shapes the UI consumes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct UsernameResponse {
    pub username: String,
    pub timestamp: DateTime<Utc>,
    pub total_platforms: usize,
    pub statistics: Statistics,
    pub platforms: Vec<PlatformEntry>,
    pub found_on: Vec<String>,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformEntry {
    pub platform: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailResponse {
    pub email: String,
    pub domain: String,
    pub timestamp: DateTime<Utc>,
    pub statistics: Statistics,
    pub breach_data: BreachData,
    pub email_reputation: EmailReputation,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreachData {
    pub breach_count: usize,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub breaches: Vec<BreachEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreachEntry {
    pub title: String,
    pub domain: String,
    pub pwn_count: u64,
    pub data_classes: Vec<String>,
    pub breach_date: String,
    pub added_date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailReputation {
    pub free_provider: bool,
    pub disposable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainResponse {
    pub domain: String,
    pub timestamp: DateTime<Utc>,
    pub statistics: Statistics,
    pub breach_statistics: DomainBreachStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainBreachStats {
    pub risk_level: RiskLevel,
    pub total_breaches: u32,
    pub affected_records: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_recent_breach: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IpResponse {
    pub ip: String,
    pub timestamp: DateTime<Utc>,
    pub statistics: Statistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,
    pub threat_intelligence: ThreatIntelligence,
}

#[derive(Debug, Clone, Serialize)]
pub struct Geolocation {
    pub city: String,
    pub country: String,
    pub org: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreatIntelligence {
    pub threat_score: u32,
    pub threat_level: RiskLevel,
    pub blacklisted: bool,
    pub in_vpn_list: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WhoisResponse {
    pub domain: String,
    pub timestamp: DateTime<Utc>,
    pub statistics: Statistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois: Option<WhoisData>,
    pub dns_records: DnsRecords,
}

#[derive(Debug, Clone, Serialize)]
pub struct WhoisData {
    pub domain_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DnsRecords {
    #[serde(rename = "A")]
    pub a: Vec<String>,
    #[serde(rename = "NS")]
    pub ns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportResponse {
    pub download_url: String,
    pub locator: String,
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Recover the display name of a platform from its provider id
///
/// Platform providers are registered as `platform-<lowercase name>`; the
/// canonical capitalization comes from the platform table. Non-platform
/// providers yield `None`.
fn platform_display_name(provider_id: &str) -> Option<String> {
    let suffix = provider_id.strip_prefix("platform-")?;
    Some(
        PLATFORMS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(suffix))
            .map(|(name, _)| (*name).to_string())
            .unwrap_or_else(|| suffix.to_string()),
    )
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap()
    })
}

fn domain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.-]*\.[A-Za-z]{2,}$").unwrap())
}

fn validate_username(username: &str) -> std::result::Result<(), ValidationError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTarget {
            kind: "username".to_string(),
        });
    }
    if trimmed.len() > 64 || trimmed.chars().any(char::is_whitespace) {
        return Err(ValidationError::MalformedTarget {
            kind: "username".to_string(),
            target: username.to_string(),
            reason: "usernames are at most 64 characters with no whitespace".to_string(),
        });
    }
    Ok(())
}

/// Returns the mailbox's domain on success
fn validate_email(email: &str) -> std::result::Result<String, ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::EmptyTarget {
            kind: "email".to_string(),
        });
    }
    if !email_regex().is_match(email) {
        return Err(ValidationError::MalformedTarget {
            kind: "email".to_string(),
            target: email.to_string(),
            reason: "not a plausible mailbox address".to_string(),
        });
    }
    Ok(email
        .split('@')
        .nth(1)
        .unwrap_or_default()
        .to_lowercase())
}

fn validate_domain(domain: &str) -> std::result::Result<(), ValidationError> {
    if domain.trim().is_empty() {
        return Err(ValidationError::EmptyTarget {
            kind: "domain".to_string(),
        });
    }
    if !domain_regex().is_match(domain) {
        return Err(ValidationError::MalformedTarget {
            kind: "domain".to_string(),
            target: domain.to_string(),
            reason: "not a plausible domain name".to_string(),
        });
    }
    Ok(())
}

fn validate_ip(ip: &str) -> std::result::Result<(), ValidationError> {
    if ip.trim().is_empty() {
        return Err(ValidationError::EmptyTarget {
            kind: "ip".to_string(),
        });
    }
    ip.parse::<std::net::IpAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::MalformedTarget {
            kind: "ip".to_string(),
            target: ip.to_string(),
            reason: "not an IPv4 or IPv6 address".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_validation() {
        assert!(validate_username("octocat").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
        assert!(validate_username("two words").is_err());
    }

    #[test]
    fn test_email_validation_extracts_domain() {
        assert_eq!(validate_email("a.b@Example.COM").unwrap(), "example.com");
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("@nodomain").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_domain_validation() {
        assert!(validate_domain("example.com").is_ok());
        assert!(validate_domain("sub.example.co.uk").is_ok());
        assert!(validate_domain("no-tld").is_err());
        assert!(validate_domain("").is_err());
    }

    #[test]
    fn test_ip_validation() {
        assert!(validate_ip("8.8.8.8").is_ok());
        assert!(validate_ip("2001:db8::1").is_ok());
        assert!(validate_ip("999.1.1.1").is_err());
        assert!(validate_ip("example.com").is_err());
    }

    #[test]
    fn test_platform_display_name() {
        assert_eq!(
            platform_display_name("platform-github").as_deref(),
            Some("GitHub")
        );
        assert_eq!(
            platform_display_name("platform-unlisted").as_deref(),
            Some("unlisted")
        );
        assert_eq!(platform_display_name("breach-hibp"), None);
    }

    #[test]
    fn test_reputation_tables() {
        assert!(FREE_PROVIDERS.contains(&"gmail.com"));
        assert!(DISPOSABLE_PROVIDERS.contains(&"tempmail.com"));
    }
}
