//! Result normalizer
//!
//! Maps each provider's raw payload into the canonical per-kind record shape.
//! Normalization is pure: only successful results yield a record, and a
//! malformed payload downgrades the result to an error status instead of
//! propagating upward.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::model::{NormalizedRecord, ProviderResult, QueryKind, Status};

/// A payload that did not match the canonical shape for its kind
#[derive(Error, Debug)]
#[error("malformed {kind} payload from {provider_id}: {message}")]
pub struct NormalizeError {
    pub provider_id: String,
    pub kind: QueryKind,
    pub message: String,
}

/// Normalize one provider result
///
/// Pure: `Ok(Some(..))` for a well-formed successful result, `Ok(None)` for
/// non-success statuses (they carry no record but are still counted), `Err`
/// for a successful result whose payload does not decode.
pub fn normalize(
    kind: QueryKind,
    result: &ProviderResult,
) -> Result<Option<NormalizedRecord>, NormalizeError> {
    if result.status != Status::Success {
        return Ok(None);
    }

    let payload = result.payload.clone().ok_or_else(|| NormalizeError {
        provider_id: result.provider_id.clone(),
        kind,
        message: "successful result without payload".to_string(),
    })?;

    let record = decode(kind, payload).map_err(|message| NormalizeError {
        provider_id: result.provider_id.clone(),
        kind,
        message,
    })?;

    Ok(record)
}

/// Normalize a whole dispatch, downgrading malformed results in place
///
/// Every `Err` from [`normalize`] becomes `Status::Error` on the offending
/// result, so the statistics invariant still holds over the returned set.
pub fn normalize_all(kind: QueryKind, results: &mut [ProviderResult]) -> Vec<NormalizedRecord> {
    let mut records = Vec::new();
    for result in results.iter_mut() {
        match normalize(kind, result) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(error) => {
                debug!(%error, "downgrading malformed result");
                result.status = Status::Error;
                result.payload = None;
            }
        }
    }
    records
}

fn decode(kind: QueryKind, payload: serde_json::Value) -> Result<Option<NormalizedRecord>, String> {
    match kind {
        QueryKind::Username => {
            let p: PlatformPayload = serde_json::from_value(payload).map_err(stringify)?;
            Ok(Some(NormalizedRecord::Platform {
                platform: p.platform,
                exists: p.exists,
                url: p.url,
                status_code: p.status_code,
            }))
        }
        QueryKind::Email => {
            let p: BreachPayload = serde_json::from_value(payload).map_err(stringify)?;
            Ok(Some(NormalizedRecord::Breach {
                title: p.title,
                domain: p.domain,
                pwn_count: p.pwn_count,
                data_classes: p.data_classes,
                breach_date: p.breach_date,
                added_date: p.added_date,
            }))
        }
        QueryKind::Domain => {
            let p: DomainBreachPayload = serde_json::from_value(payload).map_err(stringify)?;
            Ok(Some(NormalizedRecord::DomainBreach {
                total_breaches: p.total_breaches,
                affected_records: p.affected_records,
                most_recent_breach: p.most_recent_breach,
            }))
        }
        QueryKind::Ip => {
            let p: IpPayload = serde_json::from_value(payload).map_err(stringify)?;
            Ok(Some(match p {
                IpPayload::Geo {
                    city,
                    country,
                    org,
                    latitude,
                    longitude,
                } => NormalizedRecord::Geo {
                    city,
                    country,
                    org,
                    latitude,
                    longitude,
                },
                IpPayload::Threat {
                    threat_score,
                    blacklisted,
                    in_vpn_list,
                } => NormalizedRecord::Threat {
                    threat_score,
                    blacklisted,
                    in_vpn_list,
                },
            }))
        }
        QueryKind::Whois => {
            let p: WhoisPayload = serde_json::from_value(payload).map_err(stringify)?;
            Ok(Some(match p {
                WhoisPayload::Whois {
                    domain_name,
                    registrar,
                    creation_date,
                    expiration_date,
                    updated_date,
                } => NormalizedRecord::Whois {
                    domain_name,
                    registrar,
                    creation_date,
                    expiration_date,
                    updated_date,
                },
                WhoisPayload::Dns { a, ns } => NormalizedRecord::Dns { a, ns },
            }))
        }
        // EXIF extraction is a local parse, never dispatched.
        QueryKind::Exif => Ok(None),
    }
}

fn stringify(e: serde_json::Error) -> String {
    e.to_string()
}

#[derive(Deserialize)]
struct PlatformPayload {
    platform: String,
    exists: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    status_code: Option<u16>,
}

#[derive(Deserialize)]
struct BreachPayload {
    title: String,
    #[serde(default)]
    domain: String,
    pwn_count: u64,
    #[serde(default)]
    data_classes: Vec<String>,
    #[serde(default)]
    breach_date: String,
    #[serde(default)]
    added_date: String,
}

#[derive(Deserialize)]
struct DomainBreachPayload {
    total_breaches: u32,
    affected_records: u64,
    #[serde(default)]
    most_recent_breach: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IpPayload {
    Geo {
        city: String,
        country: String,
        #[serde(default)]
        org: String,
        latitude: f64,
        longitude: f64,
    },
    Threat {
        threat_score: u32,
        blacklisted: bool,
        #[serde(default)]
        in_vpn_list: bool,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WhoisPayload {
    Whois {
        domain_name: String,
        #[serde(default)]
        registrar: Option<String>,
        #[serde(default)]
        creation_date: Option<String>,
        #[serde(default)]
        expiration_date: Option<String>,
        #[serde(default)]
        updated_date: Option<String>,
    },
    Dns {
        a: Vec<String>,
        ns: Vec<String>,
    },
}
