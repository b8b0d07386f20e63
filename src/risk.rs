//! Risk scoring
//!
//! Every score is a pure, documented function of the normalized records,
//! clamped to 0..=100. Levels come from fixed thresholds, never inferred per
//! query.

use chrono::{DateTime, Utc};

use crate::model::{NormalizedRecord, QueryKind, RiskLevel};

/// Scores at or below this are LOW
pub const LOW_CEILING: u32 = 33;
/// Scores above `LOW_CEILING` and at or below this are MEDIUM; above is HIGH
pub const MEDIUM_CEILING: u32 = 66;

/// Map a score onto the fixed level thresholds
pub fn level_for(score: u32) -> RiskLevel {
    if score <= LOW_CEILING {
        RiskLevel::Low
    } else if score <= MEDIUM_CEILING {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Compute the kind-specific risk score over normalized records
///
/// `as_of` is the query's submission instant; it anchors every age-relative
/// formula so identical inputs always yield the identical score.
///
/// Formulas (all capped at 100):
/// - username: `5 · platforms_found` — a broader public footprint means more
///   correlatable exposure.
/// - email: `14 · breaches + 8 · sensitive_breaches + 3 · ⌊log10(Σ pwn_count)⌋`
///   where a breach is sensitive when it exposes passwords, card or bank
///   data. Monotone in breach count and severity.
/// - domain: `8 · total_breaches + 3 · ⌊log10(affected_records)⌋`.
/// - ip: mean of provider threat scores; any blacklist hit forces at
///   least 70.
/// - whois: 60 when the domain is younger than 30 days at `as_of` (fresh
///   registrations correlate with abuse), otherwise 10.
/// - exif: no dispatch records; scored at the extraction site from GPS
///   presence.
pub fn score(kind: QueryKind, records: &[NormalizedRecord], as_of: DateTime<Utc>) -> u32 {
    let raw = match kind {
        QueryKind::Username => username_score(records),
        QueryKind::Email => email_score(records),
        QueryKind::Domain => domain_score(records),
        QueryKind::Ip => ip_score(records),
        QueryKind::Whois => whois_score(records, as_of),
        QueryKind::Exif => 0,
    };
    raw.min(100)
}

fn username_score(records: &[NormalizedRecord]) -> u32 {
    let found = records
        .iter()
        .filter(|r| matches!(r, NormalizedRecord::Platform { exists: true, .. }))
        .count() as u32;
    found * 5
}

fn email_score(records: &[NormalizedRecord]) -> u32 {
    let mut breaches = 0u32;
    let mut sensitive = 0u32;
    let mut total_pwned = 0u64;

    for record in records {
        if let NormalizedRecord::Breach {
            pwn_count,
            data_classes,
            ..
        } = record
        {
            breaches += 1;
            total_pwned = total_pwned.saturating_add(*pwn_count);
            if data_classes.iter().any(|c| is_sensitive_class(c)) {
                sensitive += 1;
            }
        }
    }

    14 * breaches + 8 * sensitive + 3 * magnitude(total_pwned)
}

fn domain_score(records: &[NormalizedRecord]) -> u32 {
    let mut breaches = 0u32;
    let mut affected = 0u64;

    for record in records {
        if let NormalizedRecord::DomainBreach {
            total_breaches,
            affected_records,
            ..
        } = record
        {
            breaches += total_breaches;
            affected = affected.saturating_add(*affected_records);
        }
    }

    8 * breaches + 3 * magnitude(affected)
}

fn ip_score(records: &[NormalizedRecord]) -> u32 {
    let mut scores: Vec<u64> = Vec::new();
    let mut blacklisted = false;

    for record in records {
        if let NormalizedRecord::Threat {
            threat_score,
            blacklisted: listed,
            ..
        } = record
        {
            // Widened before summing; a provider can send any u32 here.
            scores.push(u64::from(*threat_score));
            blacklisted |= *listed;
        }
    }

    let mean = if scores.is_empty() {
        0
    } else {
        (scores.iter().sum::<u64>() / scores.len() as u64) as u32
    };

    if blacklisted {
        mean.max(70)
    } else {
        mean
    }
}

fn whois_score(records: &[NormalizedRecord], as_of: DateTime<Utc>) -> u32 {
    for record in records {
        if let NormalizedRecord::Whois {
            creation_date: Some(created),
            ..
        } = record
        {
            if let Ok(created) = created.parse::<DateTime<Utc>>() {
                let age = as_of.signed_duration_since(created);
                if age.num_days() < 30 {
                    return 60;
                }
            }
        }
    }
    10
}

fn is_sensitive_class(class: &str) -> bool {
    let class = class.to_lowercase();
    class.contains("password") || class.contains("credit") || class.contains("bank")
}

/// Integer `⌊log10(n)⌋`, 0 for n < 10
fn magnitude(n: u64) -> u32 {
    let mut value = n;
    let mut mag = 0;
    while value >= 10 {
        value /= 10;
        mag += 1;
    }
    mag
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn breach(pwn_count: u64, data_classes: &[&str]) -> NormalizedRecord {
        NormalizedRecord::Breach {
            title: "breach".to_string(),
            domain: "example.com".to_string(),
            pwn_count,
            data_classes: data_classes.iter().map(|s| s.to_string()).collect(),
            breach_date: "2020-01-01".to_string(),
            added_date: "2020-01-02".to_string(),
        }
    }

    #[test]
    fn test_level_thresholds_are_fixed() {
        assert_eq!(level_for(0), RiskLevel::Low);
        assert_eq!(level_for(33), RiskLevel::Low);
        assert_eq!(level_for(34), RiskLevel::Medium);
        assert_eq!(level_for(66), RiskLevel::Medium);
        assert_eq!(level_for(67), RiskLevel::High);
        assert_eq!(level_for(100), RiskLevel::High);
    }

    #[test]
    fn test_email_score_fixed_input() {
        // Two breaches totalling 5,000 exposed records, one with a password
        // data class: 14*2 + 8*1 + 3*3 = 45.
        let records = vec![
            breach(3_000, &["Email addresses", "Passwords"]),
            breach(2_000, &["Email addresses"]),
        ];
        assert_eq!(score(QueryKind::Email, &records, as_of()), 45);
        assert_eq!(level_for(45), RiskLevel::Medium);
    }

    #[test]
    fn test_email_score_is_pure() {
        let records = vec![breach(68_000_000, &["Passwords"])];
        let a = score(QueryKind::Email, &records, as_of());
        let b = score(QueryKind::Email, &records, as_of());
        assert_eq!(a, b);
    }

    #[test]
    fn test_email_score_monotone_in_breach_count() {
        let one = vec![breach(1_000, &["Email addresses"])];
        let two = vec![
            breach(1_000, &["Email addresses"]),
            breach(1_000, &["Email addresses"]),
        ];
        assert!(score(QueryKind::Email, &two, as_of()) > score(QueryKind::Email, &one, as_of()));
    }

    #[test]
    fn test_score_is_capped() {
        let records: Vec<NormalizedRecord> =
            (0..50).map(|_| breach(773_000_000, &["Passwords"])).collect();
        assert_eq!(score(QueryKind::Email, &records, as_of()), 100);
    }

    #[test]
    fn test_username_score() {
        let records: Vec<NormalizedRecord> = (0..12)
            .map(|i| NormalizedRecord::Platform {
                platform: format!("p{i}"),
                exists: true,
                url: None,
                status_code: Some(200),
            })
            .collect();
        assert_eq!(score(QueryKind::Username, &records, as_of()), 60);
    }

    #[test]
    fn test_ip_blacklist_floor() {
        let records = vec![
            NormalizedRecord::Threat {
                threat_score: 10,
                blacklisted: true,
                in_vpn_list: false,
            },
            NormalizedRecord::Threat {
                threat_score: 20,
                blacklisted: false,
                in_vpn_list: false,
            },
        ];
        assert_eq!(score(QueryKind::Ip, &records, as_of()), 70);
    }

    #[test]
    fn test_ip_score_tolerates_extreme_threat_values() {
        // A buggy or hostile provider can put any u32 in its payload; the
        // mean must not overflow on the way to the cap.
        let records = vec![
            NormalizedRecord::Threat {
                threat_score: u32::MAX,
                blacklisted: false,
                in_vpn_list: false,
            },
            NormalizedRecord::Threat {
                threat_score: u32::MAX,
                blacklisted: false,
                in_vpn_list: false,
            },
        ];
        assert_eq!(score(QueryKind::Ip, &records, as_of()), 100);
    }

    #[test]
    fn test_whois_score_is_anchored_to_the_query_instant() {
        let whois = |created: &str| NormalizedRecord::Whois {
            domain_name: "EXAMPLE.COM".to_string(),
            registrar: None,
            creation_date: Some(created.to_string()),
            expiration_date: None,
            updated_date: None,
        };

        // 12 days old at the query instant: fresh registration.
        let fresh = vec![whois("2024-05-20T00:00:00Z")];
        assert_eq!(score(QueryKind::Whois, &fresh, as_of()), 60);

        // Years old: baseline.
        let seasoned = vec![whois("2015-03-20T10:30:00Z")];
        assert_eq!(score(QueryKind::Whois, &seasoned, as_of()), 10);

        // Same records, same instant, same score regardless of wall clock.
        assert_eq!(
            score(QueryKind::Whois, &fresh, as_of()),
            score(QueryKind::Whois, &fresh, as_of())
        );
    }

    #[test]
    fn test_magnitude() {
        assert_eq!(magnitude(0), 0);
        assert_eq!(magnitude(9), 0);
        assert_eq!(magnitude(10), 1);
        assert_eq!(magnitude(5_000), 3);
        assert_eq!(magnitude(773_000_000), 8);
    }
}
