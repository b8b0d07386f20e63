//! Registrar and DNS providers for domain/whois lookups
//!
//! Live lookups use RDAP (the registry-neutral successor to port-43 WHOIS)
//! and DNS-over-HTTPS, both keyless. Fixture variants exist for offline use.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::ProviderError;
use crate::model::QueryKind;

use super::Provider;

const RDAP_BASE: &str = "https://rdap.org/domain";
const DOH_BASE: &str = "https://dns.google/resolve";

/// Registrar data via the RDAP bootstrap service
pub struct RdapProvider {
    http: reqwest::Client,
}

impl RdapProvider {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
struct RdapBody {
    #[serde(rename = "ldhName", default)]
    ldh_name: String,
    #[serde(default)]
    events: Vec<RdapEvent>,
    #[serde(default)]
    entities: Vec<RdapEntity>,
}

#[derive(Debug, Deserialize)]
struct RdapEvent {
    #[serde(rename = "eventAction", default)]
    action: String,
    #[serde(rename = "eventDate", default)]
    date: String,
}

#[derive(Debug, Deserialize)]
struct RdapEntity {
    #[serde(default)]
    roles: Vec<String>,
    #[serde(rename = "vcardArray", default)]
    vcard: serde_json::Value,
}

impl RdapBody {
    fn event(&self, action: &str) -> Option<String> {
        self.events
            .iter()
            .find(|e| e.action == action)
            .map(|e| e.date.clone())
    }

    /// Formatted name of the entity holding the registrar role
    fn registrar(&self) -> Option<String> {
        let entity = self
            .entities
            .iter()
            .find(|e| e.roles.iter().any(|r| r == "registrar"))?;

        // vcardArray = ["vcard", [["fn", {}, "text", "Name"], ...]]
        let props = entity.vcard.as_array()?.get(1)?.as_array()?;
        props.iter().find_map(|prop| {
            let prop = prop.as_array()?;
            if prop.first()?.as_str()? == "fn" {
                prop.get(3)?.as_str().map(str::to_string)
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl Provider for RdapProvider {
    fn id(&self) -> &str {
        "whois-rdap"
    }

    fn kind(&self) -> QueryKind {
        QueryKind::Whois
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(8)
    }

    fn max_retries(&self) -> u32 {
        1
    }

    async fn query(&self, target: &str) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/{}", RDAP_BASE, target);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        match response.status().as_u16() {
            404 => Err(ProviderError::NotFound),
            429 | 502 | 503 => Err(ProviderError::Transient("RDAP throttled".to_string())),
            200 => {
                let body: RdapBody = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::Fatal(format!("undecodable RDAP body: {e}")))?;

                Ok(json!({
                    "domain_name": body.ldh_name.to_uppercase(),
                    "registrar": body.registrar(),
                    "creation_date": body.event("registration"),
                    "expiration_date": body.event("expiration"),
                    "updated_date": body.event("last changed"),
                }))
            }
            other => Err(ProviderError::Fatal(format!("RDAP answered {other}"))),
        }
    }
}

/// A/NS resolution over DNS-over-HTTPS
pub struct DohProvider {
    http: reqwest::Client,
}

impl DohProvider {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn resolve(&self, domain: &str, rtype: &str) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}?name={}&type={}", DOH_BASE, domain, rtype);

        let response = self
            .http
            .get(&url)
            .header("accept", "application/dns-json")
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Transient(format!(
                "DoH answered {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct DohBody {
            #[serde(rename = "Answer", default)]
            answer: Vec<DohAnswer>,
        }

        #[derive(Deserialize)]
        struct DohAnswer {
            #[serde(default)]
            data: String,
        }

        let body: DohBody = response
            .json()
            .await
            .map_err(|e| ProviderError::Fatal(format!("undecodable DoH body: {e}")))?;

        Ok(body.answer.into_iter().map(|a| a.data).collect())
    }
}

#[async_trait]
impl Provider for DohProvider {
    fn id(&self) -> &str {
        "dns-doh"
    }

    fn kind(&self) -> QueryKind {
        QueryKind::Whois
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(6)
    }

    fn max_retries(&self) -> u32 {
        2
    }

    async fn query(&self, target: &str) -> Result<serde_json::Value, ProviderError> {
        let a = self.resolve(target, "A").await?;
        let ns = self.resolve(target, "NS").await?;

        if a.is_empty() && ns.is_empty() {
            return Err(ProviderError::NotFound);
        }

        Ok(json!({ "a": a, "ns": ns }))
    }
}

/// Offline registrar fixture with synthetic but stable dates
pub struct WhoisFixtureProvider;

impl WhoisFixtureProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WhoisFixtureProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for WhoisFixtureProvider {
    fn id(&self) -> &str {
        "whois-fixture"
    }

    fn kind(&self) -> QueryKind {
        QueryKind::Whois
    }

    async fn query(&self, target: &str) -> Result<serde_json::Value, ProviderError> {
        Ok(json!({
            "domain_name": target.to_uppercase(),
            "registrar": "GoDaddy.com, LLC",
            "creation_date": "2015-03-20T10:30:00Z",
            "expiration_date": "2026-03-20T10:30:00Z",
            "updated_date": "2024-01-15T08:20:00Z",
        }))
    }
}

/// Offline DNS fixture
pub struct DnsFixtureProvider;

impl DnsFixtureProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DnsFixtureProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for DnsFixtureProvider {
    fn id(&self) -> &str {
        "dns-fixture"
    }

    fn kind(&self) -> QueryKind {
        QueryKind::Whois
    }

    async fn query(&self, target: &str) -> Result<serde_json::Value, ProviderError> {
        Ok(json!({
            "a": ["192.0.2.1"],
            "ns": [format!("ns1.{target}"), format!("ns2.{target}")],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rdap_registrar_extraction() {
        let body: RdapBody = serde_json::from_value(json!({
            "ldhName": "example.com",
            "events": [
                {"eventAction": "registration", "eventDate": "1995-08-14T04:00:00Z"},
                {"eventAction": "expiration", "eventDate": "2026-08-13T04:00:00Z"}
            ],
            "entities": [{
                "roles": ["registrar"],
                "vcardArray": ["vcard", [["version", {}, "text", "4.0"],
                                         ["fn", {}, "text", "RESERVED-IANA"]]]
            }]
        }))
        .unwrap();

        assert_eq!(body.registrar().as_deref(), Some("RESERVED-IANA"));
        assert_eq!(
            body.event("registration").as_deref(),
            Some("1995-08-14T04:00:00Z")
        );
        assert_eq!(body.event("transfer"), None);
    }

    #[tokio::test]
    async fn test_fixture_shapes() {
        let whois = WhoisFixtureProvider::new()
            .query("example.com")
            .await
            .unwrap();
        assert_eq!(whois["domain_name"], "EXAMPLE.COM");

        let dns = DnsFixtureProvider::new().query("example.com").await.unwrap();
        assert_eq!(dns["ns"][0], "ns1.example.com");
    }
}
