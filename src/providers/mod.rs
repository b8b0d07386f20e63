//! Pluggable data providers
//!
//! Every external data source sits behind the [`Provider`] trait: one
//! capability (`query(target) -> raw payload | error`) over a fixed set of
//! query kinds. Concrete adapters never touch the dispatcher or aggregator;
//! adding a source means registering another trait object.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::ProviderError;
use crate::model::QueryKind;

mod breach;
mod geo;
mod net;
mod platform;
mod registry;

pub use breach::{BreachCatalogProvider, DomainBreachProvider, HibpProvider};
pub use geo::{BlocklistProvider, GeoFixtureProvider, IpinfoProvider};
pub use net::{DnsFixtureProvider, DohProvider, RdapProvider, WhoisFixtureProvider};
pub use platform::{PlatformProvider, PLATFORMS};
pub use registry::{ProviderRegistry, RegistryBuilder};

/// Default per-provider call budget when an adapter does not override it
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// One external data source contributing to a query's result
///
/// Implementations are registered once at startup and shared read-only across
/// all dispatches.
///
/// # Implementation notes
///
/// - Return [`ProviderError::NotFound`] for a definitive "no data here";
///   it is counted, not retried.
/// - Return [`ProviderError::Transient`] for failures worth retrying
///   (connection resets, 429s); the dispatcher retries up to `max_retries`.
/// - Anything else is [`ProviderError::Fatal`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique identifier, stable across runs (e.g. "platform-github")
    fn id(&self) -> &str;

    /// Query kind this provider serves
    fn kind(&self) -> QueryKind;

    /// Per-call budget; the dispatcher caps it by the remaining global
    /// deadline
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Retry budget for transient failures
    fn max_retries(&self) -> u32 {
        0
    }

    /// Issue one call against the target, returning the raw payload
    async fn query(&self, target: &str) -> Result<serde_json::Value, ProviderError>;
}

/// Build the default registry from configuration
///
/// Live adapters are wired in where credentials exist; fixture providers
/// stand in otherwise so keyless deployments still produce full responses.
pub fn default_registry(config: &Config) -> ProviderRegistry {
    let mut builder = ProviderRegistry::builder();

    let http = shared_http_client();

    for (platform, template) in PLATFORMS {
        builder = builder.register(PlatformProvider::new(
            platform,
            template,
            http.clone(),
            config.provider_timeout,
        ));
    }

    if let Some(key) = &config.hibp_api_key {
        builder = builder.register(HibpProvider::new(http.clone(), key.clone()));
    } else {
        for provider in BreachCatalogProvider::fixtures() {
            builder = builder.register(provider);
        }
    }

    builder = builder.register(DomainBreachProvider::new());

    if let Some(token) = &config.ipinfo_token {
        builder = builder.register(IpinfoProvider::new(http.clone(), token.clone()));
    } else {
        builder = builder.register(GeoFixtureProvider::new());
    }
    builder = builder.register(BlocklistProvider::new());

    builder = builder.register(RdapProvider::new(http.clone()));
    builder = builder.register(DohProvider::new(http));

    builder.build()
}

/// Shared HTTP client for all live adapters
fn shared_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("godeye/0.1 (osint aggregation service)")
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .unwrap_or_default()
}
