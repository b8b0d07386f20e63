//! End-to-end orchestrator scenarios
//!
//! Exercises the full pipeline against scripted in-process providers: fan-out
//! ordering, the global deadline, panic isolation, retry behavior, scoring,
//! history and report round trips.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use godeye::dispatch::Dispatcher;
use godeye::error::{OsintError, ProviderError};
use godeye::history::HistoryStore;
use godeye::model::{Query, QueryKind, RiskLevel, Status};
use godeye::normalize::normalize_all;
use godeye::providers::{
    BlocklistProvider, DnsFixtureProvider, GeoFixtureProvider, Provider, ProviderRegistry,
    RegistryBuilder, WhoisFixtureProvider,
};
use godeye::report::ReportStore;
use godeye::service::OsintService;

/// What a scripted provider does when queried
enum Script {
    Succeed(Value),
    NotFound,
    Fail(String),
    FailThenSucceed(Value),
    Hang,
    Panic,
}

struct ScriptedProvider {
    id: String,
    kind: QueryKind,
    script: Script,
    retries: u32,
    attempts: Arc<AtomicU32>,
}

impl ScriptedProvider {
    fn new(id: &str, kind: QueryKind, script: Script) -> Self {
        Self {
            id: id.to_string(),
            kind,
            script,
            retries: 0,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    fn attempt_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.attempts)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> QueryKind {
        self.kind
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(2)
    }

    fn max_retries(&self) -> u32 {
        self.retries
    }

    async fn query(&self, _target: &str) -> Result<Value, ProviderError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Succeed(payload) => Ok(payload.clone()),
            Script::NotFound => Err(ProviderError::NotFound),
            Script::Fail(message) => Err(ProviderError::Fatal(message.clone())),
            Script::FailThenSucceed(payload) => {
                if attempt == 0 {
                    Err(ProviderError::Transient("connection reset".to_string()))
                } else {
                    Ok(payload.clone())
                }
            }
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::Fatal("unreachable".to_string()))
            }
            Script::Panic => panic!("scripted provider panic"),
        }
    }
}

fn platform_payload(name: &str) -> Value {
    json!({
        "platform": name,
        "exists": true,
        "url": format!("https://{}.example/octocat", name.to_lowercase()),
        "status_code": 200,
    })
}

fn breach_payload(title: &str, pwn_count: u64, data_classes: &[&str]) -> Value {
    json!({
        "title": title,
        "domain": "example.com",
        "pwn_count": pwn_count,
        "data_classes": data_classes,
        "breach_date": "2021-06-01",
        "added_date": "2021-06-15",
    })
}

fn arc(provider: ScriptedProvider) -> Arc<dyn Provider> {
    Arc::new(provider)
}

fn test_service(registry: ProviderRegistry, dir: &std::path::Path) -> OsintService {
    OsintService::new(
        registry,
        Dispatcher::new(Duration::from_millis(500)).with_backoff_base(Duration::from_millis(10)),
        HistoryStore::open(dir.join("history.json")).unwrap(),
        ReportStore::new(dir.join("reports")),
    )
}

// ---------------------------------------------------------------------------
// Dispatch semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_mixed_outcomes_partition_into_statistics() {
    // 20 platform probes: 12 hits, 5 misses, 3 that never answer.
    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();
    for i in 0..12 {
        providers.push(arc(ScriptedProvider::new(
            &format!("hit-{i}"),
            QueryKind::Username,
            Script::Succeed(platform_payload(&format!("Site{i}"))),
        )));
    }
    for i in 0..5 {
        providers.push(arc(ScriptedProvider::new(
            &format!("miss-{i}"),
            QueryKind::Username,
            Script::NotFound,
        )));
    }
    for i in 0..3 {
        providers.push(arc(ScriptedProvider::new(
            &format!("hang-{i}"),
            QueryKind::Username,
            Script::Hang,
        )));
    }

    let dispatcher = Dispatcher::new(Duration::from_millis(300));
    let query = Query::new(QueryKind::Username, "octocat");
    let mut results = dispatcher.dispatch(&query, &providers).await;

    assert_eq!(results.len(), 20);
    let records = normalize_all(QueryKind::Username, &mut results);
    let aggregated = godeye::aggregate::aggregate(&query, &results, records).unwrap();

    assert_eq!(aggregated.statistics.found, 12);
    assert_eq!(aggregated.statistics.not_found, 5);
    assert_eq!(aggregated.statistics.errors, 3);
    assert_eq!(aggregated.statistics.total(), 20);
    assert_eq!(aggregated.risk_score, 60);
    assert_eq!(aggregated.risk_level, RiskLevel::Medium);
}

#[tokio::test]
async fn test_results_come_back_in_registration_order() {
    // The fast provider finishes long before the slow one, but output order
    // must follow registration order.
    let slow = ScriptedProvider::new("slow", QueryKind::Username, Script::FailThenSucceed(
        platform_payload("Slow"),
    ))
    .with_retries(1);
    let providers: Vec<Arc<dyn Provider>> = vec![
        arc(slow),
        arc(ScriptedProvider::new(
            "fast",
            QueryKind::Username,
            Script::Succeed(platform_payload("Fast")),
        )),
    ];

    let dispatcher =
        Dispatcher::new(Duration::from_secs(2)).with_backoff_base(Duration::from_millis(50));
    let query = Query::new(QueryKind::Username, "octocat");
    let results = dispatcher.dispatch(&query, &providers).await;

    assert_eq!(results[0].provider_id, "slow");
    assert_eq!(results[1].provider_id, "fast");
    assert_eq!(results[0].status, Status::Success);
    assert_eq!(results[1].status, Status::Success);
}

#[tokio::test]
async fn test_dispatch_respects_the_global_deadline() {
    let providers: Vec<Arc<dyn Provider>> = (0..4)
        .map(|i| {
            arc(ScriptedProvider::new(
                &format!("hang-{i}"),
                QueryKind::Username,
                Script::Hang,
            ))
        })
        .collect();

    let dispatcher = Dispatcher::new(Duration::from_millis(200));
    let query = Query::new(QueryKind::Username, "octocat");

    let started = Instant::now();
    let results = dispatcher.dispatch(&query, &providers).await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.status == Status::Timeout));
}

#[tokio::test]
async fn test_panicking_provider_does_not_poison_neighbors() {
    let providers: Vec<Arc<dyn Provider>> = vec![
        arc(ScriptedProvider::new(
            "boom",
            QueryKind::Username,
            Script::Panic,
        )),
        arc(ScriptedProvider::new(
            "fine",
            QueryKind::Username,
            Script::Succeed(platform_payload("Fine")),
        )),
    ];

    let dispatcher = Dispatcher::new(Duration::from_secs(2));
    let query = Query::new(QueryKind::Username, "octocat");
    let results = dispatcher.dispatch(&query, &providers).await;

    assert_eq!(results[0].status, Status::Error);
    assert_eq!(results[1].status, Status::Success);
}

#[tokio::test]
async fn test_transient_failures_are_retried_and_fatal_ones_are_not() {
    let flaky = ScriptedProvider::new(
        "flaky",
        QueryKind::Username,
        Script::FailThenSucceed(platform_payload("Flaky")),
    )
    .with_retries(2);
    let flaky_attempts = flaky.attempt_counter();

    let broken =
        ScriptedProvider::new("broken", QueryKind::Username, Script::Fail("401".to_string()))
            .with_retries(2);
    let broken_attempts = broken.attempt_counter();

    let providers: Vec<Arc<dyn Provider>> = vec![arc(flaky), arc(broken)];
    let dispatcher =
        Dispatcher::new(Duration::from_secs(2)).with_backoff_base(Duration::from_millis(10));
    let query = Query::new(QueryKind::Username, "octocat");
    let results = dispatcher.dispatch(&query, &providers).await;

    assert_eq!(results[0].status, Status::Success);
    assert_eq!(flaky_attempts.load(Ordering::SeqCst), 2);

    assert_eq!(results[1].status, Status::Error);
    assert_eq!(broken_attempts.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Service scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_email_scan_scores_the_known_breach_corpus() {
    // Two breaches, 5,000 exposed records, one password class: 45 / MEDIUM.
    let registry = RegistryBuilder::default()
        .register(ScriptedProvider::new(
            "breach-a",
            QueryKind::Email,
            Script::Succeed(breach_payload("AlphaLeak", 3_000, &[
                "Email addresses",
                "Passwords",
            ])),
        ))
        .register(ScriptedProvider::new(
            "breach-b",
            QueryKind::Email,
            Script::Succeed(breach_payload("BetaLeak", 2_000, &["Email addresses"])),
        ))
        .build();

    let dir = tempfile::tempdir().unwrap();
    let service = test_service(registry, dir.path());

    let response = service.scan_email("victim@gmail.com").await.unwrap();
    assert_eq!(response.domain, "gmail.com");
    assert_eq!(response.breach_data.breach_count, 2);
    assert_eq!(response.breach_data.risk_score, 45);
    assert_eq!(response.breach_data.risk_level, RiskLevel::Medium);
    assert!(response.email_reputation.free_provider);
    assert!(!response.email_reputation.disposable);
    assert!(!response.recommendations.is_empty());
}

#[tokio::test]
async fn test_ip_lookup_with_fixture_providers() {
    let registry = RegistryBuilder::default()
        .register(GeoFixtureProvider::new())
        .register(BlocklistProvider::new())
        .build();

    let dir = tempfile::tempdir().unwrap();
    let service = test_service(registry, dir.path());

    let response = service.lookup_ip("8.8.8.8").await.unwrap();
    let geo = response.geolocation.expect("geolocation present");
    assert_eq!(geo.country, "US");
    assert_eq!(geo.city, "Mountain View");
    assert!(!response.threat_intelligence.blacklisted);
    assert_eq!(response.statistics.found, 2);
}

#[tokio::test]
async fn test_whois_lookup_with_fixture_providers() {
    let registry = RegistryBuilder::default()
        .register(WhoisFixtureProvider::new())
        .register(DnsFixtureProvider::new())
        .build();

    let dir = tempfile::tempdir().unwrap();
    let service = test_service(registry, dir.path());

    let response = service.lookup_whois("example.com").await.unwrap();
    let whois = response.whois.expect("whois record present");
    assert_eq!(whois.domain_name, "EXAMPLE.COM");
    assert_eq!(whois.registrar.as_deref(), Some("GoDaddy.com, LLC"));
    assert_eq!(response.dns_records.ns, vec![
        "ns1.example.com".to_string(),
        "ns2.example.com".to_string(),
    ]);
    assert_eq!(response.statistics.found, 2);
}

#[tokio::test]
async fn test_username_lookup_reports_found_platforms() {
    let registry = RegistryBuilder::default()
        .register(ScriptedProvider::new(
            "platform-github",
            QueryKind::Username,
            Script::Succeed(platform_payload("GitHub")),
        ))
        .register(ScriptedProvider::new(
            "platform-reddit",
            QueryKind::Username,
            Script::NotFound,
        ))
        .build();

    let dir = tempfile::tempdir().unwrap();
    let service = test_service(registry, dir.path());

    let response = service.lookup_username("octocat").await.unwrap();
    assert_eq!(response.total_platforms, 2);
    assert_eq!(response.found_on, vec!["GitHub".to_string()]);
    assert_eq!(response.statistics.found, 1);
    assert_eq!(response.statistics.not_found, 1);
    assert_eq!(response.risk_score, 5);

    // Both probed platforms appear, with the miss carried as exists:false.
    assert_eq!(response.platforms.len(), 2);
    let reddit = response
        .platforms
        .iter()
        .find(|p| p.platform == "Reddit")
        .expect("missing platform still listed");
    assert!(!reddit.exists);
    assert!(reddit.url.is_none());
    let github = response
        .platforms
        .iter()
        .find(|p| p.platform == "GitHub")
        .expect("found platform listed");
    assert!(github.exists);

    // The dashboard reads these fields off the top of the response body.
    let body = serde_json::to_value(&response).unwrap();
    assert!(body.get("total_platforms").is_some());
    assert!(body.get("statistics").is_some());
    assert!(body.get("platforms").is_some());
}

#[tokio::test]
async fn test_history_records_lookups_and_clears() {
    let registry = RegistryBuilder::default()
        .register(GeoFixtureProvider::new())
        .register(BlocklistProvider::new())
        .build();

    let dir = tempfile::tempdir().unwrap();
    let service = test_service(registry, dir.path());

    service.lookup_ip("8.8.8.8").await.unwrap();
    service.lookup_ip("1.1.1.1").await.unwrap();
    service.lookup_ip("9.9.9.9").await.unwrap();

    let entries = service.history().await;
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].query, "8.8.8.8");
    assert_eq!(entries[2].query, "9.9.9.9");

    service.clear_history().await.unwrap();
    assert!(service.history().await.is_empty());
}

#[tokio::test]
async fn test_report_round_trip_preserves_payload_bytes() {
    let registry = RegistryBuilder::default().build();
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(registry, dir.path());

    let payload = json!({
        "target": "octocat",
        "statistics": {"found": 12, "not_found": 5, "errors": 3},
        "risk_level": "MEDIUM",
    });

    let generated = service
        .generate_report("Username sweep", &payload, "weekly check")
        .unwrap();
    assert!(generated.download_url.ends_with(&generated.locator));

    let fetched = service.fetch_report(&generated.locator).unwrap();
    assert_eq!(
        serde_json::to_vec(&fetched.payload).unwrap(),
        serde_json::to_vec(&payload).unwrap()
    );
    assert_eq!(fetched.title, "Username sweep");
}

#[tokio::test]
async fn test_invalid_report_locator_is_rejected() {
    let registry = RegistryBuilder::default().build();
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(registry, dir.path());

    let err = service.fetch_report("../../etc/passwd").unwrap_err();
    assert!(matches!(
        err,
        OsintError::Report(godeye::error::ReportError::InvalidLocator(_))
    ));
}

#[tokio::test]
async fn test_validation_rejects_bad_targets_before_dispatch() {
    let registry = RegistryBuilder::default().build();
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(registry, dir.path());

    assert!(matches!(
        service.lookup_username("").await.unwrap_err(),
        OsintError::Validation(_)
    ));
    assert!(matches!(
        service.scan_email("not-an-email").await.unwrap_err(),
        OsintError::Validation(_)
    ));
    assert!(matches!(
        service.scan_domain("no-tld").await.unwrap_err(),
        OsintError::Validation(_)
    ));
    assert!(matches!(
        service.lookup_ip("999.1.1.1").await.unwrap_err(),
        OsintError::Validation(_)
    ));
}
