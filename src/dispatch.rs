//! Fan-out dispatcher
//!
//! One dispatch issues one concurrent call per registered provider, bounded
//! by `min(provider timeout, remaining global deadline)` per call and by the
//! global deadline overall. The output list preserves registry order (each
//! provider writes only its own slot), timeouts are terminal for an attempt,
//! transient failures are retried with doubling backoff, and a panicking
//! provider is isolated on its own task.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ProviderError;
use crate::model::{ProviderResult, Query, Status};
use crate::providers::Provider;

/// Issues concurrent provider calls for one query
#[derive(Debug, Clone)]
pub struct Dispatcher {
    global_deadline: Duration,
    max_concurrency: Option<usize>,
    backoff_base: Duration,
}

impl Dispatcher {
    pub fn new(global_deadline: Duration) -> Self {
        Self {
            global_deadline,
            max_concurrency: None,
            backoff_base: Duration::from_millis(250),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            global_deadline: config.global_deadline,
            max_concurrency: config.max_concurrency,
            backoff_base: config.backoff_base,
        }
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Fan out one query to the given providers
    ///
    /// Never blocks past the global deadline: any call still outstanding when
    /// it expires is aborted and recorded as [`Status::Timeout`], and the
    /// dispatch proceeds with the partial set.
    pub async fn dispatch(
        &self,
        query: &Query,
        providers: &[Arc<dyn Provider>],
    ) -> Vec<ProviderResult> {
        let total = providers.len();
        if total == 0 {
            return Vec::new();
        }

        let deadline = Instant::now() + self.global_deadline;
        let semaphore = self
            .max_concurrency
            .map(|limit| Arc::new(Semaphore::new(limit)));

        let mut tasks: JoinSet<(usize, ProviderResult)> = JoinSet::new();
        for (slot, provider) in providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let target = query.target.clone();
            let semaphore = semaphore.clone();
            let backoff_base = self.backoff_base;

            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(s) => s.acquire_owned().await.ok(),
                    None => None,
                };
                let result = run_provider(provider, &target, deadline, backoff_base).await;
                (slot, result)
            });
        }

        let mut slots: Vec<Option<ProviderResult>> = (0..total).map(|_| None).collect();
        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((slot, result)))) => slots[slot] = Some(result),
                Ok(Some(Err(join_error))) => {
                    // The unfilled slot is marked as a timeout below.
                    warn!("provider task did not complete: {join_error}");
                }
                Ok(None) => break,
                Err(_) => {
                    tasks.abort_all();
                    break;
                }
            }
        }

        providers
            .iter()
            .zip(slots)
            .map(|(provider, slot)| {
                slot.unwrap_or_else(|| {
                    debug!(provider = provider.id(), "outstanding at global deadline");
                    ProviderResult::new(provider.id(), Status::Timeout, self.global_deadline)
                })
            })
            .collect()
    }
}

/// Drive one provider to a terminal state
async fn run_provider(
    provider: Arc<dyn Provider>,
    target: &str,
    deadline: Instant,
    backoff_base: Duration,
) -> ProviderResult {
    let started = Instant::now();
    let id = provider.id().to_string();
    let max_retries = provider.max_retries();
    let per_call = provider.timeout();
    let mut attempt: u32 = 0;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return ProviderResult::new(&id, Status::Timeout, started.elapsed());
        }
        let budget = per_call.min(remaining);

        // The call runs on its own task so a panicking provider cannot take
        // the rest of the dispatch down with it.
        let mut call = {
            let provider = Arc::clone(&provider);
            let target = target.to_string();
            tokio::spawn(async move { provider.query(&target).await })
        };

        match timeout(budget, &mut call).await {
            Err(_) => {
                call.abort();
                return ProviderResult::new(&id, Status::Timeout, started.elapsed());
            }
            Ok(Err(join_error)) => {
                if join_error.is_panic() {
                    warn!(provider = %id, "provider panicked");
                }
                return ProviderResult::new(&id, Status::Error, started.elapsed());
            }
            Ok(Ok(Ok(payload))) => {
                return ProviderResult::new(&id, Status::Success, started.elapsed())
                    .with_payload(payload);
            }
            Ok(Ok(Err(ProviderError::NotFound))) => {
                return ProviderResult::new(&id, Status::NotFound, started.elapsed());
            }
            Ok(Ok(Err(ProviderError::Fatal(message)))) => {
                debug!(provider = %id, %message, "provider failed");
                return ProviderResult::new(&id, Status::Error, started.elapsed());
            }
            Ok(Ok(Err(ProviderError::Transient(message)))) => {
                if attempt >= max_retries {
                    debug!(provider = %id, %message, "retries exhausted");
                    return ProviderResult::new(&id, Status::Error, started.elapsed());
                }
                let delay = backoff_delay(backoff_base, attempt)
                    .min(deadline.saturating_duration_since(Instant::now()));
                debug!(provider = %id, attempt, ?delay, %message, "backing off");
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Base delay doubling per attempt, with a little jitter to spread retries
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let doubled = base.saturating_mul(1u32 << attempt.min(16));
    doubled + Duration::from_millis(rand::thread_rng().gen_range(0..=25))
}
