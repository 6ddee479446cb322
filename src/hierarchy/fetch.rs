//! Bounded, cancellable fan-out over independent store fetches.
//!
//! ## Guarantees
//!
//! - At most `max_parallelism` fetches hold a permit at any time; the rest
//!   wait on the semaphore instead of running serially behind each other.
//! - Each fetch gets its own deadline; one failure never aborts siblings.
//! - Cancellation aborts every pending fetch and waits for the aborted
//!   tasks to be reaped before returning, so no fetch outlives the call.
//! - Dropping the returned future instead only aborts: `JoinSet` cancels the
//!   tasks but nothing waits for them. Callers that need the reaping
//!   guarantee pass their token down rather than racing the fan-out.
//! - Results are keyed in a `BTreeMap`, so completion order never leaks
//!   into the outcome.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::KernelConfig;
use crate::error::{HierarchyError, Stage};
use crate::store::StoreError;

/// Outcome of a fan-out: one result per distinct key.
pub type FanOutResults<K, V> = BTreeMap<K, Result<V, HierarchyError>>;

/// Concurrency backbone shared by the LCA finder and similarity engine.
#[derive(Debug, Clone)]
pub struct FetchOrchestrator {
    max_parallelism: usize,
    fetch_timeout: Duration,
}

impl FetchOrchestrator {
    /// Create an orchestrator. Parallelism below 1 is raised to 1.
    pub fn new(max_parallelism: usize, fetch_timeout: Duration) -> Self {
        Self {
            max_parallelism: max_parallelism.max(1),
            fetch_timeout,
        }
    }

    /// Create an orchestrator from kernel configuration.
    pub fn from_config(config: &KernelConfig) -> Self {
        Self::new(config.max_parallelism, config.fetch_timeout())
    }

    /// Maximum concurrent fetches.
    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    /// Run `fetch` for every distinct key.
    ///
    /// Returns `Err(Cancelled)` and no partial results if `cancel` fires
    /// before every fetch has finished.
    pub async fn fan_out<K, V, F, Fut>(
        &self,
        stage: Stage,
        keys: impl IntoIterator<Item = K>,
        cancel: &CancellationToken,
        fetch: F,
    ) -> Result<FanOutResults<K, V>, HierarchyError>
    where
        K: Ord + Clone + fmt::Display + Send + 'static,
        V: Send + 'static,
        F: Fn(K) -> Fut,
        Fut: Future<Output = Result<V, HierarchyError>> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(HierarchyError::Cancelled);
        }

        let keys: BTreeSet<K> = keys.into_iter().collect();
        let semaphore = Arc::new(Semaphore::new(self.max_parallelism));
        let timeout = self.fetch_timeout;
        let timeout_ms = timeout.as_millis() as u64;

        // A key whose task dies without reporting keeps this placeholder.
        let mut results: FanOutResults<K, V> = keys
            .iter()
            .map(|k| {
                let lost = HierarchyError::Upstream {
                    stage,
                    target: k.to_string(),
                    message: "fetch task terminated without a result".to_string(),
                };
                (k.clone(), Err(lost))
            })
            .collect();

        let mut tasks = JoinSet::new();
        for key in keys {
            let fut = fetch(key.clone());
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        let outcome = match tokio::time::timeout(timeout, fut).await {
                            Ok(result) => result,
                            Err(_) => Err(HierarchyError::UpstreamTimeout {
                                stage,
                                target: key.to_string(),
                                timeout_ms,
                            }),
                        };
                        drop(permit);
                        outcome
                    }
                    Err(_) => Err(HierarchyError::Cancelled),
                };
                (key, outcome)
            });
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    tracing::debug!(%stage, "Fan-out cancelled, pending fetches aborted");
                    return Err(HierarchyError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((key, outcome))) => {
                        results.insert(key, outcome);
                    }
                    Some(Err(join_err)) => {
                        tracing::warn!(%stage, error = %join_err, "Fetch task failed to complete");
                    }
                },
            }
        }

        Ok(results)
    }
}

/// Take one key's outcome from a fan-out.
pub fn lookup<K, V>(results: &FanOutResults<K, V>, key: &K, stage: Stage) -> Result<V, HierarchyError>
where
    K: Ord + fmt::Display,
    V: Clone,
{
    match results.get(key) {
        Some(Ok(value)) => Ok(value.clone()),
        Some(Err(e)) => Err(e.clone()),
        None => Err(HierarchyError::Upstream {
            stage,
            target: key.to_string(),
            message: "no fetch was scheduled for this key".to_string(),
        }),
    }
}

/// The two arguments in ascending order.
///
/// Pairwise operations inspect their operands in this order so that the
/// outcome, errors included, does not depend on argument order.
pub fn ordered_pair<'a, T: Ord>(a: &'a T, b: &'a T) -> (&'a T, &'a T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Run `fut` unless `cancel` fires first.
///
/// Losing the race drops `fut`, which aborts any fan-out it owns.
pub async fn cancellable<T, Fut>(cancel: &CancellationToken, fut: Fut) -> Result<T, HierarchyError>
where
    Fut: Future<Output = Result<T, HierarchyError>>,
{
    if cancel.is_cancelled() {
        return Err(HierarchyError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HierarchyError::Cancelled),
        result = fut => result,
    }
}

/// Await one store call under a deadline and classify its failure.
pub(crate) async fn call_store<T, E, Fut>(
    stage: Stage,
    target: impl fmt::Display,
    timeout: Duration,
    fut: Fut,
) -> Result<T, HierarchyError>
where
    E: StoreError,
    Fut: Future<Output = Result<T, E>>,
{
    let timeout_ms = timeout.as_millis() as u64;
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) if e.is_timeout() => Err(HierarchyError::UpstreamTimeout {
            stage,
            target: target.to_string(),
            timeout_ms,
        }),
        Ok(Err(e)) => Err(HierarchyError::upstream(stage, target, e)),
        Err(_) => Err(HierarchyError::UpstreamTimeout {
            stage,
            target: target.to_string(),
            timeout_ms,
        }),
    }
}
