//! Service state management.
//!
//! Holds the shared kernel and the whole-request deadline.

use std::sync::Arc;
use std::time::Duration;

use crate::config::KernelConfig;
use crate::hierarchy::TaxonomyKernel;
use crate::store::ConceptStore;

/// Default whole-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

/// Shared service state.
pub struct ServiceState<S: ConceptStore + 'static> {
    /// The kernel answering hierarchy queries.
    pub kernel: Arc<TaxonomyKernel<S>>,
    /// Deadline for a single request, after which its fetches are cancelled.
    pub request_timeout: Duration,
}

impl<S: ConceptStore + 'static> ServiceState<S> {
    /// Create service state around a store and kernel configuration.
    pub fn new(store: S, config: KernelConfig, request_timeout: Duration) -> Self {
        Self {
            kernel: Arc::new(TaxonomyKernel::new(Arc::new(store), config)),
            request_timeout,
        }
    }
}

impl<S: ConceptStore + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            kernel: Arc::clone(&self.kernel),
            request_timeout: self.request_timeout,
        }
    }
}

/// Read `REQUEST_TIMEOUT_SECS`, falling back to the default on absent or
/// invalid values.
pub fn request_timeout_from_env() -> Duration {
    let secs = match std::env::var("REQUEST_TIMEOUT_SECS") {
        Ok(raw) => parse_timeout_secs(&raw).unwrap_or_else(|| {
            tracing::warn!(value = %raw, "Invalid REQUEST_TIMEOUT_SECS, using default");
            DEFAULT_REQUEST_TIMEOUT_SECS
        }),
        Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
    };
    Duration::from_secs(secs)
}

fn parse_timeout_secs(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|secs| *secs > 0)
}
