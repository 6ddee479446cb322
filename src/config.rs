//! Kernel configuration.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `KERNEL_MAX_PARALLELISM`: Concurrent store fetches per fan-out (default: 8)
//! - `KERNEL_FETCH_TIMEOUT_MS`: Deadline per store call (default: 30000)
//! - `KERNEL_CACHE_ENABLED`: Memoize paths and ancestor sets (default: true)
//! - `KERNEL_CACHE_ENTRIES`: LRU capacity per cache (default: 10000)
//! - `KERNEL_DEPTH_FALLBACK`: `zero` or `propagate` (default: zero)
//! - `KERNEL_PATH_SEPARATOR`: Atom separator in raw paths (default: `.`)

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::canonical::canonical_hash_hex;
use crate::types::PATH_SEPARATOR;

/// Configuration for the memoization caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries per cache.
    pub max_entries: usize,
    /// Whether to enable the caches.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            enabled: true,
        }
    }
}

/// What the LCA finder does when a candidate's depth fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthFallback {
    /// Rank the candidate as depth 0 and keep going.
    #[default]
    Zero,
    /// Fail the whole LCA computation with the candidate's error.
    Propagate,
}

impl DepthFallback {
    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "zero" => Some(Self::Zero),
            "propagate" => Some(Self::Propagate),
            _ => None,
        }
    }
}

/// Configuration for [`TaxonomyKernel`](crate::TaxonomyKernel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Maximum concurrent store fetches within one fan-out.
    pub max_parallelism: usize,
    /// Deadline for a single store call, in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Cache settings.
    pub cache: CacheConfig,
    /// Policy for failed LCA candidate depth fetches.
    pub depth_fallback: DepthFallback,
    /// Separator between atom IDs in raw paths.
    pub path_separator: char,
}

impl KernelConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_parallelism: std::env::var("KERNEL_MAX_PARALLELISM")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_parallelism),
            fetch_timeout_ms: std::env::var("KERNEL_FETCH_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.fetch_timeout_ms),
            cache: CacheConfig {
                max_entries: std::env::var("KERNEL_CACHE_ENTRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.cache.max_entries),
                enabled: std::env::var("KERNEL_CACHE_ENABLED")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.cache.enabled),
            },
            depth_fallback: std::env::var("KERNEL_DEPTH_FALLBACK")
                .ok()
                .and_then(|s| DepthFallback::from_str(&s))
                .unwrap_or(defaults.depth_fallback),
            path_separator: std::env::var("KERNEL_PATH_SEPARATOR")
                .ok()
                .and_then(|s| s.chars().next())
                .unwrap_or(defaults.path_separator),
        }
    }

    /// Per-call store deadline.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Stable fingerprint of these settings.
    pub fn fingerprint(&self) -> String {
        canonical_hash_hex(self)
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_parallelism: 8,
            fetch_timeout_ms: 30_000,
            cache: CacheConfig::default(),
            depth_fallback: DepthFallback::Zero,
            path_separator: PATH_SEPARATOR,
        }
    }
}
