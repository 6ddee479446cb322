//! Service middleware for metrics and request tracking.
//!
//! Every request carries a [`RequestId`]: the caller's `X-Request-Id` when
//! present, otherwise a fresh UUID. It is echoed back in the response header
//! and attached to error bodies as `correlation_id`.
//!
//! ## Metrics Exposed
//!
//! - `request_metric` - request count and latency by path pattern, method, status
//! - `similarity_metric` - Wu-Palmer score and contributing depths
//! - `error_metric` - error responses by error code

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

/// Header carrying the request correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation ID of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// The ID already attached to `request`, else its `X-Request-Id`
    /// header, else a fresh UUID.
    pub fn of(request: &Request) -> Self {
        if let Some(existing) = request.extensions().get::<RequestId>() {
            return existing.clone();
        }
        let supplied = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        match supplied {
            Some(id) => Self(id.to_string()),
            None => Self(uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Borrow the raw ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attach a [`RequestId`] to the request and echo it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = RequestId::of(&request);
    request.extensions_mut().insert(id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Metrics middleware that records request counts and latency.
///
/// Uses tracing events; aggregate them from logs.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "taxonomy_kernel::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces concept identifiers (`C0000001`-style) with `:cui` and the code
/// of `/api/codes/{sab}/{code}` with `:code`.
pub(crate) fn normalize_path(path: &str) -> String {
    static CUI: OnceLock<Option<regex_lite::Regex>> = OnceLock::new();
    static CODE: OnceLock<Option<regex_lite::Regex>> = OnceLock::new();
    let cui = CUI.get_or_init(|| regex_lite::Regex::new(r"/C\d+(/|$)").ok());
    let code = CODE.get_or_init(|| regex_lite::Regex::new(r"^/api/codes/([^/]+)/[^/]+").ok());

    let path = match code {
        Some(re) => re.replace(path, "/api/codes/$1/:code").into_owned(),
        None => path.to_string(),
    };

    match cui {
        // Two passes so adjacent identifiers (`/C1/C2`) share no separator.
        Some(re) => {
            let once = re.replace_all(&path, "/:cui$1");
            re.replace_all(&once, "/:cui$1").into_owned()
        }
        None => path,
    }
}

/// Record a computed similarity.
pub fn record_similarity_metrics(score: f64, depth_lca: u32, latency_ms: u64) {
    info!(
        target: "taxonomy_kernel::metrics",
        metric_type = "similarity",
        score = score,
        depth_lca = depth_lca,
        latency_ms = latency_ms,
        "similarity_metric"
    );
}

/// Record an error response by code.
pub fn record_error(code: &str, retryable: bool) {
    info!(
        target: "taxonomy_kernel::metrics",
        metric_type = "error",
        code = code,
        retryable = retryable,
        "error_metric"
    );
}
