//! Axum routes for the Taxonomy Kernel service.

use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::TAXONOMY_KERNEL_SCHEMA_VERSION;
use crate::error::{HierarchyError, Stage};
use crate::hierarchy::KernelCacheStats;
use crate::store::ConceptStore;
use crate::types::{CodeMapping, CodeTranslation, ConceptId, Depth, LcaResult, Similarity};

use super::middleware::{record_error, record_similarity_metrics, request_id_middleware, RequestId};
use super::state::ServiceState;

/// Shared state handed to every handler.
pub type AppState<S> = Arc<ServiceState<S>>;


// ============================================================================
// Request/Response Types
// ============================================================================

/// Concept record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptResponse {
    pub cui: String,
    pub name: String,
}

/// Ancestors of a concept, sorted by ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncestorsResponse {
    pub cui: String,
    pub ancestors: Vec<String>,
}

/// Depth of a concept. `depth` is absent when no hierarchy path exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthResponse {
    pub cui: String,
    pub depth: Option<u32>,
    pub found: bool,
}

impl DepthResponse {
    fn new(cui: &ConceptId, depth: Depth) -> Self {
        Self {
            cui: cui.to_string(),
            depth: depth.value(),
            found: depth.is_known(),
        }
    }
}

/// Source-vocabulary codes of a concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeMapResponse {
    pub cui: String,
    pub mappings: Vec<CodeMapping>,
}

/// Concept owning a source-vocabulary code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeLookupResponse {
    pub source: String,
    pub code: String,
    pub cui: String,
}

/// Codes of a concept in one source vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCodesResponse {
    pub cui: String,
    pub source: String,
    pub codes: Vec<CodeMapping>,
}

/// A code translated into another vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub source: String,
    pub code: String,
    pub cui: String,
    pub target: String,
    pub codes: Vec<CodeMapping>,
}

impl From<CodeTranslation> for TranslationResponse {
    fn from(t: CodeTranslation) -> Self {
        Self {
            source: t.source,
            code: t.code,
            cui: t.concept.to_string(),
            target: t.target,
            codes: t.mappings,
        }
    }
}

/// Lowest common ancestor of a pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LcaResponse {
    pub cui1: String,
    pub cui2: String,
    pub lca: String,
    pub depth: u32,
}

impl From<LcaResult> for LcaResponse {
    fn from(result: LcaResult) -> Self {
        Self {
            cui1: result.concept1.to_string(),
            cui2: result.concept2.to_string(),
            lca: result.lca.to_string(),
            depth: result.depth,
        }
    }
}

/// Wu-Palmer similarity of a pair with its contributing depths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResponse {
    pub cui1: String,
    pub cui2: String,
    pub lca: String,
    pub depth_c1: u32,
    pub depth_c2: u32,
    pub depth_lca: u32,
    pub similarity: f64,
}

impl From<Similarity> for SimilarityResponse {
    fn from(sim: Similarity) -> Self {
        Self {
            cui1: sim.concept1.to_string(),
            cui2: sim.concept2.to_string(),
            lca: sim.lca.to_string(),
            depth_c1: sim.depth_c1,
            depth_c2: sim.depth_c2,
            depth_lca: sim.depth_lca,
            similarity: sim.score,
        }
    }
}

/// One pair of a batch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptPair {
    pub cui1: String,
    pub cui2: String,
}

/// Request to score multiple pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSimilarityRequest {
    pub pairs: Vec<ConceptPair>,
}

/// Batch similarity response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSimilarityResponse {
    /// Scored pairs, in request order.
    pub results: Vec<SimilarityResponse>,
    /// Number of successfully scored pairs.
    pub success_count: usize,
    /// Pairs that failed.
    pub errors: Vec<PairError>,
}

/// Failure for one pair of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairError {
    pub cui1: String,
    pub cui2: String,
    pub code: String,
    pub error: String,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub schema_version: String,
    /// xxh64 fingerprint of the active kernel configuration.
    pub config_fingerprint: String,
    pub database_connected: bool,
    pub cache: KernelCacheStats,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub database: bool,
    pub details: Option<String>,
}

/// Structured error response with correlation ID for tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Whether the caller may retry.
    pub retryable: bool,
    /// Correlation ID for request tracing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            retryable: false,
            correlation_id: None,
            details: None,
        }
    }

    /// Add a correlation ID to the error.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<&HierarchyError> for ErrorResponse {
    fn from(err: &HierarchyError) -> Self {
        let mut response = Self::new(err.code(), err.to_string());
        response.retryable = err.is_retryable();
        response
    }
}

/// HTTP status for a hierarchy error.
pub fn status_for(err: &HierarchyError) -> StatusCode {
    match err {
        HierarchyError::UnknownConcept(_)
        | HierarchyError::UnknownCode { .. }
        | HierarchyError::NoCommonAncestor(..) => StatusCode::NOT_FOUND,
        HierarchyError::InvalidDepth { .. } => StatusCode::BAD_REQUEST,
        HierarchyError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        HierarchyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        HierarchyError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Error half of every handler result.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, body: ErrorResponse, request_id: &RequestId) -> Self {
        Self {
            status,
            body: body.with_correlation_id(request_id.as_str()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(
                code = %self.body.code,
                error = %self.body.error,
                correlation_id = ?self.body.correlation_id,
                "Request failed"
            );
        } else {
            tracing::debug!(
                code = %self.body.code,
                error = %self.body.error,
                correlation_id = ?self.body.correlation_id,
                "Request rejected"
            );
        }
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(err: HierarchyError, request_id: &RequestId) -> ApiError {
    record_error(err.code(), err.is_retryable());
    ApiError::new(status_for(&err), ErrorResponse::from(&err), request_id)
}

fn concept_id(raw: &str) -> Option<ConceptId> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| ConceptId::new(trimmed))
}

fn parse_cui(raw: &str, request_id: &RequestId) -> Result<ConceptId, ApiError> {
    concept_id(raw).ok_or_else(|| {
        record_error("INVALID_CONCEPT_ID", false);
        ApiError::new(
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("INVALID_CONCEPT_ID", "Concept ID must not be empty")
                .with_details(raw.to_string()),
            request_id,
        )
    })
}

// ============================================================================
// Request Scope
// ============================================================================

/// Cancellation scope of one request.
///
/// The token is cancelled when the scope is dropped, which happens when the
/// client disconnects and axum drops the handler future.
struct RequestScope {
    token: CancellationToken,
    _guard: DropGuard,
}

impl RequestScope {
    fn new() -> Self {
        let token = CancellationToken::new();
        let guard = token.clone().drop_guard();
        Self { token, _guard: guard }
    }

    /// Run `fut` under the request deadline; on expiry the token is
    /// cancelled so in-flight fetches stop.
    async fn run<T, Fut>(&self, deadline: Duration, fut: Fut) -> Result<T, HierarchyError>
    where
        Fut: Future<Output = Result<T, HierarchyError>>,
    {
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                self.token.cancel();
                Err(HierarchyError::UpstreamTimeout {
                    stage: Stage::Request,
                    target: "request".to_string(),
                    timeout_ms: deadline.as_millis() as u64,
                })
            }
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Concept record.
async fn concept_handler<S: ConceptStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(request_id): Extension<RequestId>,
    Path(cui): Path<String>,
) -> Result<Json<ConceptResponse>, ApiError> {
    let id = parse_cui(&cui, &request_id)?;
    let scope = RequestScope::new();
    let concept = scope
        .run(state.request_timeout, state.kernel.get_concept(&id, &scope.token))
        .await
        .map_err(|e| api_error(e, &request_id))?;

    Ok(Json(ConceptResponse {
        cui: concept.id.to_string(),
        name: concept.name,
    }))
}

/// Ancestor list of a concept.
async fn ancestors_handler<S: ConceptStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(request_id): Extension<RequestId>,
    Path(cui): Path<String>,
) -> Result<Json<AncestorsResponse>, ApiError> {
    let id = parse_cui(&cui, &request_id)?;
    let scope = RequestScope::new();
    let ancestors = scope
        .run(state.request_timeout, state.kernel.get_ancestors(&id, &scope.token))
        .await
        .map_err(|e| api_error(e, &request_id))?;

    Ok(Json(AncestorsResponse {
        cui: id.to_string(),
        ancestors: ancestors.into_iter().map(|a| a.to_string()).collect(),
    }))
}

/// Depth of a concept.
async fn depth_handler<S: ConceptStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(request_id): Extension<RequestId>,
    Path(cui): Path<String>,
) -> Result<Json<DepthResponse>, ApiError> {
    let id = parse_cui(&cui, &request_id)?;
    let scope = RequestScope::new();
    let depth = scope
        .run(state.request_timeout, state.kernel.get_depth(&id, &scope.token))
        .await
        .map_err(|e| api_error(e, &request_id))?;

    Ok(Json(DepthResponse::new(&id, depth)))
}

/// Source-vocabulary codes of a concept.
async fn code_map_handler<S: ConceptStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(request_id): Extension<RequestId>,
    Path(cui): Path<String>,
) -> Result<Json<CodeMapResponse>, ApiError> {
    let id = parse_cui(&cui, &request_id)?;
    let scope = RequestScope::new();
    let mappings = scope
        .run(state.request_timeout, state.kernel.get_code_mappings(&id, &scope.token))
        .await
        .map_err(|e| api_error(e, &request_id))?;

    Ok(Json(CodeMapResponse {
        cui: id.to_string(),
        mappings,
    }))
}

/// Codes of a concept in one source vocabulary.
async fn source_codes_handler<S: ConceptStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(request_id): Extension<RequestId>,
    Path((cui, sab)): Path<(String, String)>,
) -> Result<Json<SourceCodesResponse>, ApiError> {
    let id = parse_cui(&cui, &request_id)?;
    let scope = RequestScope::new();
    let codes = scope
        .run(state.request_timeout, state.kernel.get_source_codes(&id, &sab, &scope.token))
        .await
        .map_err(|e| api_error(e, &request_id))?;

    Ok(Json(SourceCodesResponse {
        cui: id.to_string(),
        source: sab,
        codes,
    }))
}

/// Concept owning a source-vocabulary code.
async fn code_lookup_handler<S: ConceptStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(request_id): Extension<RequestId>,
    Path((sab, code)): Path<(String, String)>,
) -> Result<Json<CodeLookupResponse>, ApiError> {
    let scope = RequestScope::new();
    let concept = scope
        .run(state.request_timeout, state.kernel.find_concept_by_code(&sab, &code, &scope.token))
        .await
        .map_err(|e| api_error(e, &request_id))?;

    Ok(Json(CodeLookupResponse {
        source: sab,
        code,
        cui: concept.to_string(),
    }))
}

/// Translate a code into another source vocabulary.
async fn translate_handler<S: ConceptStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(request_id): Extension<RequestId>,
    Path((sab, code, target)): Path<(String, String, String)>,
) -> Result<Json<TranslationResponse>, ApiError> {
    let scope = RequestScope::new();
    let translation = scope
        .run(
            state.request_timeout,
            state.kernel.translate_code(&sab, &code, &target, &scope.token),
        )
        .await
        .map_err(|e| api_error(e, &request_id))?;

    Ok(Json(translation.into()))
}

/// Lowest common ancestor of two concepts.
async fn lca_handler<S: ConceptStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(request_id): Extension<RequestId>,
    Path((cui1, cui2)): Path<(String, String)>,
) -> Result<Json<LcaResponse>, ApiError> {
    let c1 = parse_cui(&cui1, &request_id)?;
    let c2 = parse_cui(&cui2, &request_id)?;
    let scope = RequestScope::new();
    let lca = scope
        .run(state.request_timeout, state.kernel.find_lca(&c1, &c2, &scope.token))
        .await
        .map_err(|e| api_error(e, &request_id))?;

    Ok(Json(lca.into()))
}

/// Wu-Palmer similarity of two concepts.
async fn wu_palmer_handler<S: ConceptStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(request_id): Extension<RequestId>,
    Path((cui1, cui2)): Path<(String, String)>,
) -> Result<Json<SimilarityResponse>, ApiError> {
    let c1 = parse_cui(&cui1, &request_id)?;
    let c2 = parse_cui(&cui2, &request_id)?;
    let start = Instant::now();
    let scope = RequestScope::new();
    let sim = scope
        .run(state.request_timeout, state.kernel.compute_similarity(&c1, &c2, &scope.token))
        .await
        .map_err(|e| api_error(e, &request_id))?;

    record_similarity_metrics(sim.score, sim.depth_lca, start.elapsed().as_millis() as u64);
    Ok(Json(sim.into()))
}

/// Score multiple pairs. Per-pair failures are reported, not fatal; only
/// the request deadline fails the whole batch.
async fn batch_similarity_handler<S: ConceptStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<BatchSimilarityRequest>,
) -> Result<Json<BatchSimilarityResponse>, ApiError> {
    let scope = RequestScope::new();
    let kernel = Arc::clone(&state.kernel);
    let token = scope.token.clone();

    let batch = async move {
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for pair in request.pairs {
            let scored = match (concept_id(&pair.cui1), concept_id(&pair.cui2)) {
                (Some(c1), Some(c2)) => kernel.compute_similarity(&c1, &c2, &token).await,
                _ => {
                    errors.push(PairError {
                        cui1: pair.cui1,
                        cui2: pair.cui2,
                        code: "INVALID_CONCEPT_ID".to_string(),
                        error: "Concept ID must not be empty".to_string(),
                    });
                    continue;
                }
            };

            match scored {
                Ok(sim) => results.push(SimilarityResponse::from(sim)),
                Err(HierarchyError::Cancelled) => return Err(HierarchyError::Cancelled),
                Err(e) => errors.push(PairError {
                    cui1: pair.cui1,
                    cui2: pair.cui2,
                    code: e.code().to_string(),
                    error: e.to_string(),
                }),
            }
        }

        Ok(BatchSimilarityResponse {
            success_count: results.len(),
            results,
            errors,
        })
    };

    let response = scope
        .run(state.request_timeout, batch)
        .await
        .map_err(|e| api_error(e, &request_id))?;

    Ok(Json(response))
}

/// Health check endpoint (detailed).
async fn health_handler<S: ConceptStore + 'static>(
    State(state): State<AppState<S>>,
) -> Json<HealthResponse> {
    let db_healthy = state.kernel.is_healthy().await;

    Json(HealthResponse {
        status: if db_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: TAXONOMY_KERNEL_SCHEMA_VERSION.to_string(),
        config_fingerprint: state.kernel.config().fingerprint(),
        database_connected: db_healthy,
        cache: state.kernel.cache_stats(),
    })
}

/// Liveness check endpoint.
///
/// Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness check endpoint.
///
/// Returns 200 if the concept store is reachable, 503 otherwise.
async fn readiness_handler<S: ConceptStore + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if state.kernel.is_healthy().await {
        Ok(Json(ReadinessResponse {
            ready: true,
            database: true,
            details: None,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                database: false,
                details: Some("Concept store unreachable".to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the Taxonomy Kernel service.
pub fn create_router<S: ConceptStore + 'static>(state: ServiceState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Single-concept queries
        .route("/api/concepts/:cui", get(concept_handler::<S>))
        .route("/api/concepts/:cui/ancestors", get(ancestors_handler::<S>))
        .route("/api/concepts/:cui/depth", get(depth_handler::<S>))
        .route("/api/concepts/:cui/code-map", get(code_map_handler::<S>))
        .route("/api/concepts/:cui/codes/:sab", get(source_codes_handler::<S>))
        // Code crosswalk
        .route("/api/codes/:sab/:code", get(code_lookup_handler::<S>))
        .route("/api/codes/:sab/:code/translate/:target", get(translate_handler::<S>))
        // Pairwise queries
        .route("/api/pairs/:cui1/:cui2/lca", get(lca_handler::<S>))
        .route("/api/pairs/:cui1/:cui2/similarity/wu-palmer", get(wu_palmer_handler::<S>))
        .route("/api/similarity/batch", post(batch_similarity_handler::<S>))
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::KernelConfig;
    use crate::service::REQUEST_ID_HEADER;
    use crate::store::InMemoryConceptStore;
    use crate::types::Atom;

    //       C1
    //      /  \
    //    C2    C3
    //    |
    //    C4
    //
    // C5 is known but has no hierarchy path.
    fn test_router() -> Router {
        let mut store = InMemoryConceptStore::new();
        for id in ["C1", "C2", "C3", "C4", "C5"] {
            store.add_simple_concept(id, &format!("Concept {}", id));
        }
        store.add_atom(Atom::new("A40", "C4", "ICD10", "E11", "Concept C4 (ICD)"));
        store.add_atom(Atom::new("A41", "C4", "SNOMEDCT_US", "44054006", "Concept C4 (SNOMED)"));
        store.add_atom(Atom::new("A30", "C3", "HPO", "HP:0000819", "Concept C3 (HPO)"));
        store.add_path("C1", "A1");
        store.add_path("C2", "A1.A2");
        store.add_path("C3", "A1.A3");
        store.add_path("C4", "A1.A2.A4");

        create_router(ServiceState::new(
            store,
            KernelConfig::default(),
            Duration::from_secs(5),
        ))
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, _, body) =
            send(router, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
        (status, body)
    }

    async fn send(
        router: Router,
        request: Request<Body>,
    ) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, request_id, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_concept_endpoint() {
        let (status, body) = get_json(test_router(), "/api/concepts/C2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cui"], "C2");
        assert_eq!(body["name"], "Concept C2");
    }

    #[tokio::test]
    async fn test_ancestors_endpoint() {
        let (status, body) = get_json(test_router(), "/api/concepts/C4/ancestors").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ancestors"], serde_json::json!(["C1", "C2"]));
    }

    #[tokio::test]
    async fn test_depth_endpoint() {
        let (status, body) = get_json(test_router(), "/api/concepts/C4/depth").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["depth"], 3);
        assert_eq!(body["found"], true);
    }

    #[tokio::test]
    async fn test_code_map_endpoint() {
        let (status, body) = get_json(test_router(), "/api/concepts/C4/code-map").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mappings"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_source_codes_endpoint() {
        let (status, body) = get_json(test_router(), "/api/concepts/C4/codes/ICD10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "ICD10");
        assert_eq!(body["codes"][0]["code"], "E11");
        assert_eq!(body["codes"].as_array().unwrap().len(), 1);

        // Known concept without codes in the vocabulary
        let (status, body) = get_json(test_router(), "/api/concepts/C2/codes/HPO").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["codes"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_code_lookup_endpoint() {
        let (status, body) = get_json(test_router(), "/api/codes/HPO/HP:0000819").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cui"], "C3");

        let (status, body) = get_json(test_router(), "/api/codes/HPO/HP:0000001").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "UNKNOWN_CODE");
    }

    #[tokio::test]
    async fn test_translate_endpoint() {
        let (status, body) =
            get_json(test_router(), "/api/codes/SNOMEDCT_US/44054006/translate/ICD10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cui"], "C4");
        assert_eq!(body["target"], "ICD10");
        assert_eq!(body["codes"][0]["code"], "E11");
        assert_eq!(body["codes"][0]["name"], "Concept C4 (ICD)");
    }

    #[tokio::test]
    async fn test_unknown_concept_is_404() {
        let (status, body) = get_json(test_router(), "/api/concepts/C999/depth").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "UNKNOWN_CONCEPT");
        assert_eq!(body["retryable"], false);
    }

    #[tokio::test]
    async fn test_lca_endpoint() {
        let (status, body) = get_json(test_router(), "/api/pairs/C4/C3/lca").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lca"], "C1");
        assert_eq!(body["depth"], 1);
    }

    #[tokio::test]
    async fn test_wu_palmer_endpoint() {
        let (status, body) =
            get_json(test_router(), "/api/pairs/C2/C4/similarity/wu-palmer").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lca"], "C1");
        // 2 * 1 / (2 + 3)
        assert!((body["similarity"].as_f64().unwrap() - 0.4).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_pathless_self_pair_is_invalid_depth() {
        let (status, body) =
            get_json(test_router(), "/api/pairs/C5/C5/similarity/wu-palmer").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_DEPTH");
        assert_eq!(body["retryable"], false);
    }

    #[tokio::test]
    async fn test_error_carries_supplied_request_id() {
        let request = Request::builder()
            .uri("/api/concepts/C999/depth")
            .header("X-Request-Id", "req-42")
            .body(Body::empty())
            .unwrap();
        let (status, header, body) = send(test_router(), request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(header.as_deref(), Some("req-42"));
        assert_eq!(body["correlation_id"], "req-42");
    }

    #[tokio::test]
    async fn test_error_gets_generated_request_id() {
        let request = Request::builder()
            .uri("/api/concepts/%20/ancestors")
            .body(Body::empty())
            .unwrap();
        let (status, header, body) = send(test_router(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_CONCEPT_ID");
        let header = header.unwrap();
        assert!(uuid::Uuid::parse_str(&header).is_ok());
        assert_eq!(body["correlation_id"], header.as_str());
    }

    #[tokio::test]
    async fn test_root_pair_has_no_common_ancestor() {
        let (status, body) = get_json(test_router(), "/api/pairs/C1/C2/lca").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NO_COMMON_ANCESTOR");
    }

    #[tokio::test]
    async fn test_batch_collects_errors() {
        let request = BatchSimilarityRequest {
            pairs: vec![
                ConceptPair { cui1: "C4".into(), cui2: "C3".into() },
                ConceptPair { cui1: "C4".into(), cui2: "C999".into() },
            ],
        };
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/similarity/batch")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&request).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: BatchSimilarityResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.success_count, 1);
        assert_eq!(body.errors.len(), 1);
        assert_eq!(body.errors[0].code, "UNKNOWN_CONCEPT");
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (status, body) = get_json(test_router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["schema_version"], TAXONOMY_KERNEL_SCHEMA_VERSION);
        assert_eq!(
            body["config_fingerprint"],
            KernelConfig::default().fingerprint()
        );

        let (status, body) = get_json(test_router(), "/health/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "alive");

        let (status, body) = get_json(test_router(), "/health/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], true);
    }

    #[test]
    fn test_status_mapping() {
        let c = ConceptId::new("C1");
        assert_eq!(status_for(&HierarchyError::UnknownConcept(c.clone())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&HierarchyError::UnknownCode { vocabulary: "HPO".into(), code: "x".into() }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&HierarchyError::InvalidDepth { concept: c, depth: Depth::Unknown }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&HierarchyError::Cancelled), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_for(&HierarchyError::UpstreamTimeout {
                stage: Stage::Request,
                target: "request".into(),
                timeout_ms: 1,
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[tokio::test]
    async fn test_request_scope_deadline_cancels_token() {
        let scope = RequestScope::new();
        let result: Result<(), _> = scope
            .run(Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(
            result,
            Err(HierarchyError::UpstreamTimeout { stage: Stage::Request, .. })
        ));
        assert!(scope.token.is_cancelled());
    }
}
