//! Taxonomy Kernel REST Service
//!
//! Exposes the kernel's hierarchy queries over HTTP.
//!
//! ## Endpoints
//!
//! - `GET /api/concepts/:cui` - Concept record
//! - `GET /api/concepts/:cui/ancestors` - Ancestor concepts, sorted
//! - `GET /api/concepts/:cui/depth` - Hierarchical depth
//! - `GET /api/concepts/:cui/code-map` - Source-vocabulary codes
//! - `GET /api/concepts/:cui/codes/:sab` - Codes in one vocabulary
//! - `GET /api/codes/:sab/:code` - Concept owning a code
//! - `GET /api/codes/:sab/:code/translate/:target` - Code crosswalk through its concept
//! - `GET /api/pairs/:cui1/:cui2/lca` - Lowest common ancestor
//! - `GET /api/pairs/:cui1/:cui2/similarity/wu-palmer` - Wu-Palmer similarity
//! - `POST /api/similarity/batch` - Batch similarity
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness check
//! - `GET /health/ready` - Readiness check

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{
    metrics_middleware, record_error, record_similarity_metrics, request_id_middleware, RequestId,
    REQUEST_ID_HEADER,
};
pub use routes::{create_router, status_for, ApiError, AppState, ErrorResponse};
pub use state::ServiceState;
