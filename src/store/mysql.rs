//! MySQL concept store over a UMLS-style release.
//!
//! Reads two tables:
//! - `MRHIER (CUI, AUI, PTR)`: one row per hierarchy context; `PTR` is the
//!   dot-separated atom path from the root down to (excluding) `AUI`.
//! - `MRCONSO (CUI, AUI, STR, SAB, CODE)`: one row per atom.
//!
//! A hierarchy path handed to the kernel is `PTR` with the row's own `AUI`
//! appended, so its terminal atom belongs to the queried concept. `PTR` is
//! always dot-separated in the release; the handed-out path is re-encoded
//! with the separator the kernel decodes with (see
//! [`MysqlConceptStore::with_path_separator`]).
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: MySQL connection string. When unset, assembled from
//!   `DB_HOST` (default: localhost), `DB_PORT` (default: 3306), `DB_USER`,
//!   `DB_PASSWORD` and `DB_NAME` (default: umls)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{QueryBuilder, Row};

use crate::types::{AtomId, CodeMapping, Concept, ConceptId, HierarchyPath, PATH_SEPARATOR};
use super::{ConceptStore, StoreError};

/// Atoms per `IN (...)` list when batch-resolving.
const RESOLVE_CHUNK_SIZE: usize = 1000;

/// Separator used by `MRHIER.PTR`.
const PTR_SEPARATOR: char = '.';

/// Build the raw path for one `MRHIER` row: `PTR` plus the row's `AUI`,
/// encoded with `separator`.
fn hierarchy_path_from_row(ptr: Option<&str>, aui: &str, separator: char) -> String {
    let mut atoms = ptr
        .map(|p| HierarchyPath::decode(p, PTR_SEPARATOR).atoms().to_vec())
        .unwrap_or_default();
    atoms.push(AtomId::from(aui.trim()));
    HierarchyPath::new(atoms).encode(separator)
}

/// Configuration for the MySQL connection pool.
#[derive(Debug, Clone)]
pub struct MysqlConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl MysqlConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            let host = std::env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
            let port = std::env::var("DB_PORT").unwrap_or_else(|_| "3306".to_string());
            let user = std::env::var("DB_USER").unwrap_or_else(|_| "root".to_string());
            let password = std::env::var("DB_PASSWORD").unwrap_or_default();
            let name = std::env::var("DB_NAME").unwrap_or_else(|_| "umls".to_string());
            format!("mysql://{}:{}@{}:{}/{}", user, password, host, port, name)
        });

        Self {
            database_url,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            max_lifetime_secs: std::env::var("DB_MAX_LIFETIME_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1800),
        }
    }
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Error type for the MySQL store.
#[derive(Debug, thiserror::Error)]
pub enum MysqlError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError for MysqlError {
    fn is_timeout(&self) -> bool {
        matches!(self, Self::Database(sqlx::Error::PoolTimedOut))
    }
}

/// MySQL concept store.
///
/// The pool is owned here; the kernel only ever sees the `ConceptStore`
/// trait.
pub struct MysqlConceptStore {
    pool: MySqlPool,
    path_separator: char,
}

impl MysqlConceptStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: MysqlConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing MySQL connection pool"
        );

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self {
            pool,
            path_separator: PATH_SEPARATOR,
        })
    }

    /// Encode handed-out hierarchy paths with `separator`.
    ///
    /// Must match the kernel's `path_separator`, otherwise every path
    /// decodes as a single atom.
    pub fn with_path_separator(mut self, separator: char) -> Self {
        self.path_separator = separator;
        self
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(MysqlConfig::from_env()).await
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    fn parse_path_row(&self, row: &MySqlRow) -> Result<String, sqlx::Error> {
        let ptr: Option<String> = row.try_get("PTR")?;
        let aui: String = row.try_get("AUI")?;
        Ok(hierarchy_path_from_row(ptr.as_deref(), &aui, self.path_separator))
    }

    async fn concept_exists(&self, id: &ConceptId) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM MRCONSO WHERE CUI = ? LIMIT 1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

#[async_trait]
impl ConceptStore for MysqlConceptStore {
    type Error = MysqlError;

    async fn get_concept(&self, id: &ConceptId) -> Result<Option<Concept>, Self::Error> {
        let row = sqlx::query("SELECT CUI, STR FROM MRCONSO WHERE CUI = ? LIMIT 1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => {
                let cui: String = r.try_get("CUI")?;
                let name: String = r.try_get("STR")?;
                Ok(Some(Concept::new(cui, name)))
            }
            None => Ok(None),
        }
    }

    async fn get_hierarchy_paths(&self, id: &ConceptId) -> Result<Option<Vec<String>>, Self::Error> {
        let start = Instant::now();
        let rows = sqlx::query("SELECT PTR, AUI FROM MRHIER WHERE CUI = ?")
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(
            concept = %id,
            rows = rows.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Fetched MRHIER rows"
        );

        if rows.is_empty() {
            return if self.concept_exists(id).await? {
                Ok(Some(Vec::new()))
            } else {
                Ok(None)
            };
        }

        let paths = rows
            .iter()
            .map(|row| self.parse_path_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(paths))
    }

    async fn resolve_atoms_to_concepts(
        &self,
        atoms: &BTreeSet<AtomId>,
    ) -> Result<BTreeMap<AtomId, ConceptId>, Self::Error> {
        let mut resolved = BTreeMap::new();
        let atoms: Vec<&AtomId> = atoms.iter().collect();

        for chunk in atoms.chunks(RESOLVE_CHUNK_SIZE) {
            let mut builder: QueryBuilder<MySql> =
                QueryBuilder::new("SELECT DISTINCT AUI, CUI FROM MRCONSO WHERE AUI IN (");
            let mut separated = builder.separated(", ");
            for atom in chunk {
                separated.push_bind(atom.as_str().to_owned());
            }
            separated.push_unseparated(")");

            let rows = builder.build().fetch_all(&self.pool).await?;
            for row in &rows {
                let aui: String = row.try_get("AUI")?;
                let cui: String = row.try_get("CUI")?;
                resolved.insert(AtomId::new(aui), ConceptId::new(cui));
            }
        }

        tracing::debug!(
            requested = atoms.len(),
            resolved = resolved.len(),
            "Resolved atoms to concepts"
        );

        Ok(resolved)
    }

    async fn get_code_mappings(&self, id: &ConceptId) -> Result<Option<Vec<CodeMapping>>, Self::Error> {
        let rows = sqlx::query("SELECT CODE, SAB, STR FROM MRCONSO WHERE CUI = ? ORDER BY SAB, CODE")
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await?;

        // Every known concept has at least one MRCONSO row.
        if rows.is_empty() {
            return Ok(None);
        }

        let mappings = rows
            .iter()
            .map(|r| {
                Ok(CodeMapping {
                    code: r.try_get("CODE")?,
                    source: r.try_get("SAB")?,
                    name: r.try_get("STR")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(Some(mappings))
    }

    async fn find_concept_by_code(
        &self,
        source: &str,
        code: &str,
    ) -> Result<Option<ConceptId>, Self::Error> {
        let row = sqlx::query("SELECT CUI FROM MRCONSO WHERE SAB = ? AND CODE = ? ORDER BY CUI LIMIT 1")
            .bind(source)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(ConceptId::new(r.try_get::<String, _>("CUI")?))),
            None => Ok(None),
        }
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
