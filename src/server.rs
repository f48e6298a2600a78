//! HTTP query service.
//!
//! Serves an explicitly loaded index over a small JSON API. The service
//! starts with no index: queries are rejected until a `POST /load`
//! succeeds. A failed load leaves whatever index was previously loaded
//! untouched.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/load` | Load (or reload) an index from disk |
//! | `POST` | `/query` | Similarity search against the loaded index |
//! | `GET`  | `/status` | Whether an index is loaded, and its identity |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Response envelope
//!
//! Every body carries a `status` discriminator:
//!
//! ```json
//! { "status": "success", "results": [ ... ] }
//! { "status": "error", "message": "No index loaded" }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::embedding::{self, create_provider};
use crate::index::VectorIndex;
use crate::models::QueryHit;

/// Shared service state. The index slot starts empty and is only ever
/// replaced under the write lock by a successful load; queries take the
/// read lock so they proceed concurrently.
pub struct ServiceState {
    config: Config,
    index: RwLock<Option<VectorIndex>>,
}

impl ServiceState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            index: RwLock::new(None),
        }
    }

    /// Load the named index from `dir` and swap it in. On any failure
    /// the currently loaded index (if any) stays in place.
    pub async fn load_index(&self, dir: &std::path::Path, name: &str) -> Result<usize, ApiError> {
        let provider = create_provider(&self.config.embedding)
            .map_err(|e| ApiError::internal(e.to_string()))?;

        let loaded = VectorIndex::load(dir, name, provider.model_name(), provider.dims())
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        let count = loaded.len();
        let mut slot = self.index.write().await;
        *slot = Some(loaded);
        Ok(count)
    }

    /// Embed `query` and return the `k` nearest chunks. Requires a
    /// loaded index.
    pub async fn query(&self, query: &str, k: usize) -> Result<Vec<QueryHit>, ApiError> {
        if query.trim().is_empty() {
            return Err(ApiError::bad_request("query must not be empty"));
        }
        if k == 0 {
            return Err(ApiError::bad_request("k must be >= 1"));
        }

        // Usage errors are checked before the provider is called, so an
        // unloaded service never spends an embedding request. The read
        // guard is held across the embed so a concurrent load cannot
        // swap the index out from under this query.
        let slot = self.index.read().await;
        let index = slot
            .as_ref()
            .ok_or_else(|| ApiError::bad_request("No index loaded. POST /load first."))?;

        let query_vector = embedding::embed_query(&self.config.embedding, query)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to embed query: {}", e)))?;

        Ok(index.search(&query_vector, k))
    }
}

/// Run the service on the configured bind address until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = Arc::new(ServiceState::new(config.clone()));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/load", post(handle_load))
        .route("/query", post(handle_query))
        .route("/status", get(handle_status))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("Query service listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// Error that renders as the standard error envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": "error",
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

// ============ Handlers ============

#[derive(Deserialize)]
struct LoadRequest {
    /// Directory holding the index files; defaults to `index.dir` from
    /// the service configuration.
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    index_name: Option<String>,
}

async fn handle_load(
    State(state): State<Arc<ServiceState>>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let dir = req.path.unwrap_or_else(|| state.config.index.dir.clone());
    let name = req
        .index_name
        .unwrap_or_else(|| state.config.index.name.clone());

    let count = state.load_index(&dir, &name).await?;
    println!("Loaded index '{}' ({} vectors)", name, count);

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": format!("Loaded index '{}' ({} vectors)", name, count),
    })))
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct QueryResponse {
    status: &'static str,
    results: Vec<QueryHit>,
}

async fn handle_query(
    State(state): State<Arc<ServiceState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let k = req.k.unwrap_or(state.config.server.default_k);
    let results = state.query(&req.query, k).await?;

    Ok(Json(QueryResponse {
        status: "success",
        results,
    }))
}

async fn handle_status(State(state): State<Arc<ServiceState>>) -> Json<serde_json::Value> {
    let slot = state.index.read().await;
    match slot.as_ref() {
        Some(index) => Json(serde_json::json!({
            "status": "success",
            "loaded": true,
            "index_name": index.name(),
            "model": index.model(),
            "dims": index.dims(),
            "vectors": index.len(),
        })),
        None => Json(serde_json::json!({
            "status": "success",
            "loaded": false,
        })),
    }
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
