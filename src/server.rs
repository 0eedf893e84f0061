//! HTTP API server.
//!
//! Exposes tariff lookup and search over the active snapshot as a JSON
//! API. The store is loaded once at startup from the active snapshot;
//! promotion takes effect on the next restart, keeping the read path free
//! of locks.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/v1/health` | Health check (version, active snapshot, timestamp) |
//! | `POST` | `/v1/tariff` | Exact lookup by 10-digit HTS code |
//! | `GET`  | `/v1/search` | Fuzzy or semantic search (`?q=&mode=&limit=`) |
//! | `GET`  | `/v1/snapshot` | Active snapshot id and manifest entry count |
//!
//! # Error Contract
//!
//! All error responses use one schema:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "code not found" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `embeddings_disabled` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the API serves
//! non-sensitive reference data to browser-based clients.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::{HtsRecord, DEV_DISCLAIMER};
use crate::search::semantic_search;
use crate::sections::{chapter_to_section, dev_citation};
use crate::snapshot::{active_snapshot_id, manifest_entry_count, snapshot_dir};
use crate::store::Store;

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<Store>,
    /// Snapshot the store was loaded from, resolved once at startup.
    snapshot_id: String,
}

/// Starts the HTTP server.
///
/// Resolves the active snapshot, loads the store, binds to the address in
/// `[server].bind`, and serves until the process is terminated. A missing
/// active snapshot is not fatal: the server starts with an empty store so
/// `/v1/health` stays useful before the first ingest.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let snapshot_id = active_snapshot_id(config);

    let store = match snapshot_dir(&config.snapshots.root, &snapshot_id)
        .and_then(|dir| Store::load(&dir))
    {
        Ok(store) => {
            println!("loaded snapshot {} ({} records)", snapshot_id, store.len());
            store
        }
        Err(e) => {
            println!("warning: no usable active snapshot ({}); serving empty store", e);
            Store::empty()
        }
    };

    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(store),
        snapshot_id,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/v1/health", get(handle_health))
        .route("/v1/tariff", post(handle_tariff))
        .route("/v1/search", get(handle_search))
        .route("/v1/snapshot", get(handle_snapshot))
        .layer(cors)
        .with_state(state);

    println!("API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable
/// message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn embeddings_disabled(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "embeddings_disabled".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /v1/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    snapshot_id: String,
    timestamp: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        snapshot_id: state.snapshot_id.clone(),
        timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
    })
}

// ============ POST /v1/tariff ============

#[derive(Deserialize)]
struct TariffRequest {
    code: String,
}

#[derive(Serialize)]
struct Rates {
    general: String,
    special: String,
    col2: String,
}

#[derive(Serialize)]
struct TariffResponse {
    disclaimer: String,
    snapshot_id: String,
    code: String,
    chapter: u8,
    section: Option<String>,
    article: String,
    uoq: String,
    rates: Rates,
    dev_citation: String,
}

fn rates_of(rec: &HtsRecord) -> Rates {
    Rates {
        general: rec.rate_general.clone(),
        special: rec.rate_special.clone(),
        col2: rec.rate_col2.clone(),
    }
}

async fn handle_tariff(
    State(state): State<AppState>,
    Json(req): Json<TariffRequest>,
) -> Result<Json<TariffResponse>, AppError> {
    let rec = state
        .store
        .get_by_code(&req.code)
        .ok_or_else(|| not_found("code not found"))?;

    Ok(Json(TariffResponse {
        disclaimer: DEV_DISCLAIMER.to_string(),
        snapshot_id: state.snapshot_id.clone(),
        code: rec.hts10.clone(),
        chapter: rec.chapter,
        section: chapter_to_section(rec.chapter).map(str::to_string),
        article: rec.article.clone(),
        uoq: rec.uoq.clone(),
        rates: rates_of(rec),
        dev_citation: dev_citation(rec.chapter, &rec.hts10),
    }))
}

// ============ GET /v1/search ============

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Serialize)]
struct SearchItem {
    code: String,
    chapter: u8,
    section: Option<String>,
    article: String,
    uoq: String,
    rates: Rates,
    dev_citation: String,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let query = params.q.trim();
    let min_len = state.config.retrieval.min_query_len;
    if query.chars().count() < min_len {
        return Err(bad_request(format!(
            "q must be at least {} characters",
            min_len
        )));
    }

    let mode = params.mode.as_deref().unwrap_or("fuzzy");

    match mode {
        "fuzzy" => {
            let limit = params.limit.unwrap_or(state.config.retrieval.fuzzy_limit);
            let items: Vec<SearchItem> = state
                .store
                .search_article(query, limit)
                .into_iter()
                .map(|(rec, _score)| SearchItem {
                    code: rec.hts10.clone(),
                    chapter: rec.chapter,
                    section: chapter_to_section(rec.chapter).map(str::to_string),
                    article: rec.article.clone(),
                    uoq: rec.uoq.clone(),
                    rates: rates_of(rec),
                    dev_citation: dev_citation(rec.chapter, &rec.hts10),
                })
                .collect();

            Ok(Json(serde_json::json!({
                "disclaimer": DEV_DISCLAIMER,
                "snapshot_id": state.snapshot_id,
                "mode": "fuzzy",
                "items": items,
            })))
        }
        "semantic" => {
            if !state.config.embedding.is_enabled() {
                return Err(embeddings_disabled(
                    "semantic mode requires an embedding provider",
                ));
            }

            let limit = params
                .limit
                .unwrap_or(state.config.retrieval.semantic_limit);
            let docs = semantic_search(&state.config, &state.snapshot_id, query, limit)
                .await
                .map_err(|e| internal(e.to_string()))?;

            Ok(Json(serde_json::json!({
                "disclaimer": DEV_DISCLAIMER,
                "snapshot_id": state.snapshot_id,
                "mode": "semantic",
                "items": docs,
            })))
        }
        other => Err(bad_request(format!(
            "unknown mode: {}. Use fuzzy or semantic.",
            other
        ))),
    }
}

// ============ GET /v1/snapshot ============

#[derive(Serialize)]
struct SnapshotResponse {
    snapshot_id: String,
    entries: usize,
}

async fn handle_snapshot(State(state): State<AppState>) -> Json<SnapshotResponse> {
    let entries = manifest_entry_count(&state.config.snapshots.root, &state.snapshot_id);
    Json(SnapshotResponse {
        snapshot_id: state.snapshot_id.clone(),
        entries,
    })
}
