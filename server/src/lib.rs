use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sift_core::{DocId, EngineConfig, IndexError, SearchEngine, SearchHit, SledStore, Trie};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;
const MAX_OFFSET: usize = 1000;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k: Option<usize>,
    /// Hits to skip, for paging through results.
    pub offset: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub offset: usize,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Deserialize)]
pub struct SuggestParams {
    pub q: String,
}

#[derive(Serialize)]
pub struct Suggestion {
    pub text: String,
    pub count: u64,
}

#[derive(Serialize)]
pub struct SuggestResponse {
    pub query: String,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine<SledStore>>,
    pub trie: Arc<Trie>,
}

type ApiError = (StatusCode, String);

fn internal(e: IndexError) -> ApiError {
    tracing::error!(error = %e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Open the index under `index_dir` and build the router. Fails fast on a
/// missing, foreign or unfinalized index.
pub fn build_app<P: AsRef<std::path::Path>>(index_dir: P, config: EngineConfig) -> Result<Router> {
    let index_dir = index_dir.as_ref();
    let store = SledStore::open(index_dir).with_context(|| format!("opening index {}", index_dir.display()))?;
    app_from_store(store, config)
}

pub fn app_from_store(store: SledStore, config: EngineConfig) -> Result<Router> {
    let engine = SearchEngine::open(store, config)?;
    let trie = engine.load_trie()?;
    let app_state = AppState { engine: Arc::new(engine), trie: Arc::new(trie) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/autocomplete", get(autocomplete_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let k = params.k.unwrap_or(state.engine.config().max_results).clamp(1, MAX_K);
    let offset = params.offset.unwrap_or(0).min(MAX_OFFSET);
    let results: Vec<SearchHit> =
        state.engine.search_text(&params.q, offset + k).map_err(internal)?.into_iter().skip(offset).collect();
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), offset, total_hits: results.len(), results }))
}

pub async fn autocomplete_handler(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> Json<SuggestResponse> {
    let prefix = params.q.trim_start().to_lowercase();
    let suggestions = if prefix.is_empty() {
        Vec::new()
    } else {
        state
            .trie
            .suggest_with_counts(&prefix)
            .into_iter()
            .map(|(text, count)| Suggestion { text: text.to_owned(), count })
            .collect()
    };
    Json(SuggestResponse { query: params.q, suggestions })
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<DocId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.engine.document(doc_id).map_err(internal)? {
        Some(meta) => Ok(Json(serde_json::json!({
            "doc_id": doc_id,
            "name": meta.name,
            "title": meta.title,
            "path": meta.path,
            "url": meta.url,
            "description": meta.description,
        }))),
        None => Err((StatusCode::NOT_FOUND, format!("document {doc_id} not found"))),
    }
}
