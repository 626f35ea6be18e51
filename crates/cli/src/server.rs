//! The search HTTP server: one POST route for queries plus health and stats
//! probes.

use crate::api::{ResultItem, SearchRequest, SearchResponse};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use notedex_embed::Embedder;
use notedex_query::QueryEngine;
use serde_json::json;
use std::sync::Arc;

pub struct AppState<E> {
    pub engine: QueryEngine<E>,
    pub db_path: String,
}

pub fn build_router<E: Embedder + 'static>(state: Arc<AppState<E>>) -> Router {
    Router::new()
        .route("/search", post(handle_search::<E>))
        .route("/health", get(handle_health::<E>))
        .route("/stats", get(handle_stats::<E>))
        .with_state(state)
}

async fn handle_search<E: Embedder + 'static>(
    State(state): State<Arc<AppState<E>>>,
    Json(request): Json<SearchRequest>,
) -> (StatusCode, Json<SearchResponse>) {
    match state
        .engine
        .search(&request.query, request.top_n, request.candidate_k)
        .await
    {
        Ok((hits, timing)) => {
            log::info!(
                "search: {:?} -> {} results in {}ms (embed:{}ms, search:{}ms, fetch:{}ms, rerank:{}ms)",
                request.query,
                hits.len(),
                timing.total_ms,
                timing.embed_ms,
                timing.search_ms,
                timing.fetch_ms,
                timing.rerank_ms
            );
            let response = SearchResponse {
                results: hits.into_iter().map(ResultItem::from).collect(),
                timing,
                error: None,
            };
            (StatusCode::OK, Json(response))
        }
        Err(e) => {
            log::warn!("search {:?} failed: {e}", request.query);
            let response = SearchResponse {
                error: Some(e.to_string()),
                ..SearchResponse::default()
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response))
        }
    }
}

async fn handle_health<E: Embedder + 'static>(
    State(state): State<Arc<AppState<E>>>,
) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "index_size": state.engine.index_size(),
        "server_time": now_unix(),
    }))
}

async fn handle_stats<E: Embedder + 'static>(
    State(state): State<Arc<AppState<E>>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let active_chunks = state
        .engine
        .active_chunk_count()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(json!({
        "index_vectors": state.engine.index_size(),
        "active_chunks": active_chunks,
        "db_path": state.db_path,
    })))
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
