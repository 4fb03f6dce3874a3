//! Inbound RPC surface: the JSON-over-HTTP endpoints peers call, plus
//! health/status probes for operators and the CLI.
//!
//! Every RPC answers with the uniform [`Reply`] envelope. A protocol "no"
//! (vote declined, sync superseded) is a successful call carrying
//! `data=false`; only validation and internal failures set `success=false`.

use crate::cluster::engine::{ClusterService, VoteDecision};
use crate::cluster::types::{ClientConfig, Heartbeat, QueryClients, Reply, Vote};
use axum::extract::State;
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

type AppState = Arc<ClusterService>;

pub fn create_router(service: AppState) -> Router {
    Router::new()
        // Node-to-node RPCs
        .route("/vote/heartbeat", axum::routing::post(heartbeat))
        .route("/vote/clusters", axum::routing::post(query_clusters))
        .route("/vote/master/sync", axum::routing::post(master_sync))
        .route("/vote/accept", axum::routing::post(accept_vote))
        // Probes
        .route("/health", axum::routing::get(health))
        .route("/status", axum::routing::get(status))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .with_state(service)
}

/// Upsert the sender into the registry.
async fn heartbeat(
    State(service): State<AppState>,
    Json(request): Json<Heartbeat>,
) -> Json<Reply<()>> {
    match service.record_heartbeat(&request) {
        Ok(()) => Json(Reply::ok_empty()),
        Err(e) => Json(Reply::failed(e.to_string())),
    }
}

/// Snapshot of the registry.
async fn query_clusters(
    State(service): State<AppState>,
    Json(_request): Json<QueryClients>,
) -> Json<Reply<HashMap<String, ClientConfig>>> {
    Json(Reply::ok(service.query_clients()))
}

/// Adopt a pushed winning vote; `data=false` means the push lost the
/// tie-break and was ignored.
async fn master_sync(State(service): State<AppState>, Json(vote): Json<Vote>) -> Json<Reply<bool>> {
    match service.apply_master_sync(&vote).await {
        Ok(synced) => Json(Reply::ok(synced)),
        Err(e) => Json(Reply::failed(e.to_string())),
    }
}

/// Evaluate a vote proposal; a rejection is a successful call with
/// `data=false` and the reason in `message`.
async fn accept_vote(State(service): State<AppState>, Json(vote): Json<Vote>) -> Json<Reply<bool>> {
    match service.accept_vote(&vote) {
        VoteDecision::Accepted => Json(Reply::ok(true)),
        VoteDecision::Rejected(reason) => Json(Reply::ok_with(false, reason.to_string())),
    }
}

/// Liveness plus the local health view.
async fn health(State(service): State<AppState>) -> Json<serde_json::Value> {
    let ctx = service.context();
    Json(json!({
        "alive": true,
        "healthy": ctx.is_healthy(),
        "clientName": ctx.client_name(),
        "version": crate::VERSION,
    }))
}

/// Minimal node status for dashboards and the CLI.
async fn status(State(service): State<AppState>) -> Json<serde_json::Value> {
    let ctx = service.context();
    let role = if ctx.is_self_master() { "MASTER" } else { "SLAVE" };
    Json(json!({
        "clientName": ctx.client_name(),
        "cluster": ctx.cluster_name(),
        "group": ctx.group_name(),
        "role": role,
        "voting": ctx.is_voting(),
        "healthy": ctx.is_healthy(),
        "clients": ctx.client_count(),
        "nodes": ctx.all_nodes().len(),
        "master": ctx.master_node().map(|n| n.to_string()),
    }))
}
