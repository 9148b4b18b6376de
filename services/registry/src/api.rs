//! The panel's JSON API, served under `/v1/api`.
//!
//! Repository names containing `/` are passed as one percent-encoded path segment,
//! e.g. `/v1/api/tags/app%2Fweb/v1`.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use chrono::Utc;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::client::RegistryClient;
use crate::delete::DeleteReport;
use crate::models::{ManifestInfo, RepositoryDetailInfo, RepositoryInfo, TagInfo};
use crate::outcome::Outcome;
use crate::stats::{RegistrySummary, RepositoryStats};

/// Name reported by the health endpoint.
const SERVICE: &str = "registry-panel";

#[derive(Debug, Clone)]
struct PanelState {
    client: RegistryClient,
    shutdown: CancellationToken,
}

/// Errors the panel reports to its callers, as `{"message": "..."}`.
#[derive(Debug)]
enum PanelError {
    NotFound(String),
    ShuttingDown,
}

impl IntoResponse for PanelError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            PanelError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            PanelError::ShuttingDown => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The server is shutting down".to_owned(),
            ),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

type PanelResult<T> = Result<T, PanelError>;

/// Lists are empty when the registry cannot be queried.
fn items<T>(outcome: Outcome<Vec<T>>) -> PanelResult<Json<Vec<T>>> {
    match outcome {
        Outcome::Cancelled => Err(PanelError::ShuttingDown),
        outcome => Ok(Json(outcome.into_items())),
    }
}

fn found<T>(outcome: Outcome<T>, not_found: impl FnOnce() -> String) -> PanelResult<T> {
    match outcome {
        Outcome::Found(value) => Ok(value),
        Outcome::Cancelled => Err(PanelError::ShuttingDown),
        Outcome::Missing | Outcome::Failed(_) => Err(PanelError::NotFound(not_found())),
    }
}

/// Build the panel router.
///
/// Each request gets a child of `shutdown`; cancelling it aborts in-flight
/// registry calls, which then answer `503 Service Unavailable`.
pub fn router(client: RegistryClient, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/v1/api/health", get(health))
        .route("/v1/api/repositories", get(list_repositories))
        .route(
            "/v1/api/repositories/{name}",
            get(get_repository).delete(delete_repository),
        )
        .route("/v1/api/tags/{repository}", get(list_tags))
        .route(
            "/v1/api/tags/{repository}/{tag}",
            get(get_tag).delete(delete_tag),
        )
        .route("/v1/api/statistics/summary", get(summary))
        .route("/v1/api/statistics/repositories", get(repository_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(PanelState { client, shutdown })
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "service": SERVICE,
    }))
}

async fn list_repositories(State(state): State<PanelState>) -> PanelResult<Json<Vec<RepositoryInfo>>> {
    let cancel = state.shutdown.child_token();
    items(state.client.list_repositories(&cancel).await)
}

async fn get_repository(
    State(state): State<PanelState>,
    Path(name): Path<String>,
) -> PanelResult<Json<RepositoryDetailInfo>> {
    let cancel = state.shutdown.child_token();
    let outcome = state.client.get_repository(&name, &cancel).await;
    found(outcome, || format!("Repository '{name}' not found")).map(Json)
}

async fn delete_repository(
    State(state): State<PanelState>,
    Path(name): Path<String>,
) -> PanelResult<Json<DeleteReport>> {
    let cancel = state.shutdown.child_token();
    let outcome = state.client.delete_repository(&name, &cancel).await;
    found(outcome, || {
        format!("Repository '{name}' not found or deletion failed")
    })
    .map(Json)
}

async fn list_tags(
    State(state): State<PanelState>,
    Path(repository): Path<String>,
) -> PanelResult<Json<Vec<TagInfo>>> {
    let cancel = state.shutdown.child_token();
    items(state.client.list_tags(&repository, &cancel).await)
}

async fn get_tag(
    State(state): State<PanelState>,
    Path((repository, tag)): Path<(String, String)>,
) -> PanelResult<Json<ManifestInfo>> {
    let cancel = state.shutdown.child_token();
    let outcome = state.client.get_manifest(&repository, &tag, &cancel).await;
    found(outcome, || {
        format!("Tag '{tag}' not found in repository '{repository}'")
    })
    .map(Json)
}

async fn delete_tag(
    State(state): State<PanelState>,
    Path((repository, tag)): Path<(String, String)>,
) -> PanelResult<StatusCode> {
    let cancel = state.shutdown.child_token();
    let outcome = state.client.delete_tag(&repository, &tag, &cancel).await;
    found(outcome, || {
        format!("Tag '{tag}' not found in repository '{repository}' or deletion failed")
    })
    .map(|_| StatusCode::NO_CONTENT)
}

/// Totals are zero when the registry cannot be queried.
async fn summary(State(state): State<PanelState>) -> PanelResult<Json<RegistrySummary>> {
    let cancel = state.shutdown.child_token();
    match state.client.summary(&cancel).await {
        Outcome::Found(summary) => Ok(Json(summary)),
        Outcome::Cancelled => Err(PanelError::ShuttingDown),
        Outcome::Missing | Outcome::Failed(_) => Ok(Json(RegistrySummary {
            total_repositories: 0,
            total_tags: 0,
            total_size: 0,
            timestamp: Utc::now(),
        })),
    }
}

async fn repository_stats(State(state): State<PanelState>) -> PanelResult<Json<Vec<RepositoryStats>>> {
    let cancel = state.shutdown.child_token();
    items(state.client.repository_stats(&cancel).await)
}
