// HTTP surface: POST /query, POST /intent, GET /health

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;

use crate::commands::kubeconfig::{self, ClusterHealth};
use crate::models::intent::RawIntent;
use crate::models::query::{ErrorBody, QueryAnswer, QueryRequest};
use crate::service::QueryService;

#[derive(Clone)]
pub struct AppState {
    pub service: QueryService,
    pub kube_context: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(create_query))
        .route("/intent", post(create_intent))
        .route("/health", get(health_check))
        .with_state(state)
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

async fn create_query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            log::warn!("query: rejected body: {rejection}");
            return error(StatusCode::BAD_REQUEST, "Invalid request. 'query' field is required.");
        }
    };

    let Some(query) = request.query.map(|q| q.trim().to_string()) else {
        log::warn!("query: 'query' field is missing");
        return error(StatusCode::BAD_REQUEST, "Invalid request. 'query' field is required.");
    };
    if query.is_empty() {
        log::warn!("query: empty query received");
        return error(StatusCode::BAD_REQUEST, "Query cannot be empty.");
    }

    log::info!("query: received {query:?}");
    let answer = state.service.answer(&query).await;
    log::info!("query: answered {answer:?}");

    Json(QueryAnswer { query, answer }).into_response()
}

async fn create_intent(
    State(state): State<AppState>,
    body: Result<Json<RawIntent>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(raw)) => {
            log::info!("intent: received {raw:?}");
            let Some(answer) = state.service.answer_intent(&raw).await else {
                log::warn!("intent: no direct router in {:?} mode", state.service.mode());
                return error(
                    StatusCode::BAD_REQUEST,
                    "The /intent endpoint needs direct or hybrid mode.",
                );
            };
            let query = format!("{} {}", raw.action.trim(), raw.resource_type.trim());
            Json(QueryAnswer { query, answer }).into_response()
        }
        Err(rejection) => {
            log::warn!("intent: rejected body: {rejection}");
            error(
                StatusCode::BAD_REQUEST,
                "Invalid request. 'action' and 'resource_type' are required.",
            )
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthReport {
    mode: String,
    context: Option<String>,
    server_url: Option<String>,
    cluster: ClusterHealth,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthReport> {
    let active = kubeconfig::load_kubeconfig().and_then(|cfg| {
        kubeconfig::kubeconfig_contexts(&cfg, state.kube_context.as_deref())
            .into_iter()
            .find(|c| c.is_active)
    });

    let server_url = active.as_ref().and_then(|c| c.server_url.clone());
    let cluster = match server_url.as_deref() {
        Some(url) => kubeconfig::check_cluster_health(url).await,
        None => ClusterHealth::Unreachable,
    };

    Json(HealthReport {
        mode: format!("{:?}", state.service.mode()).to_lowercase(),
        context: active.map(|c| c.name),
        server_url,
        cluster,
    })
}
