//! HTTP query service
//!
//! Thin axum front-end over the route engine: one routing endpoint, a
//! health probe, an admin reload endpoint driving the rendezvous, and
//! OpenAPI docs. Workers share the dataset through `SharedRegions`; a
//! panic in one request is caught by the tower layer and never takes the
//! service down.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use serde::Deserialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::engine::RouteEngine;
use crate::error::ErrorKind;
use crate::facade::{DatasetPaths, SharedDataFacade, SharedRegions};
use crate::geo::FixedLatLon;
use crate::response::{ErrorResponse, RouteOptions, RouteResponse};

#[derive(OpenApi)]
#[openapi(
    paths(route_handler, reload_handler),
    components(schemas(RouteRequest, ReloadRequest, RouteResponse, ErrorResponse))
)]
struct ApiDoc;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RouteRequest {
    /// Waypoints as [latitude, longitude] pairs.
    pub coordinates: Vec<[f64; 2]>,
    #[serde(flatten)]
    pub options: RouteOptions,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReloadRequest {
    /// Base path of the freshly prepared dataset.
    pub base: String,
}

type AppState = Arc<SharedRegions>;

#[utoipa::path(
    post,
    path = "/route",
    request_body = RouteRequest,
    responses(
        (status = 200, description = "Route computed", body = RouteResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 408, description = "Deadline exceeded", body = ErrorResponse),
        (status = 200, description = "No route between the waypoints", body = ErrorResponse)
    ),
    tag = "routing"
)]
async fn route_handler(
    State(regions): State<AppState>,
    Json(request): Json<RouteRequest>,
) -> Result<Json<RouteResponse>, (StatusCode, Json<ErrorResponse>)> {
    let ticket = regions.begin_query();
    let engine = RouteEngine::new(Arc::clone(ticket.data()));
    let coordinates: Vec<FixedLatLon> = request
        .coordinates
        .iter()
        .map(|c| FixedLatLon::from_degrees(c[0], c[1]))
        .collect();

    match engine.route(&coordinates, &request.options) {
        Ok(response) => Ok(Json(response)),
        Err(error) => Err(error_reply(error)),
    }
}

fn error_reply(error: ErrorKind) -> (StatusCode, Json<ErrorResponse>) {
    // per-query failures stay well-formed 200-level responses in the
    // classic status-code-in-body style
    let (http, status, message) = match &error {
        ErrorKind::NoRoute => (StatusCode::OK, 207, error.to_string()),
        ErrorKind::NoSegment { .. } => (StatusCode::OK, 208, error.to_string()),
        ErrorKind::Timeout => (StatusCode::REQUEST_TIMEOUT, 408, error.to_string()),
        ErrorKind::BadInput(_) => (StatusCode::BAD_REQUEST, 400, error.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, 500, error.to_string()),
    };
    (
        http,
        Json(ErrorResponse {
            status,
            status_message: message,
        }),
    )
}

#[utoipa::path(
    post,
    path = "/reload",
    request_body = ReloadRequest,
    responses(
        (status = 200, description = "Dataset swapped"),
        (status = 422, description = "New dataset rejected", body = ErrorResponse)
    ),
    tag = "admin"
)]
async fn reload_handler(
    State(regions): State<AppState>,
    Json(request): Json<ReloadRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    let paths = DatasetPaths::new(&request.base);
    let fresh = tokio::task::spawn_blocking(move || SharedDataFacade::load(&paths))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    status: 500,
                    status_message: e.to_string(),
                }),
            )
        })?
        .map_err(|e| {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    status: 422,
                    status_message: e.to_string(),
                }),
            )
        })?;

    let regions_for_swap = Arc::clone(&regions);
    let region_id =
        tokio::task::spawn_blocking(move || regions_for_swap.reload(Arc::new(fresh)))
            .await
            .map_err(|e| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        status: 500,
                        status_message: e.to_string(),
                    }),
                )
            })?;
    info!(region_id, "dataset reloaded");
    Ok(Json(serde_json::json!({ "region_id": region_id })))
}

async fn health_handler(State(regions): State<AppState>) -> Json<serde_json::Value> {
    let ticket = regions.begin_query();
    Json(serde_json::json!({
        "status": "ok",
        "region_id": ticket.region_id(),
        "timestamp": ticket.data().timestamp(),
    }))
}

pub fn build_router(regions: Arc<SharedRegions>) -> Router {
    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/route", post(route_handler))
        .route("/reload", post(reload_handler))
        .route("/health", get(health_handler))
        .route(
            "/metrics",
            get(move || async move { metric_handle.render() }),
        )
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(60)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(prometheus_layer)
        .with_state(regions)
}

pub async fn run_server(regions: Arc<SharedRegions>, port: u16) -> anyhow::Result<()> {
    let router = build_router(regions);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "query service listening");
    axum::serve(listener, router).await?;
    Ok(())
}
