use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::engine::state::NodeState;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
    nodes: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Body of POST /v1/nodes/{address}/commands
#[derive(Debug, Deserialize)]
struct CommandRequest {
    command: String,
    #[serde(default)]
    value: Option<f64>,
}

/// Body of POST /v1/query
#[derive(Debug, Default, Deserialize)]
struct QueryRequest {
    #[serde(default)]
    address: Option<String>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
            nodes: state.engine.state_snapshot().nodes.len(),
        }),
    )
}

/// Handler for GET /v1/nodes
#[tracing::instrument(skip(state))]
async fn nodes(State(state): State<Arc<AppState>>) -> Json<Vec<NodeState>> {
    let snapshot = state.engine.state_snapshot();
    Json(snapshot.nodes.values().cloned().collect())
}

/// Handler for GET /v1/notices
#[tracing::instrument(skip(state))]
async fn notices(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, String>> {
    Json(state.engine.state_snapshot().notices.clone())
}

/// Handler for POST /v1/nodes/{address}/commands
#[tracing::instrument(skip(state))]
async fn command(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Json(request): Json<CommandRequest>,
) -> Response {
    if !state.engine.state_snapshot().nodes.contains_key(&address) {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Unknown node: {}", address),
        );
    }

    match state
        .engine
        .send_command(address, request.command, request.value)
    {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

/// Handler for POST /v1/query
#[tracing::instrument(skip(state))]
async fn query(
    State(state): State<Arc<AppState>>,
    request: Option<Json<QueryRequest>>,
) -> Response {
    let address = request.and_then(|Json(r)| r.address);
    if let Some(address) = &address {
        if !state.engine.state_snapshot().nodes.contains_key(address) {
            return error_response(
                StatusCode::NOT_FOUND,
                format!("Unknown node: {}", address),
            );
        }
    }

    match state.engine.query(address) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

/// Create the API router with all endpoints
pub fn create_router(engine: Arc<Engine>) -> Router {
    let state = Arc::new(AppState {
        version: env!("CARGO_PKG_VERSION"),
        engine,
    });

    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/nodes", get(nodes))
        .route("/v1/nodes/:address/commands", post(command))
        .route("/v1/query", post(query))
        .route("/v1/notices", get(notices))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to `listen:port` and serves until `shutdown_rx` fires.
pub async fn serve(
    listen: String,
    port: u16,
    engine: Arc<Engine>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(engine);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}
