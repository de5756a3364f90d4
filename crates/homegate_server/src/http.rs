//! HTTP and WebSocket binding.
//!
//! - `POST /graphql`: one `ApiRequest` per call, token in `authorization`
//! - `GET /ws?token=…`: push channel
//! - `GET /health`

use crate::server::ApiServer;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use homegate_protocol::{ApiError, ApiRequest, ApiResponse, ErrorCode, PushEvent};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

/// Builds the router for `server`.
pub fn router(server: Arc<ApiServer>) -> Router {
    Router::new()
        .route("/graphql", post(graphql))
        .route("/ws", get(push_upgrade))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(server)
}

async fn health() -> &'static str {
    "ok"
}

async fn graphql(
    State(server): State<Arc<ApiServer>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match ApiRequest::decode(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "undecodable API request");
            let error = ApiError::new(ErrorCode::BadUserInput, e.to_string());
            return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(error))).into_response();
        }
    };
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    // Resolvers call into the gateway synchronously.
    let timeout = server.config().request_timeout;
    let task = tokio::task::spawn_blocking(move || server.handle(auth_header.as_deref(), &request));

    let response = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(response)) => response,
        Ok(Err(join_error)) => {
            warn!(error = %join_error, "resolver task failed");
            ApiResponse::error(ApiError::new(
                ErrorCode::InternalServerError,
                "internal server error",
            ))
        }
        Err(_) => {
            warn!(?timeout, "request timed out");
            ApiResponse::error(ApiError::new(
                ErrorCode::InternalServerError,
                "request timed out",
            ))
        }
    };
    Json(response).into_response()
}

#[derive(Debug, Deserialize)]
struct PushQuery {
    token: Option<String>,
}

async fn push_upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<PushQuery>,
    State(server): State<Arc<ApiServer>>,
) -> Response {
    let Some(claims) = server.verify_push_token(query.token.as_deref()) else {
        debug!("rejected push handshake");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let events = server.hub().subscribe();
    let lifetime = millis_until(claims.expires_at);
    ws.on_upgrade(move |socket| push_session(socket, events, lifetime))
}

/// Streams push events to one socket until either side closes or the
/// session token expires.
async fn push_session(
    mut socket: WebSocket,
    mut events: broadcast::Receiver<PushEvent>,
    lifetime: Duration,
) {
    info!("push channel opened");
    let expiry = tokio::time::sleep(lifetime);
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match event.to_text() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "failed to encode push event");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "push subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            _ = &mut expiry => {
                debug!("session token expired, closing push channel");
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }
    info!("push channel closed");
}

fn millis_until(deadline: i64) -> Duration {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let now = i64::try_from(now).unwrap_or(i64::MAX);
    Duration::from_millis(u64::try_from(deadline.saturating_sub(now)).unwrap_or(0))
}
