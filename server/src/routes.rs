use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::auth::middleware::JwtSecret;
use crate::chat::{messages, presence};
use crate::directory;
use crate::notify::{self, broadcast, status};
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    build_router_with_cors(state, None)
}

/// Same as [`build_router`], additionally admitting `cors_origin` when set.
pub fn build_router_with_cors(state: AppState, cors_origin: Option<&str>) -> Router {
    // History and notification queries (JWT auth via Claims extractor).
    // POST /api/notifications is the single-recipient notify contract.
    let query_routes = Router::new()
        .route("/api/chat/history/{user_id}", get(messages::get_chat_history))
        .route(
            "/api/notifications",
            get(notify::get_notifications).post(notify::create_notification),
        )
        .route("/api/notifications/mark-read", put(notify::mark_notifications_read))
        .route("/api/presence", get(presence::get_presence));

    // Inbound notification contract for the document/project workflows (proctor only)
    let notify_routes = Router::new()
        .route("/api/notifications/status", post(status::notify_status_change))
        .route("/api/broadcast", post(broadcast::post_broadcast));

    let directory_routes = Router::new().route(
        "/api/directory/{user_id}",
        get(directory::get_directory_user).put(directory::upsert_directory_user),
    );

    // WebSocket endpoint (optional auth via query param, not JWT header)
    let ws_routes = Router::new().route("/ws", get(ws_handler::ws_upgrade));

    let health = Router::new().route("/health", get(health_check));

    let router = Router::new()
        .merge(query_routes)
        .merge(notify_routes)
        .merge(directory_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state);

    match cors_origin.and_then(|origin| origin.parse::<HeaderValue>().ok()) {
        Some(origin) => router.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::PUT])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                ]),
        ),
        None => router,
    }
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
