use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::{from_fn, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lockstep_core::AppState;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

pub mod error;
pub mod routes;

pub fn build_router() -> Router<AppState> {
    let cors = build_cors_layer();
    Router::new()
        // Health
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/v1/metrics", get(metrics))
        // Stream control
        .route(
            "/api/v1/stream",
            post(routes::stream::start_stream).delete(routes::stream::clear_stream),
        )
        .route("/api/v1/stream/play", post(routes::stream::play))
        .route("/api/v1/stream/pause", post(routes::stream::pause))
        .route("/api/v1/stream/resume", post(routes::stream::resume))
        .route("/api/v1/stream/force-play", post(routes::stream::force_play))
        // Library and viewers
        .route("/api/v1/library", get(routes::library::list_library))
        .route("/api/v1/viewers", get(routes::stream::viewer_counts))
        // Middleware layers
        .layer(cors)
        .layer(from_fn(rate_limit_middleware))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn build_cors_layer() -> tower_http::cors::CorsLayer {
    // The command surface is driven by external front ends (the chat bot,
    // an admin page) that may live on any origin.
    tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "lockstep",
            "server_name": state.config.server_name,
        })),
    )
}

async fn metrics() -> impl IntoResponse {
    let requests = REQUEST_COUNT.load(Ordering::Relaxed);
    let limited = RATE_LIMITED_COUNT.load(Ordering::Relaxed);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        format!(
            "lockstep_up 1\nlockstep_http_requests_total {}\nlockstep_http_rate_limited_total {}\n",
            requests, limited
        ),
    )
}

static RATE_LIMIT_STATE: OnceLock<Mutex<HashMap<String, (i64, u32)>>> = OnceLock::new();
static REQUEST_COUNT: AtomicU64 = AtomicU64::new(0);
static RATE_LIMITED_COUNT: AtomicU64 = AtomicU64::new(0);

const MAX_REQUESTS_PER_SECOND: u32 = 60;

fn rate_limit_state() -> &'static Mutex<HashMap<String, (i64, u32)>> {
    RATE_LIMIT_STATE.get_or_init(|| Mutex::new(HashMap::new()))
}

async fn rate_limit_middleware(req: Request, next: Next) -> Response {
    REQUEST_COUNT.fetch_add(1, Ordering::Relaxed);
    let now = chrono::Utc::now().timestamp();
    let key = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("local")
        .to_string();

    let allowed = {
        let mut map = match rate_limit_state().lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = map.entry(key).or_insert((now, 0));
        if entry.0 != now {
            *entry = (now, 0);
        }
        if entry.1 >= MAX_REQUESTS_PER_SECOND {
            false
        } else {
            entry.1 += 1;
            true
        }
    };

    if !allowed {
        RATE_LIMITED_COUNT.fetch_add(1, Ordering::Relaxed);
        return crate::error::ApiError::RateLimited.into_response();
    }

    next.run(req).await
}
