//! Route table, mounted both at the root and under `/api`.

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::AppState;
use crate::handlers;

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.cors_origins);
    let routes = api_routes();

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/register", post(handlers::register))
        .route("/token", post(handlers::token))
        .route("/me", get(handlers::me))
        .route("/analyze", post(handlers::analyze))
        .route("/analyze-public", post(handlers::analyze_public))
        .route("/model-info", get(handlers::model_info))
        .route("/model-metrics", get(handlers::model_metrics))
}

/// Credentialed CORS for an explicit origin list (wildcards are not allowed
/// with credentials).
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
}
