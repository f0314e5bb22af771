//! Route configuration.

use axum::http::header::SERVER;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::constants::http;

use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/simple/{project}", get(handlers::simple_index))
        .route("/simple/{project}/", get(handlers::simple_index))
        .route("/packs/{project}/{scheme}", get(handlers::packs_incomplete))
        .route("/packs/{project}/{scheme}/", get(handlers::packs_incomplete))
        .route("/packs/{project}/{scheme}/{*rest}", get(handlers::packs))
        .route("/storage/{project}/{filename}", get(handlers::storage))
        .route("/project/{name}", get(handlers::project_home))
        .layer(SetResponseHeaderLayer::if_not_present(
            SERVER,
            HeaderValue::from_static(http::USER_AGENT),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
