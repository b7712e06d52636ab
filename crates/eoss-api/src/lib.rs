//! Request Handler Glue (§4.6): HTTP routing, status mapping, and the
//! per-request access log.

mod glue;
mod handlers;
mod state;

pub use state::AppState;

use axum::routing::{delete, get, head, put};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

/// Builds the full `/eoss/v1` router. Callers are expected to serve this with
/// `into_make_service_with_connect_info::<SocketAddr>()` so [`glue::request_glue`]
/// can read the caller's address for the access log.
pub fn build_router(state: AppState) -> Router {
    let object_route = get(handlers::get_object)
        .put(handlers::put_object)
        .head(handlers::head_object)
        .delete(handlers::delete_object)
        .fallback(handlers::bad_method);

    Router::new()
        .route("/eoss/v1/object/:filename", object_route)
        .route("/eoss/v1/stats", get(handlers::stats))
        .fallback(handlers::fallback_unknown_route)
        .layer(middleware::from_fn(glue::request_glue))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
