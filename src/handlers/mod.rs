pub mod health;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// The placeholder backend: every request goes through one handler that
/// compares the full request target against the four status paths.
pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(health::respond)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
