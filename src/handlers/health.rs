use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::models::status::{NotFoundResponse, PLACEHOLDER_MESSAGE, StatusResponse};

/// Request targets that answer with the placeholder status payload.
pub const STATUS_PATHS: [&str; 4] = ["/", "/api", "/api/health", "/health"];

/// The request target as the client sent it: path plus query, if any.
pub fn request_target(uri: &Uri) -> &str {
    uri.path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path())
}

/// Sole handler of the placeholder backend. A target only counts as a status
/// path when it matches exactly, query string included.
pub async fn respond(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let target = request_target(&uri);
    if STATUS_PATHS.contains(&target) {
        return Json(StatusResponse {
            status: "ok",
            message: PLACEHOLDER_MESSAGE,
            database: &state.config.database,
        })
        .into_response();
    }

    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            status: "not_found",
            path: target.to_string(),
        }),
    )
        .into_response()
}
