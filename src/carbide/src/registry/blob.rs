use crate::config::BLOB_CONTENT_TYPE;
use crate::registry::manifest::{detail_response, AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

pub async fn get_blob(
    State(state): State<AppState>,
    Path((repo, digest)): Path<(String, String)>,
) -> Response {
    tracing::debug!(repo = %repo, digest = %digest, "GET blob request");

    match state.facade.blob(&repo, &digest).await {
        Ok(Some(data)) => {
            tracing::debug!(repo = %repo, digest = %digest, size = data.len(), "Blob HIT");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, BLOB_CONTENT_TYPE.to_string()),
                    (header::CONTENT_LENGTH, data.len().to_string()),
                ],
                data,
            )
                .into_response()
        }
        Ok(None) => detail_response(StatusCode::NOT_FOUND, "Blob not found"),
        Err(e) => {
            tracing::error!(repo = %repo, digest = %digest, error = %e, "Blob lookup failed");
            detail_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub async fn head_blob(
    state: State<AppState>,
    path: Path<(String, String)>,
) -> Response {
    let (parts, _) = get_blob(state, path).await.into_parts();
    Response::from_parts(parts, Body::empty())
}
