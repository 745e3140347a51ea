use crate::assembler::StoredBlob;
use crate::config::MANIFEST_V2_MEDIA_TYPE;
use crate::error::CarbideError;
use crate::registry::facade::RegistryFacade;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const OCI_MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
pub const ARTIFACT_TYPE: &str = "application/vnd.unknown.artifact.v1";
pub const EMPTY_CONFIG_MEDIA_TYPE: &str = "application/vnd.oci.empty.v1+json";
/// sha256 of `{}`
pub const EMPTY_CONFIG_DIGEST: &str =
    "sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a";
pub const EMPTY_CONFIG_DATA: &str = "e30=";
pub const LAYER_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar";
pub const TITLE_ANNOTATION: &str = "org.opencontainers.image.title";

/// Shared state of the facade routes
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<RegistryFacade>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticManifest {
    pub schema_version: u32,
    pub media_type: String,
    pub artifact_type: String,
    pub config: ConfigDescriptor,
    pub layers: Vec<LayerDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDescriptor {
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDescriptor {
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    pub annotations: BTreeMap<String, String>,
}

impl SyntheticManifest {
    /// Single-layer artifact manifest pointing at a stored bundle.
    pub fn for_layer(repo: &str, blob: &StoredBlob) -> Self {
        let mut annotations = BTreeMap::new();
        annotations.insert(
            TITLE_ANNOTATION.to_string(),
            format!("{}-manifest.yaml", repo),
        );

        Self {
            schema_version: 2,
            media_type: OCI_MANIFEST_MEDIA_TYPE.to_string(),
            artifact_type: ARTIFACT_TYPE.to_string(),
            config: ConfigDescriptor {
                media_type: EMPTY_CONFIG_MEDIA_TYPE.to_string(),
                digest: EMPTY_CONFIG_DIGEST.to_string(),
                size: 2,
                data: EMPTY_CONFIG_DATA.to_string(),
            },
            layers: vec![LayerDescriptor {
                media_type: LAYER_MEDIA_TYPE.to_string(),
                digest: blob.digest.clone(),
                size: blob.size as u64,
                annotations,
            }],
        }
    }

    pub fn layer_digest(&self) -> Option<&str> {
        self.layers.first().map(|layer| layer.digest.as_str())
    }
}

/// `{"detail": ...}` error body
pub fn detail_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "detail": detail.into() })),
    )
        .into_response()
}

fn error_response(error: &CarbideError) -> Response {
    if error.is_not_found() {
        return detail_response(StatusCode::NOT_FOUND, "Manifest not found");
    }
    match error {
        CarbideError::ChartNotFound { .. } => {
            detail_response(StatusCode::BAD_REQUEST, error.to_string())
        }
        _ => detail_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    }
}

pub async fn get_manifest(
    State(state): State<AppState>,
    Path((repo, tag)): Path<(String, String)>,
) -> Response {
    tracing::debug!(repo = %repo, tag = %tag, "GET manifest request");

    match state.facade.manifest(&repo, &tag).await {
        Ok(manifest) => match serde_json::to_vec(&manifest) {
            Ok(body) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, MANIFEST_V2_MEDIA_TYPE.to_string()),
                    (header::CONTENT_LENGTH, body.len().to_string()),
                ],
                body,
            )
                .into_response(),
            Err(e) => error_response(&CarbideError::from(e)),
        },
        Err(e) => {
            if e.is_not_found() {
                tracing::debug!(repo = %repo, tag = %tag, error = %e, "Manifest not found");
            } else {
                tracing::error!(repo = %repo, tag = %tag, error = %e, "Manifest request failed");
            }
            error_response(&e)
        }
    }
}

/// Same status and headers as GET, without a body.
pub async fn head_manifest(
    state: State<AppState>,
    path: Path<(String, String)>,
) -> Response {
    let (parts, _) = get_manifest(state, path).await.into_parts();
    Response::from_parts(parts, axum::body::Body::empty())
}
