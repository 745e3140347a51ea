use crate::cache::{BlobStore, FsBlobStore, MemoryBlobStore};
use crate::config::{Config, StorageBackend};
use crate::descriptor::ProjectTable;
use crate::error::{CarbideError, Result};
use crate::fetch::{build_client, HttpFetcher};
use crate::helm::ChartRenderers;
use crate::probe::RegistryProbe;
use crate::registry::manifest::detail_response;
use crate::registry::{
    get_blob, get_manifest, head_blob, head_manifest, AppState, RegistryFacade,
};
use crate::resolver::AssetResolver;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

const MANIFEST_FILE_SUFFIX: &str = "-manifest.yaml";
const MANIFESTS_SEGMENT: &str = "/manifests/";
const BLOBS_SEGMENT: &str = "/blobs/";

/// Request addressed below `/v2/hauler/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaulerRequest {
    Manifest { repo: String, tag: String },
    Blob { repo: String, digest: String },
}

/// Parse `{repo}-manifest.yaml/manifests/{tag}` or `{repo}-manifest.yaml/blobs/{digest}`.
pub fn parse_hauler_path(path: &str) -> Option<HaulerRequest> {
    let path = path.trim_start_matches('/');

    let split = |segment: &str| -> Option<(String, String)> {
        let idx = path.rfind(segment)?;
        let repo = path[..idx].strip_suffix(MANIFEST_FILE_SUFFIX)?;
        let reference = &path[idx + segment.len()..];
        if repo.is_empty() || repo.contains('/') || reference.is_empty() || reference.contains('/')
        {
            return None;
        }
        Some((repo.to_string(), reference.to_string()))
    };

    if let Some((repo, tag)) = split(MANIFESTS_SEGMENT) {
        Some(HaulerRequest::Manifest { repo, tag })
    } else {
        split(BLOBS_SEGMENT).map(|(repo, digest)| HaulerRequest::Blob { repo, digest })
    }
}

// Axum's :name only matches single segments, so the tail is parsed manually
async fn get_hauler_wrapper(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Response {
    tracing::debug!(path = %path, "Received hauler request path");

    match parse_hauler_path(&path) {
        Some(HaulerRequest::Manifest { repo, tag }) => {
            get_manifest(State(state), Path((repo, tag))).await
        }
        Some(HaulerRequest::Blob { repo, digest }) => {
            get_blob(State(state), Path((repo, digest))).await
        }
        None => detail_response(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn head_hauler_wrapper(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Response {
    match parse_hauler_path(&path) {
        Some(HaulerRequest::Manifest { repo, tag }) => {
            head_manifest(State(state), Path((repo, tag))).await
        }
        Some(HaulerRequest::Blob { repo, digest }) => {
            head_blob(State(state), Path((repo, digest))).await
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(api_version))
        .route("/v2/", get(api_version))
        .route(
            "/v2/hauler/*path",
            get(get_hauler_wrapper).head(head_hauler_wrapper),
        )
        .route("/health", get(health))
        .with_state(app_state)
}

async fn api_version() -> impl IntoResponse {
    tracing::debug!("GET /v2/ - API version request");
    StatusCode::OK
}

async fn health() -> impl IntoResponse {
    tracing::debug!("GET /health - Health check request");
    (StatusCode::OK, "ok")
}

pub fn build_store(config: &Config) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.storage.backend {
        StorageBackend::Filesystem => Arc::new(FsBlobStore::new(PathBuf::from(
            &config.storage.directory,
        ))?),
        StorageBackend::Memory => Arc::new(MemoryBlobStore::new()),
    };
    Ok(store)
}

/// Wire the production collaborators described by `config`.
pub fn build_app_state(config: &Config) -> Result<AppState> {
    let client = build_client(&config.upstream)?;
    let fetcher = Arc::new(HttpFetcher::with_client(client.clone()));
    let probe = Arc::new(RegistryProbe::new(client, config.registry.auth.clone()));
    let resolver = AssetResolver::new(
        fetcher,
        ChartRenderers::helm(&config.helm),
        probe,
        config.helm.chart_images,
    );

    let facade = RegistryFacade::new(
        ProjectTable::with_overrides(&config.projects),
        resolver,
        build_store(config)?,
    );

    Ok(AppState {
        facade: Arc::new(facade),
    })
}

pub async fn start_server(config: Config) -> Result<tokio::task::JoinHandle<()>> {
    config.validate()?;
    let app_state = build_app_state(&config)?;

    tracing::info!(
        projects = ?app_state.facade.table().names(),
        storage = ?config.storage.backend,
        chart_images = ?config.helm.chart_images,
        "Registry facade configured"
    );

    let app = build_router(app_state);
    let addr = format!("{}:{}", config.server.bind_address, config.server.port);

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        error!("Failed to bind HTTP server to {}: {}", addr, e);
        CarbideError::Io(e)
    })?;

    tracing::info!("HTTP server listening on {}", addr);

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error after startup: {}", e);
        } else {
            tracing::info!("HTTP server stopped");
        }
    }))
}
