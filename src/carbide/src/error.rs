use thiserror::Error;

pub type Result<T> = std::result::Result<T, CarbideError>;

#[derive(Error, Debug)]
pub enum CarbideError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Unknown project: {0}")]
    UnknownProject(String),

    /// Manifests are only synthesized for named tags.
    #[error("Manifest lookup by digest is not supported: {0}")]
    DigestReference(String),

    #[error("File not found: {url} (status {status})")]
    UpstreamFetch { url: String, status: u16 },

    #[error("Chart '{chart}' version '{version}' not found in index of {repo}")]
    ChartNotFound {
        chart: String,
        version: String,
        repo: String,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Chart render error: {0}")]
    Render(String),
}

/// Failures while unpacking a packaged chart.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("not a valid gzip stream: {0}")]
    InvalidGzip(std::io::Error),

    #[error("not a valid tar archive: {0}")]
    InvalidTar(std::io::Error),

    #[error("corrupt archive member '{path}': {source}")]
    CorruptMember {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CarbideError {
    /// Errors the facade reports as a missing manifest.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CarbideError::UnknownProject(_)
                | CarbideError::DigestReference(_)
                | CarbideError::UpstreamFetch { .. }
        )
    }
}
