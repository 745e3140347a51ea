use crate::descriptor::Recipe;
use crate::error::{CarbideError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

/// Default Docker registry name
pub const DEFAULT_REGISTRY_NAME: &str = "docker.io";

/// Default Docker registry URL
pub const DEFAULT_REGISTRY_URL: &str = "https://registry-1.docker.io";

/// Namespace for unqualified Docker Hub images (`nginx` -> `library/nginx`)
pub const DEFAULT_NAMESPACE: &str = "library";

/// Accept header for registry manifest existence checks
pub const MANIFEST_V2_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Content type of stored bundle blobs
pub const BLOB_CONTENT_TYPE: &str = "application/x-yaml";

/// Parsed default configuration (built once at first access)
static DEFAULT_CONFIG: OnceLock<Config> = OnceLock::new();

/// How image references are discovered for Charts-images recipes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartImageStrategy {
    /// Render the chart with the helm CLI and walk the resources
    Render,
    /// Download the packaged chart and probe image/tag candidates
    Inspect,
    /// Render, falling back to inspection when rendering fails
    #[default]
    Auto,
}

impl std::str::FromStr for ChartImageStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "render" => Ok(ChartImageStrategy::Render),
            "inspect" => Ok(ChartImageStrategy::Inspect),
            "auto" => Ok(ChartImageStrategy::Auto),
            _ => Err(format!("Unknown chart image strategy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub helm: HelmConfig,
    #[serde(default)]
    pub registry: ProbeConfig,
    /// Extra projects, replacing built-in ones with the same name
    #[serde(default)]
    pub projects: HashMap<String, Vec<Recipe>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_storage_directory")]
    pub directory: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            directory: default_storage_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpstreamConfig {
    /// No timeout unless configured
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelmConfig {
    #[serde(default = "default_helm_binary")]
    pub binary: String,
    #[serde(default)]
    pub chart_images: ChartImageStrategy,
    #[serde(default = "default_true")]
    pub include_crds: bool,
}

impl Default for HelmConfig {
    fn default() -> Self {
        Self {
            binary: default_helm_binary(),
            chart_images: ChartImageStrategy::default(),
            include_crds: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProbeConfig {
    /// Credentials keyed by registry host (e.g. `docker.io`, `ghcr.io`)
    #[serde(default)]
    pub auth: HashMap<String, RegistryAuth>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_storage_directory() -> String {
    "cache/carbide".to_string()
}

fn default_helm_binary() -> String {
    "helm".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Build the default configuration directly in Rust code (no TOML parsing)
    fn build_default() -> Config {
        Config {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            upstream: UpstreamConfig::default(),
            helm: HelmConfig::default(),
            registry: ProbeConfig::default(),
            projects: HashMap::new(),
        }
    }

    /// Get the default configuration (built in Rust code, cached in OnceLock)
    pub(crate) fn default_parsed() -> &'static Config {
        DEFAULT_CONFIG.get_or_init(Self::build_default)
    }

    pub fn from_toml_str(s: &str) -> Result<Config> {
        let config: Config = toml::from_str(s)
            .map_err(|e| CarbideError::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CarbideError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Apply `PORT`, `CARBIDE_BIND_ADDRESS`, `CARBIDE_STORAGE_DIR`, `HELM_BIN` and
    /// `CARBIDE_CHART_IMAGES`.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| CarbideError::Config(format!("PORT is not a valid port: {}", port)))?;
        }
        if let Some(bind) = lookup("CARBIDE_BIND_ADDRESS") {
            self.server.bind_address = bind;
        }
        if let Some(dir) = lookup("CARBIDE_STORAGE_DIR") {
            self.storage.directory = dir;
        }
        if let Some(helm) = lookup("HELM_BIN") {
            self.helm.binary = helm;
        }
        if let Some(strategy) = lookup("CARBIDE_CHART_IMAGES") {
            self.helm.chart_images = strategy.parse().map_err(CarbideError::Config)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(CarbideError::Config("server.port must not be 0".to_string()));
        }
        if self.helm.binary.trim().is_empty() {
            return Err(CarbideError::Config("helm.binary must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_parsed().clone()
    }
}
