pub mod archive;
pub mod assembler;
pub mod bundle;
pub mod cache;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod helm;
pub mod images;
pub mod probe;
pub mod registry;
pub mod resolver;
pub mod server;

pub use cache::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use config::{ChartImageStrategy, Config, StorageBackend};
pub use descriptor::{ProjectTable, Recipe};
pub use error::{CarbideError, Result};
pub use registry::{RegistryFacade, SyntheticManifest};
pub use resolver::{AssetResolver, VersionTag};

/// Start the registry facade with the given configuration
pub async fn start_server(config: Config) -> Result<tokio::task::JoinHandle<()>> {
    server::start_server(config).await
}
