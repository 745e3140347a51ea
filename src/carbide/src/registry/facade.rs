//! Manifest synthesis and blob lookup behind the `/v2/hauler` routes.

use crate::assembler::{assemble, blob_key, StoredBlob};
use crate::cache::BlobStore;
use crate::descriptor::{ProjectTable, Recipe};
use crate::error::{CarbideError, Result};
use crate::registry::manifest::SyntheticManifest;
use crate::registry::tag::ChartTag;
use crate::resolver::{AssetResolver, VersionTag};
use std::sync::Arc;

const DIGEST_TAG_PREFIX: &str = "sha256";

pub struct RegistryFacade {
    table: ProjectTable,
    resolver: AssetResolver,
    store: Arc<dyn BlobStore>,
}

impl RegistryFacade {
    pub fn new(table: ProjectTable, resolver: AssetResolver, store: Arc<dyn BlobStore>) -> Self {
        Self {
            table,
            resolver,
            store,
        }
    }

    pub fn table(&self) -> &ProjectTable {
        &self.table
    }

    /// Resolve, store and describe the bundle for `repo` at `tag`.
    pub async fn manifest(&self, repo: &str, tag: &str) -> Result<SyntheticManifest> {
        let stored = self.store_bundle(repo, tag).await?;
        Ok(SyntheticManifest::for_layer(repo, &stored))
    }

    async fn store_bundle(&self, repo: &str, tag: &str) -> Result<StoredBlob> {
        if tag.starts_with(DIGEST_TAG_PREFIX) {
            return Err(CarbideError::DigestReference(tag.to_string()));
        }

        let documents = if let Some(chart_tag) = ChartTag::parse(tag) {
            tracing::debug!(
                repo = %repo,
                chart_repo = %chart_tag.repo_url(),
                version = %chart_tag.version,
                "Decoded synthetic chart tag"
            );
            let chart = chart_tag.chart_item(repo);
            let recipes = [
                Recipe::Charts(vec![chart.clone()]),
                Recipe::ChartsImages(vec![chart]),
            ];
            self.resolver
                .resolve_all(repo, &recipes, &VersionTag::verbatim(&chart_tag.version))
                .await?
        } else {
            let recipes = self
                .table
                .lookup(repo)
                .filter(|recipes| !recipes.is_empty())
                .ok_or_else(|| CarbideError::UnknownProject(repo.to_string()))?;
            self.resolver
                .resolve_all(repo, recipes, &VersionTag::normalized(tag))
                .await?
        };

        assemble(self.store.as_ref(), repo, &documents).await
    }

    /// Stored bundle bytes, or `None` when nothing was stored under the digest.
    pub async fn blob(&self, repo: &str, digest: &str) -> Result<Option<Vec<u8>>> {
        self.store.get(&blob_key(repo, digest)).await
    }
}
