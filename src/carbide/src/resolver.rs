//! Turns project recipes into concrete bundle documents.

use crate::archive::{extract_tgz, scan_image_tags, Candidates};
use crate::bundle::{BundleDocument, BundleEntries, ChartEntry, FileEntry, ImageEntry};
use crate::config::ChartImageStrategy;
use crate::descriptor::{ChartItem, FileItem, ImageListItem, Recipe};
use crate::error::{CarbideError, Result};
use crate::fetch::RawFetcher;
use crate::helm::index::{index_url, ChartIndex};
use crate::helm::render::{is_oci, ChartRenderers};
use crate::images::collect_images;
use crate::probe::ImageProbe;
use futures::future::try_join_all;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

const VERSION_PLACEHOLDER: &str = "{version}";

/// Version substituted into recipe templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag(String);

impl VersionTag {
    /// Pre-release style tags (`v1.2.3-rc1`) become build metadata (`v1.2.3+rc1`).
    pub fn normalized(tag: &str) -> Self {
        Self(tag.replace('-', "+"))
    }

    /// Tag used exactly as given, e.g. the version of a synthetic chart reference.
    pub fn verbatim(tag: &str) -> Self {
        Self(tag.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn substitute(&self, template: &str) -> String {
        template.replace(VERSION_PLACEHOLDER, &self.0)
    }
}

/// Drop repeated items, keeping the first occurrence of each.
pub fn dedup_preserving_order<T: Eq + Hash + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

pub struct AssetResolver {
    fetcher: Arc<dyn RawFetcher>,
    renderers: ChartRenderers,
    probe: Arc<dyn ImageProbe>,
    strategy: ChartImageStrategy,
}

impl AssetResolver {
    pub fn new(
        fetcher: Arc<dyn RawFetcher>,
        renderers: ChartRenderers,
        probe: Arc<dyn ImageProbe>,
        strategy: ChartImageStrategy,
    ) -> Self {
        Self {
            fetcher,
            renderers,
            probe,
            strategy,
        }
    }

    /// Resolve every recipe concurrently; output keeps the recipe order and
    /// the first failure aborts the whole request.
    pub async fn resolve_all(
        &self,
        project: &str,
        recipes: &[Recipe],
        tag: &VersionTag,
    ) -> Result<Vec<BundleDocument>> {
        try_join_all(recipes.iter().map(|recipe| self.resolve(project, recipe, tag))).await
    }

    pub async fn resolve(
        &self,
        project: &str,
        recipe: &Recipe,
        tag: &VersionTag,
    ) -> Result<BundleDocument> {
        tracing::debug!(
            project = %project,
            kind = recipe.kind_name(),
            version = %tag.as_str(),
            "Resolving recipe"
        );

        match recipe {
            Recipe::Files(items) => Ok(resolve_files(project, items, tag)),
            Recipe::Charts(items) => Ok(resolve_charts(project, items, tag)),
            Recipe::ImagesList(items) => self.resolve_image_lists(project, items, tag).await,
            Recipe::ChartsImages(items) => self.resolve_chart_images(project, items, tag).await,
        }
    }

    async fn resolve_image_lists(
        &self,
        project: &str,
        items: &[ImageListItem],
        tag: &VersionTag,
    ) -> Result<BundleDocument> {
        let payloads = try_join_all(items.iter().map(|item| {
            let url = tag.substitute(&item.url);
            async move { self.fetcher.fetch(&url).await }
        }))
        .await?;

        let mut label = project.to_string();
        let mut images = Vec::new();
        for (item, payload) in items.iter().zip(payloads) {
            let text = String::from_utf8_lossy(&payload);
            images.extend(
                text.lines()
                    .filter(|line| !line.is_empty())
                    .map(|line| ImageEntry::with_platform(line, item.platform.clone())),
            );
            label.push('-');
            label.push_str(&item.platform);
        }

        Ok(BundleDocument::new(&label, BundleEntries::Images(images)))
    }

    async fn resolve_chart_images(
        &self,
        project: &str,
        items: &[ChartItem],
        tag: &VersionTag,
    ) -> Result<BundleDocument> {
        let per_chart = try_join_all(items.iter().map(|item| {
            let chart = ChartItem {
                version: tag.substitute(&item.version),
                ..item.clone()
            };
            async move { self.chart_images(&chart).await }
        }))
        .await?;

        let images = dedup_preserving_order(per_chart.into_iter().flatten().collect());
        Ok(BundleDocument::new(project, BundleEntries::Images(images)))
    }

    /// Images referenced by one chart, using the configured discovery strategy.
    pub async fn chart_images(&self, chart: &ChartItem) -> Result<Vec<ImageEntry>> {
        match self.strategy {
            ChartImageStrategy::Render => self.rendered_images(chart).await,
            ChartImageStrategy::Inspect => self.inspected_images(chart).await,
            ChartImageStrategy::Auto => match self.rendered_images(chart).await {
                Ok(images) => Ok(images),
                Err(e) if !is_oci(&chart.repo_url) => {
                    tracing::warn!(
                        chart = %chart.name,
                        version = %chart.version,
                        error = %e,
                        "Chart render failed, falling back to archive inspection"
                    );
                    self.inspected_images(chart).await
                }
                Err(e) => Err(e),
            },
        }
    }

    async fn rendered_images(&self, chart: &ChartItem) -> Result<Vec<ImageEntry>> {
        let documents = self.renderers.for_repo(&chart.repo_url).render(chart).await?;
        Ok(documents
            .iter()
            .flat_map(collect_images)
            .map(ImageEntry::new)
            .collect())
    }

    /// index.yaml -> packaged archive -> key/value scan -> registry probe.
    async fn inspected_images(&self, chart: &ChartItem) -> Result<Vec<ImageEntry>> {
        if is_oci(&chart.repo_url) {
            return Err(CarbideError::Render(format!(
                "archive inspection needs an HTTP chart repository, got {}",
                chart.repo_url
            )));
        }

        let index_data = self.fetcher.fetch(&index_url(&chart.repo_url)).await?;
        let index = ChartIndex::parse(&index_data)?;
        let archive_urls = index.archive_urls(&chart.repo_url, &chart.name, &chart.version)?;

        let mut pairs = Vec::new();
        for url in archive_urls {
            let archive = self.fetcher.fetch(&url).await?;
            let files = extract_tgz(&archive)?;

            let mut candidates = Candidates::default();
            for content in files.values() {
                candidates.extend(scan_image_tags(content));
            }

            pairs.extend(self.confirmed_pairs(candidates).await);
        }

        Ok(dedup_preserving_order(pairs)
            .into_iter()
            .map(ImageEntry::new)
            .collect())
    }

    /// Pair every image candidate with every tag candidate that still exists.
    /// A tag that fails for one image is not tried for the following ones.
    async fn confirmed_pairs(&self, candidates: Candidates) -> Vec<String> {
        let images = dedup_preserving_order(candidates.images);
        let mut tags = dedup_preserving_order(candidates.tags);

        let mut pairs = Vec::new();
        for image in &images {
            let mut surviving = Vec::with_capacity(tags.len());
            for tag in tags {
                let reference = format!("{}:{}", image, tag);
                if self.probe.exists(&reference).await {
                    pairs.push(reference);
                    surviving.push(tag);
                }
            }
            tags = surviving;
        }

        tracing::debug!(
            images = images.len(),
            confirmed = pairs.len(),
            "Probed chart image candidates"
        );
        pairs
    }
}

fn resolve_files(project: &str, items: &[FileItem], tag: &VersionTag) -> BundleDocument {
    let files = items
        .iter()
        .map(|item| FileEntry {
            path: tag.substitute(&item.path),
        })
        .collect();
    BundleDocument::new(project, BundleEntries::Files(files))
}

fn resolve_charts(project: &str, items: &[ChartItem], tag: &VersionTag) -> BundleDocument {
    let charts = items
        .iter()
        .map(|item| ChartEntry {
            name: item.name.clone(),
            repo_url: item.repo_url.clone(),
            version: tag.substitute(&item.version),
        })
        .collect();
    BundleDocument::new(project, BundleEntries::Charts(charts))
}
