//! Chart rendering through the `helm template` CLI.
//!
//! Two renderers share one CLI wrapper: classic chart repositories are
//! addressed with `--repo`, OCI registries with an `oci://` chart reference.

use crate::config::HelmConfig;
use crate::descriptor::ChartItem;
use crate::error::{CarbideError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio::process::Command;

pub const OCI_SCHEME: &str = "oci://";

pub fn is_oci(repo_url: &str) -> bool {
    repo_url.starts_with(OCI_SCHEME)
}

/// Produces the Kubernetes resources a chart renders to.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(&self, chart: &ChartItem) -> Result<Vec<serde_yaml::Value>>;
}

#[derive(Debug, Clone)]
pub struct HelmCli {
    binary: String,
    include_crds: bool,
}

impl HelmCli {
    pub fn new(config: &HelmConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            include_crds: config.include_crds,
        }
    }

    /// `helm template <release> <chart_ref> --version <v> [extra...]`
    async fn template(
        &self,
        release: &str,
        chart_ref: &str,
        version: &str,
        extra: &[&str],
    ) -> Result<String> {
        let mut command = Command::new(&self.binary);
        command
            .arg("template")
            .arg(release)
            .arg(chart_ref)
            .arg("--version")
            .arg(version)
            .args(extra);
        if self.include_crds {
            command.arg("--include-crds");
        }

        tracing::debug!(
            binary = %self.binary,
            chart = %chart_ref,
            version = %version,
            "Rendering chart"
        );

        let output = command.output().await.map_err(|e| {
            CarbideError::Render(format!("Failed to run {}: {}", self.binary, e))
        })?;

        if !output.status.success() {
            return Err(CarbideError::Render(format!(
                "helm template {} {} failed: {}",
                chart_ref,
                version,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| CarbideError::Render(format!("helm output is not UTF-8: {}", e)))
    }
}

/// Split a multi-document YAML stream, dropping empty documents.
pub fn split_documents(rendered: &str) -> Result<Vec<serde_yaml::Value>> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(rendered) {
        let value = serde_yaml::Value::deserialize(document)?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

/// Renders charts from a classic HTTP chart repository
pub struct HelmRepoRenderer {
    cli: HelmCli,
}

impl HelmRepoRenderer {
    pub fn new(cli: HelmCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl ChartRenderer for HelmRepoRenderer {
    async fn render(&self, chart: &ChartItem) -> Result<Vec<serde_yaml::Value>> {
        let rendered = self
            .cli
            .template(
                &chart.name,
                &chart.name,
                &chart.version,
                &["--repo", chart.repo_url.as_str()],
            )
            .await?;
        split_documents(&rendered)
    }
}

/// Renders charts stored as OCI artifacts (`oci://host/path/<name>`)
pub struct OciChartRenderer {
    cli: HelmCli,
}

impl OciChartRenderer {
    pub fn new(cli: HelmCli) -> Self {
        Self { cli }
    }

    pub fn chart_reference(chart: &ChartItem) -> String {
        format!("{}/{}", chart.repo_url.trim_end_matches('/'), chart.name)
    }
}

#[async_trait]
impl ChartRenderer for OciChartRenderer {
    async fn render(&self, chart: &ChartItem) -> Result<Vec<serde_yaml::Value>> {
        let reference = Self::chart_reference(chart);
        let rendered = self
            .cli
            .template(&chart.name, &reference, &chart.version, &[])
            .await?;
        split_documents(&rendered)
    }
}

/// Renderer selection by repository scheme
#[derive(Clone)]
pub struct ChartRenderers {
    repo: Arc<dyn ChartRenderer>,
    oci: Arc<dyn ChartRenderer>,
}

impl ChartRenderers {
    pub fn new(repo: Arc<dyn ChartRenderer>, oci: Arc<dyn ChartRenderer>) -> Self {
        Self { repo, oci }
    }

    pub fn helm(config: &HelmConfig) -> Self {
        let cli = HelmCli::new(config);
        Self::new(
            Arc::new(HelmRepoRenderer::new(cli.clone())),
            Arc::new(OciChartRenderer::new(cli)),
        )
    }

    pub fn for_repo(&self, repo_url: &str) -> &dyn ChartRenderer {
        if is_oci(repo_url) {
            self.oci.as_ref()
        } else {
            self.repo.as_ref()
        }
    }
}
