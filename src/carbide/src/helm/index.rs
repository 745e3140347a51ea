// Helm repository index.yaml lookup

use crate::error::{CarbideError, Result};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartIndex {
    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartVersion>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartVersion {
    #[serde(deserialize_with = "version_string")]
    pub version: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Unquoted versions such as `2` or `1.5` parse as YAML numbers
fn version_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected chart version {:?}",
            other
        ))),
    }
}

/// `<repo>/index.yaml`, tolerating a trailing slash on the repository URL
pub fn index_url(repo_url: &str) -> String {
    if repo_url.ends_with('/') {
        format!("{}index.yaml", repo_url)
    } else {
        format!("{}/index.yaml", repo_url)
    }
}

/// Archive URLs in an index may be absolute or relative to the repository
pub fn resolve_archive_url(repo_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if repo_url.ends_with('/') {
        format!("{}{}", repo_url, url)
    } else {
        format!("{}/{}", repo_url, url)
    }
}

impl ChartIndex {
    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(serde_yaml::from_slice(data)?)
    }

    /// Packaged `.tgz` URLs of `chart` at exactly `version`.
    pub fn archive_urls(&self, repo_url: &str, chart: &str, version: &str) -> Result<Vec<String>> {
        let not_found = || CarbideError::ChartNotFound {
            chart: chart.to_string(),
            version: version.to_string(),
            repo: repo_url.to_string(),
        };

        let versions = self.entries.get(chart).ok_or_else(not_found)?;
        let entry = versions
            .iter()
            .find(|v| v.version == version)
            .ok_or_else(not_found)?;

        Ok(entry
            .urls
            .iter()
            .filter(|url| url.ends_with(".tgz"))
            .map(|url| resolve_archive_url(repo_url, url))
            .collect())
    }
}
