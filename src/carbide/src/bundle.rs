//! Bundle documents: the structured content listing synthesized for a project.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

pub const BUNDLE_API_VERSION: &str = "content.hauler.cattle.io/v1alpha1";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileEntry {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChartEntry {
    pub name: String,
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImageEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

impl ImageEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: None,
        }
    }

    pub fn with_platform(name: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: Some(platform.into()),
        }
    }
}

/// Resolved entries of a single document. The variant decides both the
/// document `kind` and the key under `spec`, so the two cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BundleEntries {
    Files(Vec<FileEntry>),
    Charts(Vec<ChartEntry>),
    Images(Vec<ImageEntry>),
}

impl BundleEntries {
    pub fn kind(&self) -> &'static str {
        match self {
            BundleEntries::Files(_) => "Files",
            BundleEntries::Charts(_) => "Charts",
            BundleEntries::Images(_) => "Images",
        }
    }

    pub fn spec_key(&self) -> &'static str {
        match self {
            BundleEntries::Files(_) => "files",
            BundleEntries::Charts(_) => "charts",
            BundleEntries::Images(_) => "images",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BundleEntries::Files(v) => v.len(),
            BundleEntries::Charts(v) => v.len(),
            BundleEntries::Images(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleDocument {
    pub name: String,
    pub entries: BundleEntries,
}

impl BundleDocument {
    /// `label` is the project name, optionally already suffixed with platforms.
    pub fn new(label: &str, entries: BundleEntries) -> Self {
        Self {
            name: format!("{}-airgap-{}", label, entries.spec_key()),
            entries,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.entries.kind()
    }
}

#[derive(Serialize)]
struct Metadata<'a> {
    name: &'a str,
}

impl Serialize for BundleDocument {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let spec = BTreeMap::from([(self.entries.spec_key(), &self.entries)]);

        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("apiVersion", BUNDLE_API_VERSION)?;
        map.serialize_entry("kind", self.kind())?;
        map.serialize_entry("metadata", &Metadata { name: &self.name })?;
        map.serialize_entry("spec", &spec)?;
        map.end()
    }
}
