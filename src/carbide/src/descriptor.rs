//! Static table of known projects and the recipes used to bundle them.
//!
//! Every template may contain a `{version}` placeholder that is replaced with
//! the requested tag at resolution time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single downloadable file, e.g. a release binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    pub path: String,
}

/// A remote text file listing one image reference per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageListItem {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub platform: String,
}

/// Chart coordinate in a Helm repository (`http(s)://`) or OCI registry (`oci://`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartItem {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    pub name: String,
    pub version: String,
}

impl ChartItem {
    pub fn new(
        repo_url: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            repo_url: repo_url.into(),
            name: name.into(),
            version: version.into(),
        }
    }
}

/// How to obtain one category of assets for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items")]
pub enum Recipe {
    Files(Vec<FileItem>),
    Charts(Vec<ChartItem>),
    #[serde(rename = "Images-list")]
    ImagesList(Vec<ImageListItem>),
    #[serde(rename = "Charts-images")]
    ChartsImages(Vec<ChartItem>),
}

impl Recipe {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Recipe::Files(_) => "Files",
            Recipe::Charts(_) => "Charts",
            Recipe::ImagesList(_) => "Images-list",
            Recipe::ChartsImages(_) => "Charts-images",
        }
    }
}

/// Read-only project -> recipes registry.
#[derive(Debug, Clone, Default)]
pub struct ProjectTable {
    projects: HashMap<String, Vec<Recipe>>,
}

impl ProjectTable {
    pub fn new(projects: HashMap<String, Vec<Recipe>>) -> Self {
        Self { projects }
    }

    /// Built-in projects, with `extra` entries replacing same-named ones.
    pub fn with_overrides(extra: &HashMap<String, Vec<Recipe>>) -> Self {
        let mut table = Self::builtin();
        for (name, recipes) in extra {
            table.projects.insert(name.clone(), recipes.clone());
        }
        table
    }

    pub fn lookup(&self, project: &str) -> Option<&[Recipe]> {
        self.projects.get(project).map(Vec::as_slice)
    }

    pub fn contains(&self, project: &str) -> bool {
        self.projects.contains_key(project)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.projects.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn builtin() -> Self {
        let mut projects = HashMap::new();

        let k3s_release = "https://github.com/k3s-io/k3s/releases/download/{version}";
        projects.insert(
            "k3s".to_string(),
            vec![
                Recipe::Files(files(
                    k3s_release,
                    &[
                        "k3s",
                        "k3s-arm64",
                        "k3s-armhf",
                        "k3s-airgap-images-amd64.tar.zst",
                        "k3s-airgap-images-arm.tar.zst",
                        "k3s-airgap-images-arm64.tar.zst",
                    ],
                )),
                Recipe::ImagesList(vec![ImageListItem {
                    url: format!("{}/k3s-images.txt", k3s_release),
                    name: None,
                    platform: "all".to_string(),
                }]),
            ],
        );

        let rke2_release = "https://github.com/rancher/rke2/releases/download/{version}";
        let mut rke2_files = vec![FileItem {
            path: "https://raw.githubusercontent.com/rancher/rke2/refs/tags/{version}/install.sh"
                .to_string(),
        }];
        rke2_files.extend(files(
            rke2_release,
            &[
                "rke2-images.linux-amd64.tar.zst",
                "rke2.linux-amd64.tar.gz",
                "sha256sum-amd64.txt",
                "rke2.linux-amd64",
                "rke2-images.linux-arm64.tar.zst",
                "rke2.linux-arm64.tar.gz",
                "sha256sum-arm64.txt",
                "rke2.linux-arm64",
            ],
        ));
        projects.insert(
            "rke2".to_string(),
            vec![
                Recipe::Files(rke2_files),
                Recipe::ImagesList(vec![
                    ImageListItem {
                        url: format!("{}/rke2-images-all.linux-arm64.txt", rke2_release),
                        name: Some("arm64".to_string()),
                        platform: "linux/arm64".to_string(),
                    },
                    ImageListItem {
                        url: format!("{}/rke2-images-all.linux-amd64.txt", rke2_release),
                        name: Some("amd64".to_string()),
                        platform: "linux/amd64".to_string(),
                    },
                ]),
            ],
        );

        let rancher_charts = vec![
            ChartItem::new("https://charts.jetstack.io", "cert-manager", "v1.16.3"),
            ChartItem::new(
                "https://releases.rancher.com/server-charts/latest",
                "rancher",
                "{version}",
            ),
        ];
        projects.insert(
            "rancher".to_string(),
            vec![
                Recipe::Charts(rancher_charts.clone()),
                Recipe::ChartsImages(rancher_charts),
                Recipe::ImagesList(vec![ImageListItem {
                    url: "https://github.com/rancher/rancher/releases/download/v{version}/rancher-images.txt"
                        .to_string(),
                    name: None,
                    platform: "all".to_string(),
                }]),
            ],
        );

        projects.insert(
            "longhorn".to_string(),
            vec![
                Recipe::Charts(vec![ChartItem::new(
                    "https://charts.longhorn.io",
                    "longhorn",
                    "{version}",
                )]),
                Recipe::ImagesList(vec![ImageListItem {
                    url: "https://raw.githubusercontent.com/longhorn/longhorn/v{version}/deploy/longhorn-images.txt"
                        .to_string(),
                    name: None,
                    platform: "all".to_string(),
                }]),
            ],
        );

        Self { projects }
    }
}

fn files(base: &str, names: &[&str]) -> Vec<FileItem> {
    names
        .iter()
        .map(|name| FileItem {
            path: format!("{}/{}", base, name),
        })
        .collect()
}
