//! Asset resolver tests
//!
//! Recipes are resolved against in-memory fakes of the downloader, the chart
//! renderer and the registry probe, so every case is deterministic.

use async_trait::async_trait;
use bytes::Bytes;
use carbide::bundle::{BundleEntries, ImageEntry};
use carbide::config::ChartImageStrategy;
use carbide::descriptor::{ChartItem, ImageListItem, ProjectTable, Recipe};
use carbide::error::{CarbideError, Result};
use carbide::fetch::RawFetcher;
use carbide::helm::{ChartRenderer, ChartRenderers};
use carbide::probe::ImageProbe;
use carbide::resolver::{dedup_preserving_order, AssetResolver, VersionTag};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeFetcher {
    files: HashMap<String, Bytes>,
    requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn with(mut self, url: &str, body: impl Into<Bytes>) -> Self {
        self.files.insert(url.to_string(), body.into());
        self
    }
}

#[async_trait]
impl RawFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        self.requested.lock().unwrap().push(url.to_string());
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| CarbideError::UpstreamFetch {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Renders charts from canned YAML streams keyed by chart name
#[derive(Default)]
struct FakeRenderer {
    outputs: HashMap<String, String>,
    rendered: Mutex<Vec<String>>,
}

#[async_trait]
impl ChartRenderer for FakeRenderer {
    async fn render(&self, chart: &ChartItem) -> Result<Vec<serde_yaml::Value>> {
        self.rendered
            .lock()
            .unwrap()
            .push(format!("{}@{}", chart.name, chart.version));
        let output = self
            .outputs
            .get(&chart.name)
            .ok_or_else(|| CarbideError::Render(format!("cannot render {}", chart.name)))?;
        carbide::helm::render::split_documents(output)
    }
}

#[derive(Default)]
struct FakeProbe {
    existing: HashSet<String>,
    probed: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageProbe for FakeProbe {
    async fn exists(&self, reference: &str) -> bool {
        self.probed.lock().unwrap().push(reference.to_string());
        self.existing.contains(reference)
    }
}

fn resolver(
    fetcher: Arc<FakeFetcher>,
    renderer: Arc<FakeRenderer>,
    probe: Arc<FakeProbe>,
    strategy: ChartImageStrategy,
) -> AssetResolver {
    AssetResolver::new(
        fetcher,
        ChartRenderers::new(renderer.clone(), renderer),
        probe,
        strategy,
    )
}

fn build_tgz(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn images(entries: &BundleEntries) -> Vec<ImageEntry> {
    match entries {
        BundleEntries::Images(images) => images.clone(),
        other => panic!("expected images, got {:?}", other),
    }
}

#[test]
fn test_version_tag_normalization() {
    let tag = VersionTag::normalized("v1.30.2-k3s1");
    assert_eq!(tag.as_str(), "v1.30.2+k3s1");
    assert_eq!(
        tag.substitute("https://example.com/{version}/k3s"),
        "https://example.com/v1.30.2+k3s1/k3s"
    );
    assert_eq!(VersionTag::verbatim("1.2.3-rc1").as_str(), "1.2.3-rc1");
}

#[test]
fn test_dedup_preserves_first_occurrence() {
    let items = vec!["b", "a", "b", "c", "a"];
    assert_eq!(dedup_preserving_order(items), vec!["b", "a", "c"]);
}

#[tokio::test]
async fn test_k3s_files_and_image_list() {
    let list_url = "https://github.com/k3s-io/k3s/releases/download/v1.30.2+k3s1/k3s-images.txt";
    let fetcher = Arc::new(FakeFetcher::default().with(
        list_url,
        "docker.io/rancher/mirrored-pause:3.6\n\ndocker.io/rancher/klipper-helm:v0.8.4\n",
    ));
    let resolver = resolver(
        fetcher.clone(),
        Arc::new(FakeRenderer::default()),
        Arc::new(FakeProbe::default()),
        ChartImageStrategy::Auto,
    );

    let table = ProjectTable::builtin();
    let docs = resolver
        .resolve_all(
            "k3s",
            table.lookup("k3s").unwrap(),
            &VersionTag::normalized("v1.30.2-k3s1"),
        )
        .await
        .unwrap();

    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].name, "k3s-airgap-files");
    match &docs[0].entries {
        BundleEntries::Files(files) => {
            assert_eq!(files.len(), 6);
            assert_eq!(
                files[0].path,
                "https://github.com/k3s-io/k3s/releases/download/v1.30.2+k3s1/k3s"
            );
        }
        other => panic!("expected files, got {:?}", other),
    }

    assert_eq!(docs[1].name, "k3s-all-airgap-images");
    assert_eq!(
        images(&docs[1].entries),
        vec![
            ImageEntry::with_platform("docker.io/rancher/mirrored-pause:3.6", "all"),
            ImageEntry::with_platform("docker.io/rancher/klipper-helm:v0.8.4", "all"),
        ]
    );
    assert_eq!(*fetcher.requested.lock().unwrap(), vec![list_url.to_string()]);
}

#[tokio::test]
async fn test_image_lists_label_every_platform() {
    let recipe = Recipe::ImagesList(vec![
        ImageListItem {
            url: "https://example.com/{version}/arm64.txt".to_string(),
            name: Some("arm64".to_string()),
            platform: "linux/arm64".to_string(),
        },
        ImageListItem {
            url: "https://example.com/{version}/amd64.txt".to_string(),
            name: Some("amd64".to_string()),
            platform: "linux/amd64".to_string(),
        },
    ]);
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with("https://example.com/v1.31.0+rke2r1/arm64.txt", "a:1\n")
            .with("https://example.com/v1.31.0+rke2r1/amd64.txt", "b:1\nc:1"),
    );
    let resolver = resolver(
        fetcher,
        Arc::new(FakeRenderer::default()),
        Arc::new(FakeProbe::default()),
        ChartImageStrategy::Auto,
    );

    let doc = resolver
        .resolve("rke2", &recipe, &VersionTag::normalized("v1.31.0-rke2r1"))
        .await
        .unwrap();

    assert_eq!(doc.name, "rke2-linux/arm64-linux/amd64-airgap-images");
    assert_eq!(
        images(&doc.entries),
        vec![
            ImageEntry::with_platform("a:1", "linux/arm64"),
            ImageEntry::with_platform("b:1", "linux/amd64"),
            ImageEntry::with_platform("c:1", "linux/amd64"),
        ]
    );
}

#[tokio::test]
async fn test_missing_image_list_fails_request() {
    let resolver = resolver(
        Arc::new(FakeFetcher::default()),
        Arc::new(FakeRenderer::default()),
        Arc::new(FakeProbe::default()),
        ChartImageStrategy::Auto,
    );

    let table = ProjectTable::builtin();
    let err = resolver
        .resolve_all(
            "longhorn",
            table.lookup("longhorn").unwrap(),
            &VersionTag::normalized("1.7.2"),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_charts_substitute_version() {
    let recipe = Recipe::Charts(vec![
        ChartItem::new("https://charts.jetstack.io", "cert-manager", "v1.16.3"),
        ChartItem::new("https://charts.example.com", "rancher", "{version}"),
    ]);
    let resolver = resolver(
        Arc::new(FakeFetcher::default()),
        Arc::new(FakeRenderer::default()),
        Arc::new(FakeProbe::default()),
        ChartImageStrategy::Auto,
    );

    let doc = resolver
        .resolve("rancher", &recipe, &VersionTag::normalized("2.10.1"))
        .await
        .unwrap();
    assert_eq!(doc.name, "rancher-airgap-charts");
    match &doc.entries {
        BundleEntries::Charts(charts) => {
            assert_eq!(charts[0].version, "v1.16.3");
            assert_eq!(charts[1].version, "2.10.1");
            assert_eq!(charts[1].repo_url, "https://charts.example.com");
        }
        other => panic!("expected charts, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rendered_chart_images_are_deduplicated() {
    let mut renderer = FakeRenderer::default();
    renderer.outputs.insert(
        "one".to_string(),
        "kind: Deployment\nspec:\n  containers:\n    - image: nginx:1.25\n    - image: redis:7\n---\n".to_string(),
    );
    renderer.outputs.insert(
        "two".to_string(),
        "---\nkind: DaemonSet\nspec:\n  containers:\n    - image: redis:7\n    - image: busybox:1.36\n".to_string(),
    );
    let renderer = Arc::new(renderer);
    let resolver = resolver(
        Arc::new(FakeFetcher::default()),
        renderer.clone(),
        Arc::new(FakeProbe::default()),
        ChartImageStrategy::Render,
    );

    let recipe = Recipe::ChartsImages(vec![
        ChartItem::new("https://charts.example.com", "one", "{version}"),
        ChartItem::new("oci://registry.example.com/charts", "two", "0.1.0"),
    ]);
    let doc = resolver
        .resolve("demo", &recipe, &VersionTag::normalized("1.0.0"))
        .await
        .unwrap();

    assert_eq!(doc.name, "demo-airgap-images");
    let names: Vec<String> = images(&doc.entries).into_iter().map(|i| i.name).collect();
    assert_eq!(names, vec!["nginx:1.25", "redis:7", "busybox:1.36"]);

    let mut rendered = renderer.rendered.lock().unwrap().clone();
    rendered.sort();
    assert_eq!(rendered, vec!["one@1.0.0", "two@0.1.0"]);
}

const INDEX_YAML: &str = "\
apiVersion: v1
entries:
  demo:
    - version: 1.0.0
      urls:
        - charts/demo-1.0.0.tgz
    - version: 0.9.0
      urls:
        - https://mirror.example.com/demo-0.9.0.tgz
";

const VALUES_YAML: &str = "\
image:
  repository: example/a
  tag: t1
sidecar:
  image: example/b
  version: t2
";

fn chart_repo_fetcher() -> FakeFetcher {
    FakeFetcher::default()
        .with("https://charts.example.com/index.yaml", INDEX_YAML)
        .with(
            "https://charts.example.com/charts/demo-1.0.0.tgz",
            build_tgz(&[("demo/values.yaml", VALUES_YAML)]),
        )
}

#[tokio::test]
async fn test_inspected_chart_images_probe_candidates() {
    let probe = Arc::new(FakeProbe {
        existing: HashSet::from(["example/a:t1".to_string(), "example/b:t1".to_string()]),
        ..Default::default()
    });
    let resolver = resolver(
        Arc::new(chart_repo_fetcher()),
        Arc::new(FakeRenderer::default()),
        probe.clone(),
        ChartImageStrategy::Inspect,
    );

    let images = resolver
        .chart_images(&ChartItem::new(
            "https://charts.example.com",
            "demo",
            "1.0.0",
        ))
        .await
        .unwrap();

    assert_eq!(
        images,
        vec![
            ImageEntry::new("example/a:t1"),
            ImageEntry::new("example/b:t1"),
        ]
    );
    // t2 failed for example/a, so it is never tried for example/b
    assert_eq!(
        *probe.probed.lock().unwrap(),
        vec!["example/a:t1", "example/a:t2", "example/b:t1"]
    );
}

#[tokio::test]
async fn test_auto_falls_back_to_inspection() {
    let probe = Arc::new(FakeProbe {
        existing: HashSet::from(["example/a:t1".to_string()]),
        ..Default::default()
    });
    let renderer = Arc::new(FakeRenderer::default());
    let resolver = resolver(
        Arc::new(chart_repo_fetcher()),
        renderer.clone(),
        probe,
        ChartImageStrategy::Auto,
    );

    let images = resolver
        .chart_images(&ChartItem::new(
            "https://charts.example.com",
            "demo",
            "1.0.0",
        ))
        .await
        .unwrap();

    assert_eq!(images, vec![ImageEntry::new("example/a:t1")]);
    assert_eq!(*renderer.rendered.lock().unwrap(), vec!["demo@1.0.0"]);
}

#[tokio::test]
async fn test_auto_does_not_inspect_oci_charts() {
    let fetcher = Arc::new(FakeFetcher::default());
    let resolver = resolver(
        fetcher.clone(),
        Arc::new(FakeRenderer::default()),
        Arc::new(FakeProbe::default()),
        ChartImageStrategy::Auto,
    );

    let err = resolver
        .chart_images(&ChartItem::new(
            "oci://registry.example.com/charts",
            "demo",
            "1.0.0",
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, CarbideError::Render(_)));
    assert!(fetcher.requested.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_chart_version_missing_from_index() {
    let resolver = resolver(
        Arc::new(chart_repo_fetcher()),
        Arc::new(FakeRenderer::default()),
        Arc::new(FakeProbe::default()),
        ChartImageStrategy::Inspect,
    );

    let err = resolver
        .chart_images(&ChartItem::new(
            "https://charts.example.com",
            "demo",
            "2.0.0",
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, CarbideError::ChartNotFound { .. }));
}

#[tokio::test]
async fn test_absolute_archive_urls_are_fetched_as_is() {
    let fetcher = Arc::new(chart_repo_fetcher().with(
        "https://mirror.example.com/demo-0.9.0.tgz",
        build_tgz(&[("demo/values.yaml", "image: example/old\ntag: t0\n")]),
    ));
    let probe = Arc::new(FakeProbe {
        existing: HashSet::from(["example/old:t0".to_string()]),
        ..Default::default()
    });
    let resolver = resolver(
        fetcher,
        Arc::new(FakeRenderer::default()),
        probe,
        ChartImageStrategy::Inspect,
    );

    let images = resolver
        .chart_images(&ChartItem::new(
            "https://charts.example.com/",
            "demo",
            "0.9.0",
        ))
        .await
        .unwrap();
    assert_eq!(images, vec![ImageEntry::new("example/old:t0")]);
}
