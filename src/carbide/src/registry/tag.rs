//! Chart coordinates packed into a single registry tag.
//!
//! `chart--charts.example.com--stable--1.2.3` names version `1.2.3` of a chart
//! served from `http://charts.example.com/stable`; the `oci--` prefix selects
//! an `oci://` repository instead.

use crate::descriptor::ChartItem;
use crate::helm::render::OCI_SCHEME;

const SEGMENT_SEPARATOR: &str = "--";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartScheme {
    Http,
    Oci,
}

impl ChartScheme {
    fn prefix(self) -> &'static str {
        match self {
            ChartScheme::Http => "chart--",
            ChartScheme::Oci => "oci--",
        }
    }

    fn url_scheme(self) -> &'static str {
        match self {
            ChartScheme::Http => "http://",
            ChartScheme::Oci => OCI_SCHEME,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartTag {
    pub scheme: ChartScheme,
    /// Repository location without its scheme
    pub repository: String,
    pub version: String,
}

impl ChartTag {
    /// Decode a synthetic chart tag, or `None` for ordinary tags.
    pub fn parse(tag: &str) -> Option<Self> {
        let (scheme, rest) = [ChartScheme::Http, ChartScheme::Oci]
            .into_iter()
            .find_map(|scheme| tag.strip_prefix(scheme.prefix()).map(|rest| (scheme, rest)))?;

        let mut segments: Vec<&str> = rest.split(SEGMENT_SEPARATOR).collect();
        let version = segments.pop().unwrap_or_default().to_string();

        Some(Self {
            scheme,
            repository: segments.join("/"),
            version,
        })
    }

    pub fn repo_url(&self) -> String {
        format!("{}{}", self.scheme.url_scheme(), self.repository)
    }

    /// Chart coordinate for `name` pinned at the decoded version.
    pub fn chart_item(&self, name: &str) -> ChartItem {
        ChartItem::new(self.repo_url(), name, self.version.clone())
    }
}

