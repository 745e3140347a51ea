pub mod index;
pub mod render;

pub use index::ChartIndex;
pub use render::{ChartRenderer, ChartRenderers, HelmRepoRenderer, OciChartRenderer};
