pub mod blob;
pub mod facade;
pub mod manifest;
pub mod tag;

pub use blob::{get_blob, head_blob};
pub use facade::RegistryFacade;
pub use manifest::{get_manifest, head_manifest, AppState, SyntheticManifest};
pub use tag::{ChartScheme, ChartTag};
