//! Developer tooling: read-only scene inspection for overlays and the CLI.

mod inspector;

pub use inspector::{NodeInfo, SceneInspector, SceneSummary};
