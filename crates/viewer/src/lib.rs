//! The viewer's application context.
//!
//! [`ViewerContext`] owns the viewport, camera rig, scene graph, mesh store
//! and asset loader, and runs one frame at a time: loader events first,
//! then the camera update, then the draw. Shells (the desktop window, the
//! CLI) own a context and feed it input, resizes and frame ticks.

mod config;
mod context;

pub use config::{
    CameraConfig, ConfigError, GroundConfig, LightConfig, ModelConfig, RendererConfig,
    ViewerConfig, WindowConfig, default_controls,
};
pub use context::{LoadStatus, ViewerContext, ViewerError};
