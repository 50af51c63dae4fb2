//! Rendering interface: viewport, per-frame input, draw-list extraction.
//!
//! # Invariants
//! - Renderers read the scene, camera and viewport; they never mutate them.
//! - The viewport is never zero-sized.
//!
//! Backends implement [`Renderer`]. [`DebugTextRenderer`] is the headless
//! implementation used by the CLI and tests.

mod draw;
mod renderer;
mod timer;
mod viewport;

pub use draw::{DrawItem, DrawList, SpotLight};
pub use renderer::{DebugTextRenderer, FrameInput, Renderer};
pub use timer::FrameTimer;
pub use viewport::Viewport;
