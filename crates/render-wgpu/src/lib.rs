//! wgpu backend for the viewer.
//!
//! Renders every mesh node with a single spotlight: a depth-only shadow
//! pass from the light, then a lit pass with a cone falloff and filtered
//! shadow lookups.
//!
//! # Invariants
//! - The renderer never mutates the scene, camera or viewport.
//! - Mesh geometry is uploaded once per handle, on first use.

mod gpu;
mod shaders;

pub use gpu::{RenderSettings, WgpuFrame, WgpuRenderer};
