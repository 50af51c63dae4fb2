//! Shared types for the orbitview workspace: identifiers, transforms, colors.

mod types;

pub use types::{Color, LoadId, MeshHandle, SceneId, Transform};
