//! Scene graph: the ordered node tree the viewer draws, plus mesh geometry.
//!
//! # Invariants
//! - The graph is a tree under a single root; nodes are never removed.
//! - Traversal is depth-first, parent before children, siblings in insertion order.
//! - Shadow flags are plain data; the renderer decides what to do with them.

mod graph;
mod mesh;
mod node;

pub use graph::{NodeId, SceneError, SceneEvent, SceneGraph, Traverse, Visit};
pub use mesh::{MeshData, MeshStore};
pub use node::{DetachedNode, LightSource, MeshRef, NodeKind, SceneNode};
