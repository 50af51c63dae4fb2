//! Draw-list extraction over a wide, shallow scene.
//!
//! Run with `cargo bench -p orbitview-render`.

use glam::Vec3;
use orbitview_common::{Color, MeshHandle};
use orbitview_render::DrawList;
use orbitview_scene::{DetachedNode, SceneGraph, SceneNode};
use std::hint::black_box;
use std::time::Instant;

fn build(groups: usize, meshes_per_group: usize) -> SceneGraph {
    let mut graph = SceneGraph::new();
    for g in 0..groups {
        let mut group = DetachedNode::new(
            SceneNode::group(format!("group_{g}")).with_position(Vec3::new(g as f32, 0.0, 0.0)),
        );
        for m in 0..meshes_per_group {
            group.push_child(DetachedNode::new(
                SceneNode::mesh(format!("mesh_{m}"), MeshHandle(m as u64), Color::WHITE)
                    .with_position(Vec3::new(0.0, m as f32, 0.0)),
            ));
        }
        let root = graph.root();
        let _ = graph.graft(root, group);
    }
    graph
}

fn main() {
    for (groups, per) in [(10, 10), (100, 50), (500, 100)] {
        let graph = build(groups, per);
        let iterations = 50;
        let start = Instant::now();
        for _ in 0..iterations {
            black_box(DrawList::collect(black_box(&graph)));
        }
        let per_iter = start.elapsed() / iterations;
        println!(
            "collect {:>6} nodes: {:>10.3?} per frame",
            graph.node_count(),
            per_iter
        );
    }
}
