use std::hint::black_box;
use std::time::Instant;

use glam::Vec3;
use orbitview_common::{Color, MeshHandle};
use orbitview_scene::{DetachedNode, SceneGraph, SceneNode};

/// A model-like subtree: `groups` groups, each holding `meshes_per_group` meshes.
fn make_model(groups: usize, meshes_per_group: usize) -> DetachedNode {
    let mut root = DetachedNode::new(SceneNode::group("model"));
    for g in 0..groups {
        let mut group = DetachedNode::new(
            SceneNode::group(format!("group_{g}")).with_position(Vec3::new(g as f32, 0.0, 0.0)),
        );
        for m in 0..meshes_per_group {
            group.push_child(DetachedNode::new(SceneNode::mesh(
                format!("mesh_{g}_{m}"),
                MeshHandle((g * meshes_per_group + m) as u64),
                Color::WHITE,
            )));
        }
        root.push_child(group);
    }
    root
}

fn bench_traverse(groups: usize, meshes_per_group: usize, iterations: usize) {
    let mut graph = SceneGraph::new();
    graph
        .graft(graph.root(), make_model(groups, meshes_per_group))
        .expect("graft into own root");
    let nodes = graph.node_count();

    let start = Instant::now();
    let mut visited = 0usize;
    for _ in 0..iterations {
        visited += black_box(&graph).traverse().count();
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    assert_eq!(visited, nodes * iterations);
    println!("  traverse ({nodes} nodes, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_graft(groups: usize, meshes_per_group: usize, iterations: usize) {
    let model = make_model(groups, meshes_per_group);

    let start = Instant::now();
    for _ in 0..iterations {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        black_box(graph.graft(root, model.clone()).expect("graft into own root"));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  graft ({} nodes, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}",
        model.node_count()
    );
}

fn main() {
    println!("scene graph benchmarks");
    for (groups, meshes) in [(10, 10), (100, 10), (100, 100)] {
        bench_traverse(groups, meshes, 200);
        bench_graft(groups, meshes, 50);
    }
}
