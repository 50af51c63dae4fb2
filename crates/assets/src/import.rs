//! glTF document to detached scene subtree.

use crate::error::AssetLoadFailure;
use base64::Engine as _;
use glam::{Quat, Vec3};
use gltf::buffer::Source;
use orbitview_common::{Color, MeshHandle, Transform};
use orbitview_scene::{DetachedNode, MeshData, SceneNode};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A model ready to be grafted into a scene graph.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub root: DetachedNode,
    /// Geometry referenced by the subtree's mesh nodes, one entry per handle.
    pub meshes: Vec<(MeshHandle, MeshData)>,
}

impl LoadedModel {
    pub fn mesh_node_count(&self) -> usize {
        let mut count = 0;
        self.root.for_each(&mut |n| {
            if n.has_geometry() {
                count += 1;
            }
        });
        count
    }
}

/// Where a buffer's bytes come from once the description is parsed.
#[derive(Debug)]
pub(crate) enum BufferSource {
    Ready(Vec<u8>),
    External(PathBuf),
}

pub(crate) fn plan_buffers(
    document: &gltf::Document,
    blob: &mut Option<Vec<u8>>,
    base_dir: &Path,
) -> Result<Vec<BufferSource>, AssetLoadFailure> {
    document
        .buffers()
        .map(|buffer| {
            let index = buffer.index();
            match buffer.source() {
                Source::Bin => blob
                    .take()
                    .map(BufferSource::Ready)
                    .ok_or(AssetLoadFailure::MissingBuffer { index }),
                Source::Uri(uri) if uri.starts_with("data:") => decode_data_uri(uri)
                    .map(BufferSource::Ready)
                    .ok_or(AssetLoadFailure::InvalidDataUri { index }),
                Source::Uri(uri) => Ok(BufferSource::External(base_dir.join(decode_uri_path(uri)))),
            }
        })
        .collect()
}

/// Decode `data:[<mediatype>];base64,<data>`. Other encodings are rejected.
fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let (header, data) = uri.strip_prefix("data:")?.split_once(',')?;
    if !header.ends_with(";base64") {
        return None;
    }
    base64::engine::general_purpose::STANDARD.decode(data).ok()
}

/// Undo percent-encoding in a relative URI. Malformed escapes pass through.
fn decode_uri_path(uri: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(uri.as_bytes())).into_owned()
}

pub(crate) fn check_buffer_lengths(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
) -> Result<(), AssetLoadFailure> {
    for buffer in document.buffers() {
        let index = buffer.index();
        match buffers.get(index) {
            Some(data) if data.len() >= buffer.length() => {}
            _ => return Err(AssetLoadFailure::MissingBuffer { index }),
        }
    }
    Ok(())
}

/// Hierarchies nested deeper than this are rejected instead of walked.
const MAX_NODE_DEPTH: usize = 256;

struct Importer<'a> {
    buffers: &'a [Vec<u8>],
    primitives: HashMap<(usize, usize), Option<(MeshHandle, Color)>>,
    seen: HashSet<MeshHandle>,
    meshes: Vec<(MeshHandle, MeshData)>,
    /// Nodes on the path from the scene root to the node being imported.
    visiting: HashSet<usize>,
    /// Every node imported so far. A node may appear in the tree only once.
    placed: HashSet<usize>,
}

impl Importer<'_> {
    fn primitive(&mut self, mesh: &gltf::Mesh, primitive: &gltf::Primitive) -> Option<(MeshHandle, Color)> {
        let key = (mesh.index(), primitive.index());
        if let Some(cached) = self.primitives.get(&key) {
            return *cached;
        }
        let imported = read_primitive(primitive, self.buffers).map(|data| {
            let handle = data.content_handle();
            if self.seen.insert(handle) {
                self.meshes.push((handle, data));
            }
            let factor = primitive.material().pbr_metallic_roughness().base_color_factor();
            (handle, Color::from_linear(factor))
        });
        self.primitives.insert(key, imported);
        imported
    }

    fn node(&mut self, node: &gltf::Node, depth: usize) -> Result<DetachedNode, AssetLoadFailure> {
        let index = node.index();
        if self.visiting.contains(&index) {
            return Err(AssetLoadFailure::Parse("node hierarchy contains a cycle".into()));
        }
        if !self.placed.insert(index) {
            return Err(AssetLoadFailure::Parse(format!(
                "node {index} has more than one parent"
            )));
        }
        if depth > MAX_NODE_DEPTH {
            return Err(AssetLoadFailure::Parse(format!(
                "node hierarchy is deeper than {MAX_NODE_DEPTH} levels"
            )));
        }

        let name = node
            .name()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("node_{}", node.index()));

        let mut out = match node.mesh() {
            Some(mesh) => {
                let parts: Vec<_> = mesh
                    .primitives()
                    .filter_map(|p| self.primitive(&mesh, &p))
                    .collect();
                match parts.as_slice() {
                    [(handle, color)] => DetachedNode::new(SceneNode::mesh(name, *handle, *color)),
                    _ => {
                        let mut group = DetachedNode::new(SceneNode::group(name.clone()));
                        for (i, (handle, color)) in parts.iter().enumerate() {
                            group.push_child(DetachedNode::new(SceneNode::mesh(
                                format!("{name}_{i}"),
                                *handle,
                                *color,
                            )));
                        }
                        group
                    }
                }
            }
            None => DetachedNode::new(SceneNode::group(name)),
        };

        let (t, r, s) = node.transform().decomposed();
        out.node.transform = Transform {
            position: Vec3::from(t),
            rotation: Quat::from_array(r),
            scale: Vec3::from(s),
        };

        self.visiting.insert(index);
        for child in node.children() {
            let child = self.node(&child, depth + 1)?;
            out.push_child(child);
        }
        self.visiting.remove(&index);
        Ok(out)
    }
}

fn read_primitive(primitive: &gltf::Primitive, buffers: &[Vec<u8>]) -> Option<MeshData> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        tracing::debug!(mode = ?primitive.mode(), "skipping non-triangle primitive");
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    if positions.is_empty() {
        return None;
    }
    let indices = reader
        .read_indices()
        .map(|iter| iter.into_u32().collect())
        .unwrap_or_else(|| (0..positions.len() as u32).collect());

    let mut mesh = MeshData {
        normals: reader.read_normals().map(|iter| iter.collect()).unwrap_or_default(),
        positions,
        indices,
    };
    if mesh.normals.len() != mesh.positions.len() {
        mesh.compute_normals();
    }
    Some(mesh)
}

/// Build the subtree for the document's default scene (or its first scene).
///
/// The returned root is a group named `name` with identity transform;
/// mesh nodes have shadows disabled.
pub(crate) fn build_model(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    name: &str,
) -> Result<LoadedModel, AssetLoadFailure> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(AssetLoadFailure::NoScene)?;

    let mut importer = Importer {
        buffers,
        primitives: HashMap::new(),
        seen: HashSet::new(),
        meshes: Vec::new(),
        visiting: HashSet::new(),
        placed: HashSet::new(),
    };
    let mut root = DetachedNode::new(SceneNode::group(name));
    for node in scene.nodes() {
        let child = importer.node(&node, 1)?;
        root.push_child(child);
    }
    Ok(LoadedModel {
        root,
        meshes: importer.meshes,
    })
}
