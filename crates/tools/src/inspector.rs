use glam::Vec3;
use orbitview_common::SceneId;
use orbitview_scene::{MeshStore, NodeId, NodeKind, SceneGraph};

/// Read-only queries against a scene graph for debugging and UI.
pub struct SceneInspector;

impl SceneInspector {
    pub fn summary(scene: &SceneGraph, meshes: &MeshStore) -> SceneSummary {
        let mut summary = SceneSummary {
            scene: scene.id(),
            node_count: scene.node_count(),
            groups: 0,
            mesh_nodes: 0,
            lights: 0,
            max_depth: 0,
            shadow_casters: 0,
            unique_meshes: meshes.len(),
            triangles: meshes.total_triangles(),
            pending_events: scene.events().len(),
        };
        for visit in scene.traverse() {
            summary.max_depth = summary.max_depth.max(visit.depth);
            match visit.node.kind {
                NodeKind::Group => summary.groups += 1,
                NodeKind::Mesh(_) => summary.mesh_nodes += 1,
                NodeKind::Light(_) => summary.lights += 1,
            }
            if visit.node.cast_shadow {
                summary.shadow_casters += 1;
            }
        }
        summary
    }

    pub fn inspect_node(scene: &SceneGraph, id: NodeId) -> Option<NodeInfo> {
        let node = scene.get(id)?;
        let t = node.transform;
        let world_position = scene
            .world_matrix(id)
            .map(|m| m.transform_point3(Vec3::ZERO))
            .unwrap_or(t.position);
        Some(NodeInfo {
            id,
            name: node.name.clone(),
            kind: match node.kind {
                NodeKind::Group => "group",
                NodeKind::Mesh(_) => "mesh",
                NodeKind::Light(_) => "light",
            },
            position: t.position.to_array(),
            rotation: t.rotation.to_array(),
            scale: t.scale.to_array(),
            world_position: world_position.to_array(),
            cast_shadow: node.cast_shadow,
            receive_shadow: node.receive_shadow,
            children: scene.children(id).len(),
        })
    }

    /// All node ids in traversal order.
    pub fn list_nodes(scene: &SceneGraph) -> Vec<NodeId> {
        scene.traverse().map(|v| v.id).collect()
    }

    /// First node in traversal order with the given name.
    pub fn find_by_name(scene: &SceneGraph, name: &str) -> Option<NodeId> {
        scene.traverse().find(|v| v.node.name == name).map(|v| v.id)
    }
}

/// Summary of a scene for the inspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSummary {
    pub scene: SceneId,
    pub node_count: usize,
    pub groups: usize,
    pub mesh_nodes: usize,
    pub lights: usize,
    pub max_depth: usize,
    pub shadow_casters: usize,
    pub unique_meshes: usize,
    pub triangles: usize,
    pub pending_events: usize,
}

impl std::fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scene [{:.8}]: nodes={} (groups={} meshes={} lights={}) depth={} casters={} geometry={} triangles={}",
            &self.scene.0.to_string()[..8],
            self.node_count,
            self.groups,
            self.mesh_nodes,
            self.lights,
            self.max_depth,
            self.shadow_casters,
            self.unique_meshes,
            self.triangles,
        )
    }
}

/// Detailed info about a single node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub kind: &'static str,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub world_position: [f32; 3],
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub children: usize,
}

impl std::fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} [{}] pos=({:.2}, {:.2}, {:.2}) world=({:.2}, {:.2}, {:.2}) scale=({:.2}, {:.2}, {:.2}) children={}",
            self.id.index(),
            self.name,
            self.kind,
            self.position[0],
            self.position[1],
            self.position[2],
            self.world_position[0],
            self.world_position[1],
            self.world_position[2],
            self.scale[0],
            self.scale[1],
            self.scale[2],
            self.children,
        )?;
        if self.cast_shadow {
            write!(f, " cast")?;
        }
        if self.receive_shadow {
            write!(f, " recv")?;
        }
        Ok(())
    }
}
