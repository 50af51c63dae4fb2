use glam::Vec3;
use orbitview_common::{Color, MeshHandle, Transform};
use serde::{Deserialize, Serialize};

/// A spotlight: a cone of light with a soft edge and distance falloff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSource {
    pub color: Color,
    pub intensity: f32,
    /// Distance at which the light reaches zero. 0 means unbounded.
    pub range: f32,
    /// Half-angle of the cone, in radians.
    pub falloff_angle: f32,
    /// Fraction of the cone (0..=1) over which the edge fades out.
    pub penumbra: f32,
    /// Exponent of the distance falloff; 2 is physically based.
    pub decay: f32,
    pub shadow_bias: f32,
    /// World-space point the cone is aimed at.
    pub target: Vec3,
}

impl Default for LightSource {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            intensity: 1.0,
            range: 0.0,
            falloff_angle: std::f32::consts::FRAC_PI_3,
            penumbra: 0.0,
            decay: 2.0,
            shadow_bias: 0.0,
            target: Vec3::ZERO,
        }
    }
}

impl LightSource {
    /// Cosines of the outer cone edge and of the start of the penumbra.
    pub fn cone_cosines(&self) -> (f32, f32) {
        let outer = self.falloff_angle.cos();
        let inner = (self.falloff_angle * (1.0 - self.penumbra.clamp(0.0, 1.0))).cos();
        (outer, inner)
    }
}

/// Geometry reference plus the flat material color it is drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshRef {
    pub handle: MeshHandle,
    pub base_color: Color,
}

/// What a node contributes to the scene besides its transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    /// Pure transform node.
    Group,
    Mesh(MeshRef),
    Light(LightSource),
}

/// Per-node data stored in the scene graph. Children are owned by the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub kind: NodeKind,
}

impl SceneNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            cast_shadow: false,
            receive_shadow: false,
            kind: NodeKind::Group,
        }
    }

    pub fn mesh(name: impl Into<String>, handle: MeshHandle, base_color: Color) -> Self {
        Self {
            kind: NodeKind::Mesh(MeshRef { handle, base_color }),
            ..Self::group(name)
        }
    }

    pub fn light(name: impl Into<String>, light: LightSource) -> Self {
        Self {
            kind: NodeKind::Light(light),
            ..Self::group(name)
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn with_shadows(mut self, cast: bool, receive: bool) -> Self {
        self.cast_shadow = cast;
        self.receive_shadow = receive;
        self
    }

    /// Capability tag: true when the node carries drawable geometry.
    pub fn has_geometry(&self) -> bool {
        matches!(self.kind, NodeKind::Mesh(_))
    }

    pub fn mesh_ref(&self) -> Option<&MeshRef> {
        match &self.kind {
            NodeKind::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn light_source(&self) -> Option<&LightSource> {
        match &self.kind {
            NodeKind::Light(l) => Some(l),
            _ => None,
        }
    }
}

/// A node tree that is not (yet) part of any scene graph, such as the result
/// of an asset load. Grafting moves it into a graph in one step.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedNode {
    pub node: SceneNode,
    pub children: Vec<DetachedNode>,
}

impl DetachedNode {
    pub fn new(node: SceneNode) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: DetachedNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn push_child(&mut self, child: DetachedNode) {
        self.children.push(child);
    }

    /// Number of nodes in this subtree, including itself.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }

    /// Visit every node of the subtree, parent before children.
    pub fn for_each(&self, f: &mut impl FnMut(&SceneNode)) {
        f(&self.node);
        for child in &self.children {
            child.for_each(f);
        }
    }

    pub fn for_each_mut(&mut self, f: &mut impl FnMut(&mut SceneNode)) {
        f(&mut self.node);
        for child in &mut self.children {
            child.for_each_mut(f);
        }
    }

    /// Turn on shadow casting and receiving for every mesh-bearing node,
    /// whatever the importer set. Returns how many nodes were touched.
    pub fn enable_shadows_on_meshes(&mut self) -> usize {
        let mut touched = 0;
        self.for_each_mut(&mut |node| {
            if node.has_geometry() {
                node.cast_shadow = true;
                node.receive_shadow = true;
                touched += 1;
            }
        });
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(name: &str) -> SceneNode {
        SceneNode::mesh(name, MeshHandle(1), Color::WHITE)
    }

    #[test]
    fn geometry_tag_follows_kind() {
        assert!(mesh("m").has_geometry());
        assert!(!SceneNode::group("g").has_geometry());
        assert!(!SceneNode::light("l", LightSource::default()).has_geometry());
    }

    #[test]
    fn enable_shadows_only_touches_meshes() {
        let mut tree = DetachedNode::new(SceneNode::group("root"))
            .with_child(DetachedNode::new(mesh("a")))
            .with_child(
                DetachedNode::new(SceneNode::group("inner"))
                    .with_child(DetachedNode::new(mesh("b").with_shadows(false, false))),
            );

        assert_eq!(tree.enable_shadows_on_meshes(), 2);

        let mut checked = 0;
        tree.for_each(&mut |node| {
            if node.has_geometry() {
                assert!(node.cast_shadow && node.receive_shadow);
                checked += 1;
            } else {
                assert!(!node.cast_shadow && !node.receive_shadow);
            }
        });
        assert_eq!(checked, 2);
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn cone_cosines_with_full_penumbra() {
        let light = LightSource {
            falloff_angle: 0.22,
            penumbra: 1.0,
            ..LightSource::default()
        };
        let (outer, inner) = light.cone_cosines();
        assert!((outer - 0.22f32.cos()).abs() < 1e-6);
        assert_eq!(inner, 1.0);
    }
}
