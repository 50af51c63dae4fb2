use glam::{Mat4, Vec3};
use orbitview_common::{Color, MeshHandle};
use orbitview_scene::{LightSource, NodeId, NodeKind, SceneGraph};

/// One mesh node, resolved to world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub node: NodeId,
    pub mesh: MeshHandle,
    pub model: Mat4,
    pub color: Color,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

/// The scene's spotlight, resolved to world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub node: NodeId,
    pub position: Vec3,
    /// Unit vector from the light towards its target.
    pub direction: Vec3,
    pub light: LightSource,
    pub cast_shadow: bool,
}

impl SpotLight {
    /// View-projection matrix of the light's shadow camera.
    pub fn shadow_view_projection(&self) -> Mat4 {
        let up = if self.direction.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_to_rh(self.position, self.direction, up);
        let fov = (self.light.falloff_angle * 2.0).clamp(0.01, std::f32::consts::PI - 0.01);
        let far = if self.light.range > 0.0 {
            self.light.range
        } else {
            1000.0
        };
        Mat4::perspective_rh(fov, 1.0, 0.5, far) * view
    }
}

/// Everything a renderer needs from the scene graph for one frame.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    pub items: Vec<DrawItem>,
    pub light: Option<SpotLight>,
}

impl DrawList {
    /// Walk the graph once, composing world matrices on a depth stack.
    /// Only the first light in traversal order is used.
    pub fn collect(scene: &SceneGraph) -> Self {
        let mut list = Self::default();
        let mut stack: Vec<Mat4> = Vec::new();
        for visit in scene.traverse() {
            stack.truncate(visit.depth);
            let parent = stack.last().copied().unwrap_or(Mat4::IDENTITY);
            let world = parent * visit.node.transform.to_matrix();
            stack.push(world);

            match &visit.node.kind {
                NodeKind::Group => {}
                NodeKind::Mesh(mesh) => list.items.push(DrawItem {
                    node: visit.id,
                    mesh: mesh.handle,
                    model: world,
                    color: mesh.base_color,
                    cast_shadow: visit.node.cast_shadow,
                    receive_shadow: visit.node.receive_shadow,
                }),
                NodeKind::Light(light) if list.light.is_none() => {
                    let position = world.transform_point3(Vec3::ZERO);
                    let direction = (light.target - position).try_normalize().unwrap_or(Vec3::NEG_Y);
                    list.light = Some(SpotLight {
                        node: visit.id,
                        position,
                        direction,
                        light: *light,
                        cast_shadow: visit.node.cast_shadow,
                    });
                }
                NodeKind::Light(_) => {}
            }
        }
        tracing::trace!(items = list.items.len(), lit = list.light.is_some(), "draw list collected");
        list
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn shadow_casters(&self) -> impl Iterator<Item = &DrawItem> {
        self.items.iter().filter(|i| i.cast_shadow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitview_common::Transform;
    use orbitview_scene::{DetachedNode, SceneNode};

    #[test]
    fn empty_scene_has_nothing_to_draw() {
        let list = DrawList::collect(&SceneGraph::new());
        assert!(list.is_empty());
        assert!(list.light.is_none());
    }

    #[test]
    fn world_matrices_compose_through_groups() {
        let mut g = SceneGraph::new();
        let tree = DetachedNode::new(
            SceneNode::group("model").with_position(Vec3::new(0.0, 1.05, -1.0)),
        )
        .with_child(DetachedNode::new(
            SceneNode::mesh("hull", MeshHandle(1), Color::WHITE).with_position(Vec3::new(1.0, 0.0, 0.0)),
        ));
        g.graft(g.root(), tree).unwrap();
        g.add_node(g.root(), SceneNode::mesh("ground", MeshHandle(2), Color::WHITE))
            .unwrap();

        let list = DrawList::collect(&g);
        assert_eq!(list.len(), 2);
        let hull = list.items[0].model.transform_point3(Vec3::ZERO);
        assert!((hull - Vec3::new(1.0, 1.05, -1.0)).length() < 1e-5);
        // A sibling after a deeper branch must not inherit its transform.
        let ground = list.items[1].model.transform_point3(Vec3::ZERO);
        assert!(ground.length() < 1e-6);
    }

    #[test]
    fn first_light_wins_and_points_at_target() {
        let mut g = SceneGraph::new();
        let light = LightSource {
            target: Vec3::ZERO,
            ..LightSource::default()
        };
        g.add_node(
            g.root(),
            SceneNode::light("spot", light)
                .with_position(Vec3::new(0.0, 25.0, 0.0))
                .with_shadows(true, false),
        )
        .unwrap();
        g.add_node(
            g.root(),
            SceneNode::light("second", light).with_transform(Transform::from_position(Vec3::X)),
        )
        .unwrap();

        let list = DrawList::collect(&g);
        let spot = list.light.unwrap();
        assert_eq!(spot.position, Vec3::new(0.0, 25.0, 0.0));
        assert!((spot.direction - Vec3::NEG_Y).length() < 1e-6);
        assert!(spot.cast_shadow);
        assert!(!spot.shadow_view_projection().col(0).x.is_nan());
    }

    #[test]
    fn casters_are_filtered() {
        let mut g = SceneGraph::new();
        g.add_node(g.root(), SceneNode::mesh("a", MeshHandle(1), Color::WHITE).with_shadows(true, true))
            .unwrap();
        g.add_node(g.root(), SceneNode::mesh("b", MeshHandle(1), Color::WHITE).with_shadows(false, true))
            .unwrap();
        let list = DrawList::collect(&g);
        assert_eq!(list.shadow_casters().count(), 1);
    }
}
