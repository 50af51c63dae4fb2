use crate::draw::DrawList;
use crate::viewport::Viewport;
use orbitview_camera::CameraPose;
use orbitview_scene::{MeshStore, NodeKind, SceneGraph};
use std::fmt::Write as _;

/// Read-only view of everything one frame draws.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub scene: &'a SceneGraph,
    pub meshes: &'a MeshStore,
    pub camera: &'a CameraPose,
    pub viewport: &'a Viewport,
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// A renderer reads the scene, mesh store, camera and viewport; it never
/// mutates them. It may keep its own caches (uploaded meshes, targets).
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame.
    fn render(&mut self, frame: &FrameInput<'_>) -> Self::Output;
}

/// Produces a human-readable dump of a frame. Used by the CLI and tests.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    frames: u64,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&mut self, frame: &FrameInput<'_>) -> String {
        self.frames += 1;
        let draw = DrawList::collect(frame.scene);
        let vp = frame.viewport;
        let cam = frame.camera;

        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Frame {} ({}x{} @{:.1}x) ===",
            self.frames,
            vp.width(),
            vp.height(),
            vp.pixel_ratio()
        );
        let _ = writeln!(
            out,
            "Camera: eye=({:.2}, {:.2}, {:.2}) target=({:.2}, {:.2}, {:.2}) fov={:.0} aspect={:.3}",
            cam.position.x,
            cam.position.y,
            cam.position.z,
            cam.target.x,
            cam.target.y,
            cam.target.z,
            cam.fov_degrees,
            cam.aspect
        );
        let _ = writeln!(
            out,
            "Nodes: {}  Draws: {}  Casters: {}  Meshes: {}",
            frame.scene.node_count(),
            draw.len(),
            draw.shadow_casters().count(),
            frame.meshes.len()
        );
        if let Some(light) = &draw.light {
            let _ = writeln!(
                out,
                "Light: pos=({:.1}, {:.1}, {:.1}) intensity={:.0}",
                light.position.x, light.position.y, light.position.z, light.light.intensity
            );
        }

        for visit in frame.scene.traverse() {
            let node = visit.node;
            let tag = match node.kind {
                NodeKind::Group => "group",
                NodeKind::Mesh(_) => "mesh",
                NodeKind::Light(_) => "light",
            };
            let p = node.transform.position;
            let _ = writeln!(
                out,
                "{:indent$}- {} [{}] pos=({:.2}, {:.2}, {:.2}){}{}",
                "",
                node.name,
                tag,
                p.x,
                p.y,
                p.z,
                if node.cast_shadow { " cast" } else { "" },
                if node.receive_shadow { " recv" } else { "" },
                indent = visit.depth * 2
            );
        }
        out
    }
}
