use crate::config::ViewerConfig;
use orbitview_assets::{
    AssetLoader, Fetcher, LoadEvent, LoadProgress, LoadResult, LoaderError, LoaderState,
};
use orbitview_camera::{CameraPose, OrbitController};
use orbitview_common::LoadId;
use orbitview_input::CameraAction;
use orbitview_render::{FrameInput, FrameTimer, Renderer, Viewport};
use orbitview_scene::{MeshData, MeshStore, NodeId, SceneError, SceneGraph, SceneNode};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("the model is already in the scene")]
    ModelAlreadyLoaded,
}

/// Where the model load stands, as shown by the progress overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    NotRequested,
    /// In flight; `None` until the first progress report.
    Pending(Option<LoadProgress>),
    /// Grafted into the scene under this node.
    Loaded(NodeId),
    Failed(String),
}

impl LoadStatus {
    pub fn overlay_visible(&self) -> bool {
        matches!(self, Self::Pending(_) | Self::Failed(_))
    }
}

/// Owns everything the viewer runs on: viewport, camera rig, scene, mesh
/// store, loader. Created once at startup and passed by reference into the
/// frame loop.
pub struct ViewerContext {
    config: ViewerConfig,
    viewport: Viewport,
    controller: OrbitController,
    scene: SceneGraph,
    meshes: MeshStore,
    loader: AssetLoader,
    status: LoadStatus,
    failures: u32,
    ground: NodeId,
    light: NodeId,
    timer: FrameTimer,
}

impl ViewerContext {
    /// Build the static scene (ground and spotlight) and bind the camera.
    /// Does not start the model load.
    pub fn new(config: ViewerConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, ViewerError> {
        let viewport = Viewport::configure(
            config.window.width,
            config.window.height,
            1.0,
            config.window.clear_color,
        );

        let cam = &config.camera;
        let pose = CameraPose::new(
            cam.fov_degrees,
            viewport.aspect(),
            cam.near_clip,
            cam.far_clip,
            cam.position,
        )
        .with_target(cam.target);
        let controller = OrbitController::new(pose, config.controls);

        let mut scene = SceneGraph::new();
        let mut meshes = MeshStore::new();
        let root = scene.root();

        let g = &config.ground;
        let plane = meshes.insert(MeshData::plane(g.width, g.depth, g.segments_x, g.segments_z));
        let ground = scene.add_node(
            root,
            SceneNode::mesh("ground", plane, g.color).with_shadows(g.cast_shadow, g.receive_shadow),
        )?;

        let l = &config.light;
        let light = scene.add_node(
            root,
            SceneNode::light("spotlight", l.source)
                .with_position(l.position)
                .with_shadows(l.cast_shadow, false),
        )?;

        tracing::info!(
            width = viewport.width(),
            height = viewport.height(),
            nodes = scene.node_count(),
            "viewer context ready"
        );

        Ok(Self {
            config,
            viewport,
            controller,
            scene,
            meshes,
            loader: AssetLoader::new(fetcher),
            status: LoadStatus::NotRequested,
            failures: 0,
            ground,
            light,
            timer: FrameTimer::default(),
        })
    }

    /// Start loading the configured model. Also used to retry after a
    /// failure.
    pub fn request_model_load(&mut self) -> Result<LoadId, ViewerError> {
        if matches!(self.status, LoadStatus::Loaded(_)) {
            return Err(ViewerError::ModelAlreadyLoaded);
        }
        let request = self.config.model.request();
        tracing::info!(path = %request.description_path().display(), "requesting model");
        let id = self.loader.load(request)?;
        self.status = LoadStatus::Pending(None);
        Ok(id)
    }

    /// One iteration of the render loop: deliver loader events, advance
    /// the camera, then draw.
    pub fn frame<R: Renderer>(&mut self, dt: Duration, renderer: &mut R) -> R::Output {
        let span = tracing::trace_span!("frame", n = self.timer.total_frames());
        let _enter = span.enter();

        self.pump_loader();
        let moved = self.controller.tick(dt.as_secs_f32());
        tracing::trace!(moved, "camera ticked");

        let output = renderer.render(&FrameInput {
            scene: &self.scene,
            meshes: &self.meshes,
            camera: self.controller.pose(),
            viewport: &self.viewport,
        });
        self.timer.record(dt);
        output
    }

    /// Apply a new window size in logical pixels. The camera aspect is
    /// updated before the next frame. Returns `false` if nothing changed.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if !self.viewport.resize(width, height) {
            return false;
        }
        self.controller.set_aspect(self.viewport.aspect());
        true
    }

    pub fn set_pixel_ratio(&mut self, pixel_ratio: f32) -> bool {
        self.viewport.set_pixel_ratio(pixel_ratio)
    }

    pub fn apply_input(&mut self, action: CameraAction) {
        self.controller.apply(&action, self.viewport.height());
    }

    pub fn load_status(&self) -> &LoadStatus {
        &self.status
    }

    /// Number of loads that ended in failure.
    pub fn failed_loads(&self) -> u32 {
        self.failures
    }

    /// Abandon any in-flight load. The scene is left as it is.
    pub fn shutdown(&mut self) {
        if self.loader.state() == LoaderState::Loading {
            self.loader.cancel();
            self.status = LoadStatus::NotRequested;
        }
        tracing::info!(frames = self.timer.total_frames(), "viewer shut down");
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn meshes(&self) -> &MeshStore {
        &self.meshes
    }

    pub fn camera(&self) -> &CameraPose {
        self.controller.pose()
    }

    pub fn controller(&self) -> &OrbitController {
        &self.controller
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    pub fn ground(&self) -> NodeId {
        self.ground
    }

    pub fn light(&self) -> NodeId {
        self.light
    }

    pub fn model_root(&self) -> Option<NodeId> {
        match self.status {
            LoadStatus::Loaded(id) => Some(id),
            _ => None,
        }
    }

    fn pump_loader(&mut self) {
        for event in self.loader.poll() {
            match event {
                LoadEvent::Progress(progress) => {
                    if let LoadStatus::Pending(_) = self.status {
                        self.status = LoadStatus::Pending(Some(progress));
                    }
                    tracing::debug!(
                        loaded = progress.loaded_bytes,
                        total = progress.total_bytes,
                        "model loading"
                    );
                }
                LoadEvent::Finished(LoadResult::Success(model)) => {
                    for (handle, mesh) in model.meshes {
                        self.meshes.insert_with_handle(handle, mesh);
                    }
                    match self.scene.graft(self.scene.root(), model.root) {
                        Ok(id) => {
                            tracing::info!(
                                nodes = self.scene.subtree_size(id),
                                meshes = self.meshes.len(),
                                "model added to scene"
                            );
                            self.status = LoadStatus::Loaded(id);
                        }
                        Err(e) => self.fail(e.to_string()),
                    }
                }
                LoadEvent::Finished(LoadResult::Failure(e)) => self.fail(e.to_string()),
            }
        }
    }

    fn fail(&mut self, message: String) {
        tracing::error!(error = %message, "model load failed");
        self.failures += 1;
        self.status = LoadStatus::Failed(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};
    use orbitview_assets::{MemoryFetcher, fixtures};
    use orbitview_render::DebugTextRenderer;
    use std::sync::Mutex;
    use std::time::Instant;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};

    const DT: Duration = Duration::from_millis(16);

    fn context(fetcher: MemoryFetcher) -> ViewerContext {
        let mut config = ViewerConfig::default();
        config.model.base_dir = "ship".into();
        ViewerContext::new(config, Arc::new(fetcher)).unwrap()
    }

    fn run_until_settled(ctx: &mut ViewerContext, renderer: &mut DebugTextRenderer) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while matches!(ctx.load_status(), LoadStatus::Pending(_)) {
            assert!(Instant::now() < deadline, "load did not settle");
            ctx.frame(DT, renderer);
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn startup_scene_has_ground_and_light() {
        let ctx = context(MemoryFetcher::new());
        assert_eq!(ctx.scene().node_count(), 3);
        assert_eq!(ctx.scene().children(ctx.scene().root()), &[ctx.ground(), ctx.light()]);

        let ground = ctx.scene().get(ctx.ground()).unwrap();
        assert!(ground.has_geometry());
        assert!(ground.receive_shadow && !ground.cast_shadow);
        let light = ctx.scene().get(ctx.light()).unwrap();
        assert!(light.cast_shadow);
        assert_eq!(light.transform.position, Vec3::new(0.0, 25.0, 0.0));

        assert_eq!(*ctx.load_status(), LoadStatus::NotRequested);
        assert!(!ctx.load_status().overlay_visible());
    }

    #[test]
    fn camera_starts_inside_limits() {
        let ctx = context(MemoryFetcher::new());
        let pose = ctx.camera();
        assert_eq!(pose.target, Vec3::new(0.0, 1.0, 0.0));
        assert!(pose.distance() >= 5.0 - 1e-4 && pose.distance() <= 20.0 + 1e-4);
        assert!((pose.aspect - 1280.0 / 720.0).abs() < 1e-6);
    }

    #[test]
    fn resize_updates_viewport_and_aspect() {
        let mut ctx = context(MemoryFetcher::new());
        assert!(ctx.resize(0, 300));
        assert_eq!((ctx.viewport().width(), ctx.viewport().height()), (1, 300));
        assert!((ctx.camera().aspect - 1.0 / 300.0).abs() < 1e-6);
        assert!(!ctx.resize(1, 300));
    }

    #[test]
    fn frames_run_without_a_model() {
        let mut ctx = context(MemoryFetcher::new());
        let mut renderer = DebugTextRenderer::new();
        for _ in 0..5 {
            ctx.frame(DT, &mut renderer);
        }
        assert_eq!(ctx.timer().total_frames(), 5);
        assert_eq!(renderer.frames_rendered(), 5);
    }

    #[test]
    fn input_moves_camera_only_on_frame() {
        let mut ctx = context(MemoryFetcher::new());
        let before = ctx.camera().position;
        ctx.apply_input(CameraAction::Orbit(Vec2::new(120.0, 0.0)));
        assert_eq!(ctx.camera().position, before);
        ctx.frame(DT, &mut DebugTextRenderer::new());
        assert_ne!(ctx.camera().position, before);
    }

    #[test]
    fn successful_load_grafts_once() {
        let fetcher = MemoryFetcher::new().with_file("ship/scene.gltf", fixtures::embedded_gltf());
        let mut ctx = context(fetcher);
        let mut renderer = DebugTextRenderer::new();
        let before = ctx.scene().node_count();

        ctx.request_model_load().unwrap();
        assert!(ctx.load_status().overlay_visible());
        run_until_settled(&mut ctx, &mut renderer);

        let LoadStatus::Loaded(model) = *ctx.load_status() else {
            panic!("expected loaded, got {:?}", ctx.load_status());
        };
        assert!(!ctx.load_status().overlay_visible());
        assert_eq!(ctx.scene().node_count(), before + fixtures::MODEL_NODE_COUNT);
        assert_eq!(ctx.scene().children(ctx.scene().root()).last(), Some(&model));
        assert_eq!(
            ctx.scene().get(model).unwrap().transform.position,
            Vec3::new(0.0, 1.05, -1.0)
        );

        for visit in ctx.scene().traverse_from(model) {
            if visit.node.has_geometry() {
                assert!(visit.node.cast_shadow && visit.node.receive_shadow);
                let handle = visit.node.mesh_ref().unwrap().handle;
                assert!(ctx.meshes().contains(handle));
            }
        }

        ctx.frame(DT, &mut renderer);
        assert_eq!(ctx.scene().node_count(), before + fixtures::MODEL_NODE_COUNT);
        assert!(matches!(
            ctx.request_model_load(),
            Err(ViewerError::ModelAlreadyLoaded)
        ));
    }

    #[test]
    fn failed_load_leaves_scene_untouched_and_reports_once() {
        let mut ctx = context(MemoryFetcher::new());
        let mut renderer = DebugTextRenderer::new();
        let before = ctx.scene().node_count();

        ctx.request_model_load().unwrap();
        run_until_settled(&mut ctx, &mut renderer);
        assert!(matches!(ctx.load_status(), LoadStatus::Failed(_)));
        assert!(ctx.load_status().overlay_visible());

        for _ in 0..5 {
            ctx.frame(DT, &mut renderer);
        }
        assert_eq!(ctx.failed_loads(), 1);
        assert_eq!(ctx.scene().node_count(), before);
    }

    /// Keeps the level of every event seen on the subscribed thread.
    #[derive(Clone, Default)]
    struct LevelLog(Arc<Mutex<Vec<Level>>>);

    impl<S: Subscriber> Layer<S> for LevelLog {
        fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    impl LevelLog {
        fn count(&self, level: Level) -> usize {
            self.0.lock().unwrap().iter().filter(|l| **l == level).count()
        }
    }

    #[test]
    fn failed_load_logs_a_single_error() {
        let log = LevelLog::default();
        let subscriber = tracing_subscriber::registry().with(log.clone());
        tracing::subscriber::with_default(subscriber, || {
            let mut ctx = context(MemoryFetcher::new());
            let mut renderer = DebugTextRenderer::new();
            ctx.request_model_load().unwrap();
            run_until_settled(&mut ctx, &mut renderer);
            for _ in 0..3 {
                ctx.frame(DT, &mut renderer);
            }
        });
        assert_eq!(log.count(Level::ERROR), 1);
        assert_eq!(log.count(Level::WARN), 0);
    }

    #[test]
    fn retry_after_failure_is_allowed() {
        let mut ctx = context(MemoryFetcher::new());
        let mut renderer = DebugTextRenderer::new();
        ctx.request_model_load().unwrap();
        run_until_settled(&mut ctx, &mut renderer);

        ctx.request_model_load().unwrap();
        assert_eq!(*ctx.load_status(), LoadStatus::Pending(None));
        run_until_settled(&mut ctx, &mut renderer);
        assert_eq!(ctx.failed_loads(), 2);
    }

    #[test]
    fn shutdown_cancels_pending_load() {
        let fetcher = MemoryFetcher::new().with_file("ship/scene.gltf", fixtures::embedded_gltf());
        let mut ctx = context(fetcher);
        ctx.request_model_load().unwrap();
        ctx.shutdown();
        assert_eq!(*ctx.load_status(), LoadStatus::NotRequested);
    }
}
