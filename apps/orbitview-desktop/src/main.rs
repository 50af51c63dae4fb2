use anyhow::{Context as _, Result, anyhow};
use clap::Parser;
use egui::Context as EguiContext;
use glam::Vec2;
use orbitview_assets::FsFetcher;
use orbitview_input::{PointerButton, PointerTracker};
use orbitview_render_wgpu::{RenderSettings, WgpuRenderer};
use orbitview_scene::NodeKind;
use orbitview_tools::SceneInspector;
use orbitview_viewer::{LoadStatus, ViewerConfig, ViewerContext};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "orbitview-desktop", about = "Orbit around a glTF model")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML config file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing the model
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Model description file inside the model directory
    #[arg(long)]
    model_file: Option<String>,
}

/// Pixels of trackpad scroll that count as one wheel notch.
const PIXELS_PER_NOTCH: f32 = 50.0;

/// Frame deltas above this are clamped so a stall doesn't fling the camera.
const MAX_FRAME_DT: Duration = Duration::from_millis(100);

/// Window, surface and device, created once the event loop resumes.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Gpu {
    fn new(event_loop: &ActiveEventLoop, viewer: &ViewerConfig, egui_ctx: &EguiContext) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title(viewer.window.title.clone())
            .with_inner_size(LogicalSize::new(viewer.window.width, viewer.window.height));
        let window = Arc::new(event_loop.create_window(attrs).context("create window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .context("create surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow!("no GPU adapter can present to this window"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("orbitview_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("create device")?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow!("surface reports no formats"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if viewer.renderer.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let r = &viewer.renderer;
        let renderer = WgpuRenderer::new(
            &device,
            surface_format,
            config.width,
            config.height,
            RenderSettings {
                sample_count: r.msaa_samples,
                shadow_map_size: r.shadow_map_size,
                shadows: r.shadows,
                ambient: r.ambient,
            },
        );

        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            format = ?surface_format,
            "GPU initialized"
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.config.width = size.width.max(1);
        self.config.height = size.height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.renderer
            .resize(&self.device, self.config.width, self.config.height);
    }

    fn paint_ui(
        &mut self,
        view: &wgpu::TextureView,
        egui_ctx: &EguiContext,
        full_output: egui::FullOutput,
    ) {
        self.egui_winit
            .handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            self.egui_renderer
                .render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

struct GpuApp {
    viewer: ViewerContext,
    pointer: PointerTracker,
    show_inspector: bool,
    last_frame: Instant,
    egui_ctx: EguiContext,
    gpu: Option<Gpu>,
}

impl GpuApp {
    fn new(viewer: ViewerContext) -> Self {
        Self {
            viewer,
            pointer: PointerTracker::new(),
            show_inspector: false,
            last_frame: Instant::now(),
            egui_ctx: EguiContext::default(),
            gpu: None,
        }
    }

    /// Push a physical window size and scale factor into the viewport.
    fn sync_viewport(&mut self, size: PhysicalSize<u32>, scale_factor: f64) {
        self.viewer.set_pixel_ratio(scale_factor as f32);
        let logical: LogicalSize<f64> = size.to_logical(scale_factor);
        let changed = self
            .viewer
            .resize(logical.width.round() as u32, logical.height.round() as u32);
        if changed {
            tracing::debug!(
                width = self.viewer.viewport().width(),
                height = self.viewer.viewport().height(),
                scale_factor,
                "viewport resized"
            );
        }
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame).min(MAX_FRAME_DT);
        self.last_frame = now;

        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.viewer
            .frame(dt, &mut gpu.renderer.frame(&gpu.device, &gpu.queue, &view));

        let raw_input = gpu.egui_winit.take_egui_input(&gpu.window);
        let viewer = &mut self.viewer;
        let show_inspector = self.show_inspector;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            draw_load_overlay(ctx, viewer);
            if show_inspector {
                draw_inspector(ctx, viewer);
            }
        });
        gpu.paint_ui(&view, &self.egui_ctx, full_output);

        output.present();
        gpu.window.request_redraw();
    }

    fn handle_key(&mut self, key: KeyCode, event_loop: &ActiveEventLoop) {
        match key {
            KeyCode::F1 => self.show_inspector = !self.show_inspector,
            KeyCode::Escape => {
                self.viewer.shutdown();
                event_loop.exit();
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match Gpu::new(event_loop, self.viewer.config(), &self.egui_ctx) {
            Ok(gpu) => {
                let (size, scale) = (gpu.window.inner_size(), gpu.window.scale_factor());
                self.gpu = Some(gpu);
                self.sync_viewport(size, scale);
                self.last_frame = Instant::now();
            }
            Err(e) => {
                tracing::error!("failed to initialize graphics: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if let Some(gpu) = self.gpu.as_mut() {
            let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                self.viewer.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                let Some(gpu) = self.gpu.as_mut() else {
                    return;
                };
                gpu.resize(size);
                let scale = gpu.window.scale_factor();
                self.sync_viewport(size, scale);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(gpu) = &self.gpu {
                    let size = gpu.window.inner_size();
                    self.sync_viewport(size, scale_factor);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(key, event_loop),
            WindowEvent::MouseInput { button, state, .. } => {
                let button = match button {
                    MouseButton::Left => PointerButton::Primary,
                    MouseButton::Right => PointerButton::Secondary,
                    MouseButton::Middle => PointerButton::Middle,
                    _ => return,
                };
                self.pointer.button(button, state == ElementState::Pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let ratio = f64::from(self.viewer.viewport().pixel_ratio());
                let logical = position.to_logical::<f32>(ratio);
                if let Some(action) = self.pointer.cursor_moved(Vec2::new(logical.x, logical.y)) {
                    self.viewer.apply_input(action);
                }
            }
            WindowEvent::CursorLeft { .. } => self.pointer.cursor_left(),
            WindowEvent::MouseWheel { delta, .. } => {
                // Scrolling up moves the camera in.
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y,
                    MouseScrollDelta::PixelDelta(p) => -(p.y as f32) / PIXELS_PER_NOTCH,
                };
                if let Some(action) = self.pointer.wheel(notches) {
                    self.viewer.apply_input(action);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

/// Centered progress box while the model loads, or the error with a retry
/// button once it has failed. Hidden otherwise.
fn draw_load_overlay(ctx: &EguiContext, viewer: &mut ViewerContext) {
    let status = viewer.load_status().clone();
    if !status.overlay_visible() {
        return;
    }

    egui::Window::new("model_status")
        .title_bar(false)
        .resizable(false)
        .collapsible(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| match status {
            LoadStatus::Pending(progress) => {
                ui.label("Loading model");
                match progress.and_then(|p| p.fraction()) {
                    Some(fraction) => {
                        ui.add(
                            egui::ProgressBar::new(fraction)
                                .desired_width(240.0)
                                .show_percentage(),
                        );
                    }
                    None => {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            if let Some(p) = progress {
                                ui.label(format!("{} KiB", p.loaded_bytes / 1024));
                            }
                        });
                    }
                }
            }
            LoadStatus::Failed(message) => {
                ui.colored_label(egui::Color32::LIGHT_RED, "Model failed to load");
                ui.label(message);
                if ui.button("Retry").clicked() {
                    if let Err(e) = viewer.request_model_load() {
                        tracing::warn!("retry rejected: {e}");
                    }
                }
            }
            LoadStatus::NotRequested | LoadStatus::Loaded(_) => {}
        });
}

fn draw_inspector(ctx: &EguiContext, viewer: &ViewerContext) {
    let summary = SceneInspector::summary(viewer.scene(), viewer.meshes());
    let camera = viewer.camera();

    egui::SidePanel::left("inspector")
        .default_width(280.0)
        .show(ctx, |ui| {
            ui.heading("Scene");
            ui.separator();
            ui.label(format!(
                "Nodes: {}  Meshes: {}  Lights: {}",
                summary.node_count, summary.mesh_nodes, summary.lights
            ));
            ui.label(format!(
                "Triangles: {}  Casters: {}",
                summary.triangles, summary.shadow_casters
            ));
            ui.label(format!(
                "Camera: ({:.1}, {:.1}, {:.1})  dist {:.1}",
                camera.position.x,
                camera.position.y,
                camera.position.z,
                camera.distance()
            ));
            ui.label(format!("{:.0} fps", viewer.timer().fps()));
            ui.separator();

            egui::ScrollArea::vertical().show(ui, |ui| {
                for visit in viewer.scene().traverse() {
                    let kind = match visit.node.kind {
                        NodeKind::Group => "group",
                        NodeKind::Mesh(_) => "mesh",
                        NodeKind::Light(_) => "light",
                    };
                    ui.monospace(format!(
                        "{}{} [{kind}]",
                        "  ".repeat(visit.depth),
                        visit.node.name
                    ));
                }
            });

            ui.separator();
            ui.small("F1: Inspector | LMB: Orbit | Wheel: Zoom | Esc: Quit");
        });
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("orbitview-desktop starting");

    let config = match &cli.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    }
    .with_model_path(cli.model_dir, cli.model_file);
    let load_on_start = config.model.load_on_start;

    let mut viewer = ViewerContext::new(config, Arc::new(FsFetcher))?;
    if load_on_start {
        viewer.request_model_load()?;
    }

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(viewer);
    event_loop.run_app(&mut app)?;

    Ok(())
}
