use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use glam::Vec2;
use orbitview_assets::{FsFetcher, LoadRequest, LoadResult, load_blocking};
use orbitview_input::CameraAction;
use orbitview_render::DebugTextRenderer;
use orbitview_scene::{MeshStore, SceneGraph};
use orbitview_tools::SceneInspector;
use orbitview_viewer::{LoadStatus, ViewerConfig, ViewerContext};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orbitview-cli", about = "Headless tooling for the orbitview viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and default scene settings
    Info,
    /// Load a model and print its node tree
    Inspect {
        /// Directory containing the model
        dir: PathBuf,
        /// Model description file inside the directory
        #[arg(short, long, default_value = "scene.gltf")]
        file: String,
    },
    /// Run the viewer headless and print the final frame
    Simulate {
        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of frames to run after the load settles
        #[arg(short, long, default_value = "120")]
        frames: u32,
        /// Horizontal drag in pixels applied on the first frame
        #[arg(long, default_value = "0")]
        orbit: f32,
        /// Wheel notches applied on the first frame
        #[arg(long, default_value = "0")]
        zoom: f32,
    },
    /// Print the default configuration as YAML
    Config,
}

const FRAME_DT: Duration = Duration::from_millis(16);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            let config = ViewerConfig::default();
            println!("orbitview-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "window: {}x{}  camera: fov={} at ({}, {}, {})",
                config.window.width,
                config.window.height,
                config.camera.fov_degrees,
                config.camera.position.x,
                config.camera.position.y,
                config.camera.position.z
            );
            println!(
                "controls: distance {}..{}  polar {}..{}  damping={}  pan={}",
                config.controls.min_distance,
                config.controls.max_distance,
                config.controls.min_polar_angle,
                config.controls.max_polar_angle,
                config.controls.damping_enabled,
                config.controls.pan_enabled
            );
            println!(
                "model: {}",
                config.model.request().description_path().display()
            );
        }
        Commands::Inspect { dir, file } => {
            let request = LoadRequest::new(dir, file);
            let started = Instant::now();
            let result = load_blocking(&FsFetcher, &request, |p| {
                tracing::debug!(loaded = p.loaded_bytes, total = p.total_bytes, "progress");
            });
            let model = match result {
                LoadResult::Success(model) => model,
                LoadResult::Failure(e) => {
                    return Err(e).with_context(|| {
                        format!("loading {}", request.description_path().display())
                    });
                }
            };
            println!(
                "Loaded {} in {:.1?}",
                request.description_path().display(),
                started.elapsed()
            );

            let mut scene = SceneGraph::new();
            let mut meshes = MeshStore::new();
            for (handle, mesh) in model.meshes {
                meshes.insert_with_handle(handle, mesh);
            }
            scene.graft(scene.root(), model.root)?;

            println!("{}", SceneInspector::summary(&scene, &meshes));
            for id in SceneInspector::list_nodes(&scene) {
                if let Some(info) = SceneInspector::inspect_node(&scene, id) {
                    println!("  {info}");
                }
            }
        }
        Commands::Simulate {
            config,
            frames,
            orbit,
            zoom,
        } => {
            let config = match config {
                Some(path) => ViewerConfig::load(path)?,
                None => ViewerConfig::default(),
            };
            let load = config.model.load_on_start;
            let mut viewer = ViewerContext::new(config, Arc::new(FsFetcher))?;
            let mut renderer = DebugTextRenderer::new();

            if load {
                viewer.request_model_load()?;
                let deadline = Instant::now() + Duration::from_secs(60);
                while matches!(viewer.load_status(), LoadStatus::Pending(_)) {
                    if Instant::now() > deadline {
                        bail!("model load did not finish within a minute");
                    }
                    viewer.frame(FRAME_DT, &mut renderer);
                    std::thread::sleep(Duration::from_millis(5));
                }
                if let LoadStatus::Failed(message) = viewer.load_status() {
                    println!("Model failed to load: {message}");
                }
            }

            if orbit != 0.0 {
                viewer.apply_input(CameraAction::Orbit(Vec2::new(orbit, 0.0)));
            }
            if zoom != 0.0 {
                viewer.apply_input(CameraAction::Zoom(zoom));
            }

            let mut last = String::new();
            for _ in 0..frames {
                last = viewer.frame(FRAME_DT, &mut renderer);
            }
            print!("{last}");
            println!(
                "{}",
                SceneInspector::summary(viewer.scene(), viewer.meshes())
            );
            viewer.shutdown();
        }
        Commands::Config => {
            print!("{}", ViewerConfig::default().to_yaml()?);
        }
    }

    Ok(())
}
