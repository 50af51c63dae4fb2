use glam::Vec3;
use orbitview_assets::LoadRequest;
use orbitview_camera::ControllerLimits;
use orbitview_common::{Color, Transform};
use orbitview_scene::LightSource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors from loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Everything the viewer needs at startup. Every field has a default, so a
/// config file only has to name what it changes.
///
/// A `controls` section replaces the whole limit set; fields it omits take
/// the unconstrained [`ControllerLimits`] defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub controls: ControllerLimits,
    pub ground: GroundConfig,
    pub light: LightConfig,
    pub model: ModelConfig,
    pub renderer: RendererConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            controls: default_controls(),
            ground: GroundConfig::default(),
            light: LightConfig::default(),
            model: ModelConfig::default(),
            renderer: RendererConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub clear_color: Color,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Orbitview".to_owned(),
            width: 1280,
            height: 720,
            clear_color: Color::BLACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near_clip: f32,
    pub far_clip: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near_clip: 1.0,
            far_clip: 1000.0,
            position: Vec3::new(4.0, 5.0, 11.0),
            target: Vec3::new(0.0, 1.0, 0.0),
        }
    }
}

/// Orbit limits of the viewer: no panning, distance 5..20, polar
/// angle 0.5..1.5 rad, damped.
pub fn default_controls() -> ControllerLimits {
    ControllerLimits {
        min_distance: 5.0,
        max_distance: 20.0,
        min_polar_angle: 0.5,
        max_polar_angle: 1.5,
        damping_enabled: true,
        pan_enabled: false,
        auto_rotate: false,
        ..ControllerLimits::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundConfig {
    pub width: f32,
    pub depth: f32,
    pub segments_x: u32,
    pub segments_z: u32,
    pub color: Color,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            width: 20.0,
            depth: 20.0,
            segments_x: 32,
            segments_z: 32,
            color: Color::from_hex(0x555555),
            cast_shadow: false,
            receive_shadow: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub position: Vec3,
    pub cast_shadow: bool,
    pub source: LightSource,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 25.0, 0.0),
            cast_shadow: true,
            source: LightSource {
                color: Color::RED,
                intensity: 3000.0,
                range: 100.0,
                falloff_angle: 0.22,
                penumbra: 1.0,
                decay: 2.0,
                shadow_bias: -0.0001,
                target: Vec3::ZERO,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_dir: PathBuf,
    pub file_name: String,
    pub position: Vec3,
    /// Start loading as soon as the viewer is up.
    pub load_on_start: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("public/millennium_falcon"),
            file_name: "scene.gltf".to_owned(),
            position: Vec3::new(0.0, 1.05, -1.0),
            load_on_start: true,
        }
    }
}

impl ModelConfig {
    pub fn request(&self) -> LoadRequest {
        LoadRequest::new(&self.base_dir, &self.file_name)
            .with_placement(Transform::from_position(self.position))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// 1 disables multisampling; any other value renders at 4x.
    pub msaa_samples: u32,
    pub shadow_map_size: u32,
    pub shadows: bool,
    pub ambient: f32,
    pub vsync: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            msaa_samples: 4,
            shadow_map_size: 2048,
            shadows: true,
            ambient: 0.02,
            vsync: true,
        }
    }
}

impl ViewerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Override the model location (from command-line flags).
    pub fn with_model_path(mut self, base_dir: Option<PathBuf>, file_name: Option<String>) -> Self {
        if let Some(dir) = base_dir {
            self.model.base_dir = dir;
        }
        if let Some(file) = file_name {
            self.model.file_name = file;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_viewer() {
        let c = ViewerConfig::default();
        assert_eq!((c.window.width, c.window.height), (1280, 720));
        assert_eq!(c.window.clear_color, Color::BLACK);
        assert_eq!(c.camera.position, Vec3::new(4.0, 5.0, 11.0));
        assert_eq!(c.controls.min_distance, 5.0);
        assert_eq!(c.controls.max_distance, 20.0);
        assert!(c.controls.damping_enabled);
        assert!(!c.controls.pan_enabled);
        assert_eq!(c.light.source.intensity, 3000.0);
        assert_eq!(c.model.request().description_path(), PathBuf::from("public/millennium_falcon/scene.gltf"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "window:\n  width: 800\nmodel:\n  file_name: ship.glb\n";
        let c = ViewerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(c.window.width, 800);
        assert_eq!(c.window.height, 720);
        assert_eq!(c.model.file_name, "ship.glb");
        assert_eq!(c.model.base_dir, PathBuf::from("public/millennium_falcon"));
        assert_eq!(c.controls, default_controls());
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(ViewerConfig::from_yaml_str("{}").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn yaml_round_trip() {
        let mut c = ViewerConfig::default();
        c.controls.auto_rotate = true;
        c.renderer.msaa_samples = 1;
        let yaml = c.to_yaml().unwrap();
        assert_eq!(ViewerConfig::from_yaml_str(&yaml).unwrap(), c);
    }

    #[test]
    fn load_reports_io_and_yaml_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(ViewerConfig::load(&missing), Err(ConfigError::Io { .. })));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "window: [not, a, map]").unwrap();
        assert!(matches!(ViewerConfig::load(&bad), Err(ConfigError::Yaml { .. })));

        let good = dir.path().join("good.yaml");
        std::fs::write(&good, "camera:\n  fov_degrees: 60.0\n").unwrap();
        assert_eq!(ViewerConfig::load(&good).unwrap().camera.fov_degrees, 60.0);
    }

    #[test]
    fn model_path_overrides() {
        let c = ViewerConfig::default().with_model_path(Some("models/ship".into()), None);
        assert_eq!(c.model.base_dir, PathBuf::from("models/ship"));
        assert_eq!(c.model.file_name, "scene.gltf");
    }
}
