//! Stereo Deferred - a deferred-shading rendering core with HMD stereo output
//!
//! The core drives an immediate-mode [`GraphicsBackend`](backend::GraphicsBackend)
//! and owns everything that lives on the GPU side of a scene:
//! - Off-screen render targets (G-buffer and stereo composite)
//! - A stack of views (first-person, six-DOF, head-mounted display)
//! - Lens-distortion geometry derived from an HMD descriptor
//! - Typed registries of renderables, lights and screen-space overlays
//! - A component factory building all of the above from property lists
//! - A framerate-gated frame pipeline
//!
//! Scene state is kept in a Bevy ECS `World`.

pub mod backend;
pub mod engine;
pub mod error;
pub mod factory;
pub mod pipeline;
pub mod resources;
pub mod scene;
pub mod stereo;
pub mod view;

use std::path::Path;

use serde::Deserialize;

pub use engine::{FrameOutput, RenderSystem};
pub use error::{ConfigError, RenderError, RenderResult};
pub use factory::{ComponentFactory, CreatedComponent, Property, PropertyValue};
pub use pipeline::FrameStats;
pub use scene::EntityId;
pub use stereo::{HmdInfo, StereoProfile};
pub use view::{EyeSelection, View, ViewStack};

/// Names of the programs used by the built-in pipeline passes
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShaderPaths {
    pub ambient: String,
    pub point_light: String,
    pub spot_light: String,
    pub distortion: String,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            ambient: "shaders/ambient".to_string(),
            point_light: "shaders/pointlight".to_string(),
            spot_light: "shaders/spotlight".to_string(),
            distortion: "shaders/post".to_string(),
        }
    }
}

/// Configuration for the rendering system
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Target frames per second for the update gate
    pub framerate: f32,
    /// Vertical field of view in degrees
    pub field_of_view: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    pub clear_color: [f32; 4],
    pub ambient_color: [f32; 4],
    /// Ambient term written by the geometry pass
    pub ambient_intensity: f32,
    /// Distance in front of the eyes at which head-locked overlays sit in stereo
    pub overlay_distance: f32,
    /// Fraction of the IPD applied to head-locked overlays
    pub fixed_ipd_scale: f32,
    pub shaders: ShaderPaths,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            framerate: 60.0,
            field_of_view: 45.0,
            near_plane: 0.1,
            far_plane: 10000.0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            ambient_color: [0.1, 0.1, 0.1, 1.0],
            ambient_intensity: 0.05,
            overlay_distance: 2.2,
            fixed_ipd_scale: 0.01,
            shaders: ShaderPaths::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load a TOML config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Seconds between rendered frames
    pub fn frame_interval(&self) -> f32 {
        1.0 / self.framerate
    }

    /// Aspect ratio of the main projection. Windows taller than wide fall back to 4:3.
    pub fn aspect_ratio(&self) -> f32 {
        aspect_ratio(self.width, self.height)
    }
}

pub(crate) fn aspect_ratio(width: u32, height: u32) -> f32 {
    let aspect = width as f32 / height.max(1) as f32;
    if aspect < 1.0 {
        4.0 / 3.0
    } else {
        aspect
    }
}
