//! Mesh-backed drawable component

use bevy_ecs::prelude::*;

use crate::backend::{CullMode, ShaderHandle, TextureHandle};
use crate::resources::GpuGeometry;

/// What produced a renderable's geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderableKind {
    Sprite,
    IcoSphere,
    CubeSphere,
    Mesh,
}

/// Drawable component.
///
/// Missing shader or geometry is not an error; such a renderable is simply
/// skipped by the passes.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Renderable {
    pub kind: RenderableKind,
    pub shader: Option<ShaderHandle>,
    pub geometry: Option<GpuGeometry>,
    pub texture: Option<TextureHandle>,
    /// Drawn in the G-buffer pass when set, in the forward pass otherwise
    pub lighting_enabled: bool,
    /// Ignore viewer translation (skyboxes)
    pub infinite_distance: bool,
    /// Follow the viewer's position
    pub fix_to_camera: bool,
    pub cull_face: CullMode,
}

impl Renderable {
    pub fn new(kind: RenderableKind) -> Self {
        Self {
            kind,
            shader: None,
            geometry: None,
            texture: None,
            lighting_enabled: true,
            infinite_distance: false,
            fix_to_camera: false,
            cull_face: CullMode::Back,
        }
    }

    /// Shader and non-empty geometry are both present
    pub fn is_drawable(&self) -> bool {
        self.shader.is_some() && self.geometry.is_some_and(|g| g.element_count > 0)
    }
}
