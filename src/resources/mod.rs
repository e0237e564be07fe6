//! Resource management
//!
//! Handles render targets, textures, shader programs and meshes. All of it
//! is owned by the render system and released when it shuts down.

mod mesh;
mod render_target;
mod shader;
mod texture;

pub use mesh::*;
pub use render_target::*;
pub use shader::*;
pub use texture::*;

use crate::backend::GraphicsBackend;

/// Name-keyed GPU resources shared by every factory function
#[derive(Debug, Default)]
pub struct ResourceManager {
    pub textures: TextureCache,
    pub shaders: ShaderCache,
    pub meshes: MeshLibrary,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destroy every cached texture and geometry
    pub fn release_all<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        self.textures.release_all(backend);
        self.meshes.release_all(backend);
        self.shaders.clear();
    }
}
