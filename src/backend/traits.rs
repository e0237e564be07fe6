//! Core backend abstraction trait
//!
//! The rendering core drives the GPU through this immediate-mode interface.
//! Resources are referred to by opaque handles; all state (bound framebuffers,
//! current program, blend/depth/cull) lives inside the backend.

use crate::backend::types::*;
use glam::{Mat4, Vec2, Vec3, Vec4};
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create framebuffer: {0}")]
    FramebufferCreationFailed(String),
    #[error("Failed to create depth-stencil buffer: {0}")]
    RenderbufferCreationFailed(String),
    #[error("Failed to load shader: {0}")]
    ShaderCreationFailed(String),
    #[error("Failed to create geometry: {0}")]
    GeometryCreationFailed(String),
    #[error("Invalid enum")]
    InvalidEnum,
    #[error("Invalid value")]
    InvalidValue,
    #[error("Invalid operation")]
    InvalidOperation,
    #[error("Invalid framebuffer operation")]
    InvalidFramebufferOperation,
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a depth-stencil render buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderbufferHandle(pub(crate) u64);

/// Handle to a framebuffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub(crate) u64);

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub(crate) u64);

/// Handle to uploaded vertex/index data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(pub(crate) u64);

macro_rules! impl_raw_handle {
    ($($handle:ident),*) => {
        $(
            impl $handle {
                /// Raw backend identifier
                pub fn raw(&self) -> u64 {
                    self.0
                }
            }
        )*
    };
}

impl_raw_handle!(
    TextureHandle,
    RenderbufferHandle,
    FramebufferHandle,
    ShaderHandle,
    GeometryHandle
);

/// Value assigned to a named shader uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        UniformValue::Mat4(value)
    }
}

/// Limits and version reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// (major, minor) version of the underlying API
    pub api_version: (u32, u32),
    pub max_color_attachments: u32,
    pub max_texture_size: u32,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            api_version: (3, 3),
            max_color_attachments: 8,
            max_texture_size: 8192,
        }
    }
}

/// Immediate-mode graphics capability consumed by the rendering core
pub trait GraphicsBackend {
    /// Human readable backend name
    fn name(&self) -> &str;

    /// Version and limits
    fn capabilities(&self) -> BackendCapabilities;

    // === Textures ===

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Upload tightly packed pixel data covering the whole texture
    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]);

    /// Bind a texture to a sampler unit, `None` unbinds the unit
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>);

    fn destroy_texture(&mut self, texture: TextureHandle);

    // === Framebuffers ===

    fn create_depth_stencil_buffer(
        &mut self,
        width: u32,
        height: u32,
    ) -> BackendResult<RenderbufferHandle>;

    fn destroy_renderbuffer(&mut self, renderbuffer: RenderbufferHandle);

    fn create_framebuffer(&mut self, label: Option<&str>) -> BackendResult<FramebufferHandle>;

    /// Attach a texture as color attachment `slot`
    fn attach_color(&mut self, framebuffer: FramebufferHandle, slot: u32, texture: TextureHandle);

    fn attach_depth_stencil(
        &mut self,
        framebuffer: FramebufferHandle,
        renderbuffer: RenderbufferHandle,
    );

    fn framebuffer_status(&self, framebuffer: FramebufferHandle) -> FramebufferStatus;

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    /// Bind a framebuffer, `None` selects the default backbuffer
    fn bind_framebuffer(&mut self, binding: FramebufferBinding, framebuffer: Option<FramebufferHandle>);

    /// Route fragment outputs to the first `count` color attachments of the draw framebuffer
    fn set_draw_buffers(&mut self, count: u32);

    /// Copy depth from the bound read framebuffer into the bound draw framebuffer
    fn blit_depth(&mut self, src: Viewport, dst: Viewport);

    // === Shaders ===

    /// Compile and link the program stored under `name`
    fn load_shader(&mut self, name: &str) -> BackendResult<ShaderHandle>;

    fn use_shader(&mut self, shader: Option<ShaderHandle>);

    /// Set a uniform on the current program. Unknown names are ignored.
    fn set_uniform(&mut self, name: &str, value: UniformValue);

    // === Geometry ===

    fn create_geometry(&mut self, desc: &GeometryDescriptor) -> BackendResult<GeometryHandle>;

    fn destroy_geometry(&mut self, geometry: GeometryHandle);

    fn draw(&mut self, geometry: GeometryHandle, element_count: u32);

    // === Fixed-function state ===

    fn set_viewport(&mut self, viewport: Viewport);

    /// Restrict clears and draws to a rectangle, `None` disables scissoring
    fn set_scissor(&mut self, scissor: Option<Viewport>);

    fn clear(&mut self, color: [f32; 4], flags: ClearFlags);

    fn set_depth_state(&mut self, state: DepthState);

    /// `None` disables blending
    fn set_blend_state(&mut self, blend: Option<BlendState>);

    fn set_cull_mode(&mut self, mode: CullMode);

    /// Block until all issued work has completed
    fn finish(&mut self);

    /// Pop the oldest pending error code, if any
    fn poll_error(&mut self) -> Option<BackendError>;
}
