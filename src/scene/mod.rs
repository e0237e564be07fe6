//! Scene management
//!
//! Renderables and lights live in a typed ECS-backed registry; screen-space
//! overlays are a separate ordered list owned by the render system.

mod light;
mod overlay;
mod registry;
mod renderable;
mod transform;

pub use light::*;
pub use overlay::*;
pub use registry::*;
pub use renderable::*;
pub use transform::*;

/// Entity id assigned by the host application
pub type EntityId = u32;
