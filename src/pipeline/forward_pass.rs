//! Forward pass for unlit renderables

use super::{bind_renderable, FrameScene, PassContext};
use crate::backend::*;

/// Draws renderables with lighting disabled straight into the output target,
/// depth tested against the resolved G-buffer depth.
#[derive(Debug, Default)]
pub struct ForwardPass;

impl ForwardPass {
    pub fn new() -> Self {
        Self
    }

    pub fn execute<B: GraphicsBackend + ?Sized>(&self, ctx: &mut PassContext<'_, B>, scene: &FrameScene) {
        for (_, transform, renderable) in scene.renderables.iter().filter(|(_, _, r)| !r.lighting_enabled) {
            let Some(geometry) = bind_renderable(ctx.backend, ctx.eye, transform, renderable) else {
                continue;
            };
            ctx.backend.set_uniform("viewPosW", ctx.eye.position.into());
            ctx.backend.draw(geometry.handle, geometry.element_count);
            ctx.stats.forward_draws += 1;
        }
        ctx.backend.use_shader(None);
    }
}
