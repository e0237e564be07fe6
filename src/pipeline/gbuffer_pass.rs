//! G-Buffer pass
//!
//! Draws every lighting-enabled renderable into the primary render target.
//! Lighting is deferred, so each program only gets a flat ambient term.

use super::{bind_renderable, FrameScene, PassContext};
use crate::backend::*;

#[derive(Debug, Default)]
pub struct GBufferPass;

impl GBufferPass {
    pub fn new() -> Self {
        Self
    }

    /// The primary target must already be bound for writing and cleared
    pub fn execute<B: GraphicsBackend + ?Sized>(&self, ctx: &mut PassContext<'_, B>, scene: &FrameScene) {
        ctx.backend.set_blend_state(None);
        ctx.backend.set_depth_state(DepthState::standard());

        for (entity, transform, renderable) in &scene.renderables {
            if !renderable.lighting_enabled {
                continue;
            }
            let Some(geometry) = bind_renderable(ctx.backend, ctx.eye, transform, renderable) else {
                log::trace!("Skipping G-buffer draw for entity {}", entity);
                continue;
            };
            ctx.backend.set_uniform("ambLightIntensity", ctx.config.ambient_intensity.into());
            ctx.backend.set_uniform("diffuseLightIntensity", 0.0f32.into());
            ctx.backend.set_uniform("specularLightIntensity", 0.0f32.into());
            ctx.backend.set_uniform("viewPosW", ctx.eye.position.into());
            ctx.backend.draw(geometry.handle, geometry.element_count);
            ctx.stats.geometry_draws += 1;
        }

        ctx.backend.use_shader(None);
    }
}
