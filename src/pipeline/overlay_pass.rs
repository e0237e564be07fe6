//! Screen-space overlay pass
//!
//! Quads and cursors are alpha blended over the frame in list order. In
//! stereo mode shaders are told to project the overlay through the
//! head-locked view so it survives the lens distortion.

use super::PassContext;
use crate::backend::*;
use crate::scene::ScreenSpaceComponent;

#[derive(Debug, Default)]
pub struct OverlayPass;

impl OverlayPass {
    pub fn new() -> Self {
        Self
    }

    pub fn execute<B: GraphicsBackend + ?Sized>(
        &self,
        ctx: &mut PassContext<'_, B>,
        overlays: &[ScreenSpaceComponent],
    ) {
        if overlays.is_empty() {
            return;
        }

        ctx.backend.set_blend_state(Some(BlendState::alpha_blending()));

        for overlay in overlays {
            if !overlay.should_draw() {
                continue;
            }
            let (Some(shader), Some(geometry)) = (overlay.shader, overlay.geometry) else {
                continue;
            };

            // Cursors always sit on top of everything else
            if overlay.is_cursor() {
                ctx.backend.set_cull_mode(CullMode::None);
                ctx.backend.set_depth_state(DepthState::disabled());
            } else {
                ctx.backend.set_cull_mode(CullMode::Back);
                ctx.backend.set_depth_state(DepthState::standard());
            }

            ctx.backend.use_shader(Some(shader));
            ctx.backend.set_uniform("in_View", ctx.eye.overlay_view.into());
            ctx.backend.set_uniform("in_Proj", ctx.eye.projection.into());
            ctx.backend.set_uniform("in_Pos", overlay.clip_offset().into());
            ctx.backend.set_uniform("in_Hotspot", overlay.scaled_hotspot().into());
            ctx.backend
                .set_uniform("enable_projection", i32::from(ctx.eye.stereo).into());
            ctx.backend.set_uniform("in_Texture", 0i32.into());
            ctx.backend.bind_texture(0, overlay.texture);
            ctx.backend.draw(geometry.handle, geometry.element_count);
            ctx.stats.overlay_draws += 1;
        }

        ctx.backend.use_shader(None);
        ctx.backend.bind_texture(0, None);
        ctx.backend.set_blend_state(None);
        ctx.backend.set_depth_state(DepthState::standard());
        ctx.backend.set_cull_mode(CullMode::Back);
    }
}
