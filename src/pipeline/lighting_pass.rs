//! Deferred lighting pass
//!
//! Samples the G-buffer with fullscreen quads: one ambient quad without
//! blending, then one additive quad per light that survives frustum culling.

use glam::Vec4;

use super::{FrameScene, PassContext};
use crate::backend::*;
use crate::resources::GpuGeometry;
use crate::view::Frustum;

/// G-buffer attachment slots sampled by the light programs
const DIFFUSE_UNIT: u32 = 0;
const NORMAL_UNIT: u32 = 1;
const DEPTH_UNIT: u32 = 2;

#[derive(Debug, Default)]
pub struct LightingPass {
    pub ambient_shader: Option<ShaderHandle>,
    pub point_shader: Option<ShaderHandle>,
    pub spot_shader: Option<ShaderHandle>,
    /// Fullscreen quad every light draws
    pub quad: Option<GpuGeometry>,
}

impl LightingPass {
    pub fn new(
        ambient_shader: Option<ShaderHandle>,
        point_shader: Option<ShaderHandle>,
        spot_shader: Option<ShaderHandle>,
        quad: Option<GpuGeometry>,
    ) -> Self {
        Self {
            ambient_shader,
            point_shader,
            spot_shader,
            quad,
        }
    }

    /// `gbuffer` holds the primary target's color attachments in slot order
    pub fn execute<B: GraphicsBackend + ?Sized>(
        &self,
        ctx: &mut PassContext<'_, B>,
        scene: &FrameScene,
        gbuffer: &[TextureHandle],
    ) {
        let Some(quad) = self.quad.filter(|q| q.element_count > 0) else {
            log::debug!("No fullscreen quad, skipping lighting");
            return;
        };

        ctx.backend.set_depth_state(DepthState {
            test_enabled: false,
            write_enabled: false,
            compare: CompareFunction::Less,
        });
        ctx.backend.set_cull_mode(CullMode::None);

        self.draw_ambient(ctx, quad, gbuffer);

        ctx.backend.set_blend_state(Some(BlendState::additive()));
        let view_projection = ctx.eye.view_projection();
        let frustum = Frustum::from_view_projection(&view_projection);
        let view_projection_inverse = view_projection.inverse();

        if let Some(shader) = self.point_shader {
            for (entity, transform, light) in &scene.point_lights {
                if !frustum.intersects_sphere(transform.position, light.radius) {
                    log::trace!("Culled point light {}", entity);
                    ctx.stats.point_lights_culled += 1;
                    continue;
                }
                ctx.backend.use_shader(Some(shader));
                set_common_uniforms(ctx, view_projection_inverse, transform.position, light.color);
                ctx.backend.set_uniform("lightRadius", light.radius.into());
                ctx.backend.set_uniform("lightIntensity", light.intensity.into());
                ctx.backend.set_uniform("lightFalloff", light.falloff.into());
                bind_gbuffer(ctx.backend, gbuffer);
                ctx.backend.draw(quad.handle, quad.element_count);
                ctx.stats.point_lights_drawn += 1;
            }
        } else if !scene.point_lights.is_empty() {
            log::debug!("Point light program unavailable, {} lights skipped", scene.point_lights.len());
        }

        if let Some(shader) = self.spot_shader {
            for (entity, transform, light) in scene.spot_lights.iter().filter(|(_, _, l)| l.enabled) {
                if light.is_bounded() && !frustum.intersects_sphere(transform.position, light.range) {
                    log::trace!("Culled spot light {}", entity);
                    ctx.stats.spot_lights_culled += 1;
                    continue;
                }
                ctx.backend.use_shader(Some(shader));
                set_common_uniforms(ctx, view_projection_inverse, transform.position, light.color);
                ctx.backend.set_uniform("lightDirW", transform.forward().into());
                ctx.backend.set_uniform("lightIntensity", light.intensity.into());
                ctx.backend.set_uniform("lightCosInnerAngle", light.cos_inner_angle().into());
                ctx.backend.set_uniform("lightCosOuterAngle", light.cos_outer_angle().into());
                bind_gbuffer(ctx.backend, gbuffer);
                ctx.backend.draw(quad.handle, quad.element_count);
                ctx.stats.spot_lights_drawn += 1;
            }
        } else if !scene.spot_lights.is_empty() {
            log::debug!("Spot light program unavailable, {} lights skipped", scene.spot_lights.len());
        }

        // Restore state for the forward and overlay passes
        ctx.backend.use_shader(None);
        for unit in [DIFFUSE_UNIT, NORMAL_UNIT, DEPTH_UNIT] {
            ctx.backend.bind_texture(unit, None);
        }
        ctx.backend.set_blend_state(None);
        ctx.backend.set_depth_state(DepthState::standard());
        ctx.backend.set_cull_mode(CullMode::Back);
    }

    fn draw_ambient<B: GraphicsBackend + ?Sized>(
        &self,
        ctx: &mut PassContext<'_, B>,
        quad: GpuGeometry,
        gbuffer: &[TextureHandle],
    ) {
        let Some(shader) = self.ambient_shader else {
            log::debug!("Ambient program unavailable");
            return;
        };
        ctx.backend.set_blend_state(None);
        ctx.backend.use_shader(Some(shader));
        ctx.backend
            .set_uniform("ambientColor", Vec4::from_array(ctx.config.ambient_color).into());
        ctx.backend.set_uniform("colorBuffer", (DIFFUSE_UNIT as i32).into());
        ctx.backend.bind_texture(DIFFUSE_UNIT, gbuffer.first().copied());
        ctx.backend.draw(quad.handle, quad.element_count);
    }
}

fn set_common_uniforms<B: GraphicsBackend + ?Sized>(
    ctx: &mut PassContext<'_, B>,
    view_projection_inverse: glam::Mat4,
    light_position: glam::Vec3,
    color: Vec4,
) {
    ctx.backend.set_uniform("viewPosW", ctx.eye.position.into());
    ctx.backend.set_uniform("viewProjInverse", view_projection_inverse.into());
    ctx.backend.set_uniform("lightPosW", light_position.into());
    ctx.backend.set_uniform("lightColor", color.into());
    ctx.backend.set_uniform("diffuseBuffer", (DIFFUSE_UNIT as i32).into());
    ctx.backend.set_uniform("normalBuffer", (NORMAL_UNIT as i32).into());
    ctx.backend.set_uniform("depthBuffer", (DEPTH_UNIT as i32).into());
}

fn bind_gbuffer<B: GraphicsBackend + ?Sized>(backend: &mut B, gbuffer: &[TextureHandle]) {
    for unit in [DIFFUSE_UNIT, NORMAL_UNIT, DEPTH_UNIT] {
        backend.bind_texture(unit, gbuffer.get(unit as usize).copied());
    }
}
