//! Lens distortion post-process
//!
//! Warps the side-by-side stereo image onto the default framebuffer with a
//! barrel distortion and chromatic aberration correction. Left and right eye
//! parameters travel packed in the `xy` and `zw` halves of vec4 uniforms.

use super::PassContext;
use crate::backend::*;
use crate::resources::GpuGeometry;
use crate::stereo::StereoProfile;

#[derive(Debug, Default)]
pub struct DistortionPass {
    pub shader: Option<ShaderHandle>,
    /// Four-vertex fullscreen triangle strip
    pub strip: Option<GpuGeometry>,
}

impl DistortionPass {
    pub fn new(shader: Option<ShaderHandle>, strip: Option<GpuGeometry>) -> Self {
        Self { shader, strip }
    }

    /// Draw `source` through the distortion program into the window.
    ///
    /// Ends with a full pipeline flush so presentation sees a finished image.
    /// Returns false when the program or strip is unavailable; the frame is
    /// still flushed in that case.
    pub fn execute<B: GraphicsBackend + ?Sized>(
        &self,
        ctx: &mut PassContext<'_, B>,
        profile: &StereoProfile,
        source: Option<TextureHandle>,
    ) -> bool {
        ctx.backend.bind_framebuffer(FramebufferBinding::Both, None);
        ctx.backend.set_viewport(ctx.eye.viewport);
        ctx.backend.set_scissor(None);

        let applied = match (self.shader, self.strip) {
            (Some(shader), Some(strip)) if strip.element_count > 0 => {
                draw_distorted(ctx.backend, shader, strip, profile, source);
                true
            }
            _ => {
                log::debug!("Distortion program unavailable, stereo image not presented");
                false
            }
        };

        ctx.backend.finish();
        ctx.stats.distortion_applied = applied;
        applied
    }
}

fn draw_distorted<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    shader: ShaderHandle,
    strip: GpuGeometry,
    profile: &StereoProfile,
    source: Option<TextureHandle>,
) {
    backend.set_depth_state(DepthState::disabled());
    backend.set_cull_mode(CullMode::None);
    backend.set_blend_state(None);

    backend.use_shader(Some(shader));
    backend.set_uniform("in_Texture", 0i32.into());
    backend.bind_texture(0, source);
    backend.set_uniform("ScaleIn", profile.scale_in.into());
    backend.set_uniform("ScaleOut", profile.scale_out.into());
    backend.set_uniform("kfact", profile.distortion_k.into());
    backend.set_uniform("cfact", profile.chroma_ab.into());
    backend.set_uniform("LensCenter", profile.lens_centers.packed().into());
    backend.set_uniform("ScreenCenter", profile.screen_centers.packed().into());
    backend.draw(strip.handle, strip.element_count);

    backend.use_shader(None);
    backend.bind_texture(0, None);
    backend.set_cull_mode(CullMode::Back);
    backend.set_depth_state(DepthState::standard());
}
