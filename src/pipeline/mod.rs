//! Deferred frame pipeline
//!
//! One rendered frame runs these passes for every eye:
//! 1. G-buffer pass - lit renderables into the primary render target
//! 2. Depth resolve - G-buffer depth copied into the output target
//! 3. Lighting pass - ambient quad plus one additive quad per visible light
//! 4. Forward pass - unlit renderables drawn directly
//! 5. Overlay pass - screen-space quads and cursors
//!
//! In stereo mode the distortion pass then warps the composite target onto
//! the default framebuffer.

pub mod distortion_pass;
pub mod forward_pass;
pub mod gbuffer_pass;
pub mod lighting_pass;
pub mod overlay_pass;

pub use distortion_pass::DistortionPass;
pub use forward_pass::ForwardPass;
pub use gbuffer_pass::GBufferPass;
pub use lighting_pass::LightingPass;
pub use overlay_pass::OverlayPass;

use glam::{Mat4, Vec3};

use crate::backend::*;
use crate::resources::{GpuGeometry, RenderTarget};
use crate::scene::{EntityId, PointLight, Renderable, SceneRegistry, SpotLight, Transform};
use crate::stereo::StereoProfile;
use crate::view::{EyeSelection, View};
use crate::EngineConfig;

/// Counters collected while rendering one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub eyes: u32,
    pub geometry_draws: u32,
    pub forward_draws: u32,
    pub overlay_draws: u32,
    pub point_lights_drawn: u32,
    pub point_lights_culled: u32,
    pub spot_lights_drawn: u32,
    pub spot_lights_culled: u32,
    /// Backend error codes drained during the frame
    pub backend_errors: u32,
    pub distortion_applied: bool,
}

/// Matrices and viewport for one eye of a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeContext {
    pub selection: EyeSelection,
    pub viewport: Viewport,
    pub view: Mat4,
    /// Rotation only, for renderables at infinite distance
    pub infinite_view: Mat4,
    /// Head-locked matrix used by the overlay pass
    pub overlay_view: Mat4,
    pub projection: Mat4,
    /// Viewer position in world space
    pub position: Vec3,
    pub stereo: bool,
}

impl EyeContext {
    /// Single full-window eye
    pub fn mono(view: Option<&View>, viewport: Viewport, projection: Mat4) -> Self {
        let (view_matrix, infinite_view, position) = match view {
            Some(view) => (
                view.center_matrix(),
                view.view_matrix(EyeSelection::Infinite, 0.0),
                view.position(),
            ),
            None => (Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO),
        };
        Self {
            selection: EyeSelection::Center,
            viewport,
            view: view_matrix,
            infinite_view,
            overlay_view: view_matrix,
            projection,
            position,
            stereo: false,
        }
    }

    /// One half of a stereo frame. `selection` is `Left` or `Right`.
    pub fn stereo(
        view: Option<&View>,
        profile: &StereoProfile,
        selection: EyeSelection,
        config: &EngineConfig,
    ) -> Self {
        let (viewport, projection, fixed) = match selection {
            EyeSelection::Right => (
                profile.viewports.right,
                profile.projections.right,
                EyeSelection::FixedRight,
            ),
            _ => (
                profile.viewports.left,
                profile.projections.left,
                EyeSelection::FixedLeft,
            ),
        };
        let overlay_offset = Mat4::from_translation(Vec3::new(0.0, 0.0, -config.overlay_distance));

        let (view_matrix, infinite_view, overlay_view, position) = match view {
            Some(view) => (
                view.view_matrix(selection, profile.view_ipd),
                view.view_matrix(EyeSelection::Infinite, profile.view_ipd),
                view.view_matrix(fixed, profile.view_ipd * config.fixed_ipd_scale) * overlay_offset,
                view.position(),
            ),
            None => (Mat4::IDENTITY, Mat4::IDENTITY, overlay_offset, Vec3::ZERO),
        };
        Self {
            selection,
            viewport,
            view: view_matrix,
            infinite_view,
            overlay_view,
            projection,
            position,
            stereo: true,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Per-kind snapshot of the scene taken once per frame
#[derive(Debug, Clone, Default)]
pub struct FrameScene {
    pub renderables: Vec<(EntityId, Transform, Renderable)>,
    pub point_lights: Vec<(EntityId, Transform, PointLight)>,
    pub spot_lights: Vec<(EntityId, Transform, SpotLight)>,
}

impl FrameScene {
    pub fn gather(registry: &mut SceneRegistry) -> Self {
        Self {
            renderables: registry.renderables(),
            point_lights: registry.point_lights(),
            spot_lights: registry.spot_lights(),
        }
    }
}

/// What every pass gets to work with
pub struct PassContext<'a, B: GraphicsBackend + ?Sized> {
    pub backend: &'a mut B,
    pub config: &'a EngineConfig,
    pub eye: &'a EyeContext,
    pub stats: &'a mut FrameStats,
}

/// Copy the G-buffer depth into whatever is bound for drawing, limited to
/// the eye's viewport, so forward and overlay draws depth test against the
/// deferred geometry.
pub fn resolve_depth<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    gbuffer: &mut RenderTarget,
    viewport: Viewport,
) {
    if !gbuffer.has_depth() {
        return;
    }
    gbuffer.bind_read(backend);
    backend.blit_depth(viewport, viewport);
    gbuffer.unbind_read(backend);
}

/// Bind a renderable's program, matrices, texture and cull mode.
///
/// Returns the geometry to draw, or `None` when the renderable has nothing
/// drawable; the caller sets any extra uniforms and issues the draw.
pub(crate) fn bind_renderable<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    eye: &EyeContext,
    transform: &Transform,
    renderable: &Renderable,
) -> Option<GpuGeometry> {
    if !renderable.is_drawable() {
        return None;
    }
    let shader = renderable.shader?;
    let geometry = renderable.geometry?;

    let view = if renderable.infinite_distance {
        eye.infinite_view
    } else {
        eye.view
    };
    let model = if renderable.fix_to_camera {
        Mat4::from_translation(eye.position) * transform.matrix()
    } else {
        transform.matrix()
    };

    backend.use_shader(Some(shader));
    backend.set_uniform("in_Model", model.into());
    backend.set_uniform("in_View", view.into());
    backend.set_uniform("in_Proj", eye.projection.into());
    backend.bind_texture(0, renderable.texture);
    backend.set_cull_mode(renderable.cull_face);
    Some(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stereo::HmdInfo;
    use crate::view::FirstPersonView;

    #[test]
    fn test_mono_eye_without_view_is_identity() {
        let eye = EyeContext::mono(None, Viewport::full(640, 480), Mat4::IDENTITY);
        assert_eq!(eye.view, Mat4::IDENTITY);
        assert_eq!(eye.selection, EyeSelection::Center);
        assert!(!eye.stereo);
    }

    #[test]
    fn test_stereo_eyes_use_profile_halves() {
        let config = EngineConfig::default();
        let profile = StereoProfile::compute(&HmdInfo::rift_dk1(), 0.1, 100.0);
        let view = View::FirstPerson(FirstPersonView::new(0, Vec3::new(1.0, 2.0, 3.0)));

        let left = EyeContext::stereo(Some(&view), &profile, EyeSelection::Left, &config);
        let right = EyeContext::stereo(Some(&view), &profile, EyeSelection::Right, &config);

        assert_eq!(left.viewport, profile.viewports.left);
        assert_eq!(right.viewport, profile.viewports.right);
        assert_eq!(left.projection, profile.projections.left);
        assert_ne!(left.view, right.view);
        assert_eq!(left.infinite_view, right.infinite_view);
    }

    #[test]
    fn test_overlay_view_is_head_locked() {
        let config = EngineConfig::default();
        let profile = StereoProfile::compute(&HmdInfo::rift_dk1(), 0.1, 100.0);
        let near = View::FirstPerson(FirstPersonView::new(0, Vec3::ZERO));
        let far = View::FirstPerson(FirstPersonView::new(0, Vec3::new(50.0, 0.0, -9.0)));

        let a = EyeContext::stereo(Some(&near), &profile, EyeSelection::Left, &config);
        let b = EyeContext::stereo(Some(&far), &profile, EyeSelection::Left, &config);
        assert_eq!(a.overlay_view, b.overlay_view);

        let expected_shift = profile.view_ipd * config.fixed_ipd_scale * 0.5;
        assert!((a.overlay_view.w_axis.x - expected_shift).abs() < 1e-7);
        assert!((a.overlay_view.w_axis.z + config.overlay_distance).abs() < 1e-6);
    }
}
