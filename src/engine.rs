//! Render system orchestrator
//!
//! [`RenderSystem`] owns the render targets, the view stack, the stereo
//! profile, the scene registry, the overlay list and every GPU resource the
//! factory created. [`RenderSystem::update`] gates frames on the configured
//! framerate and runs the deferred pipeline for one or two eyes.

use glam::Mat4;

use crate::backend::*;
use crate::check_backend_errors;
use crate::error::{RenderError, RenderResult};
use crate::pipeline::*;
use crate::resources::{Mesh, RenderTarget, RenderTargetDescriptor, ResourceManager};
use crate::scene::{EntityId, SceneRegistry, ScreenSpaceComponent};
use crate::stereo::{HmdInfo, StereoProfile};
use crate::view::{EyeSelection, FirstPersonView, View, ViewStack};
use crate::EngineConfig;

/// Minimum API version the pipeline needs (multiple render targets and blits)
const MIN_API_VERSION: (u32, u32) = (3, 0);

/// Index of the primary G-buffer in the render target list
const GBUFFER_TARGET: usize = 0;

/// Where the last rendered frame can be picked up for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutput {
    /// Framebuffer holding the final image; `None` is the default framebuffer
    pub framebuffer: Option<FramebufferHandle>,
    pub width: u32,
    pub height: u32,
    pub stereo: bool,
    /// Number of frames rendered so far
    pub frame_index: u64,
}

/// Deferred renderer with optional HMD stereo output
pub struct RenderSystem<B: GraphicsBackend> {
    backend: B,
    config: EngineConfig,
    window_width: u32,
    window_height: u32,
    projection: Mat4,
    accumulator: f32,

    render_targets: Vec<RenderTarget>,
    composite_target: Option<usize>,
    views: ViewStack,
    view_mode: Option<String>,
    stereo: Option<StereoProfile>,

    registry: SceneRegistry,
    overlays: Vec<ScreenSpaceComponent>,
    resources: ResourceManager,

    gbuffer_pass: GBufferPass,
    lighting_pass: LightingPass,
    forward_pass: ForwardPass,
    overlay_pass: OverlayPass,
    distortion_pass: DistortionPass,

    last_stats: FrameStats,
    frames_rendered: u64,
    started: bool,
    shut_down: bool,
}

fn main_projection(config: &EngineConfig, width: u32, height: u32) -> Mat4 {
    Mat4::perspective_rh_gl(
        config.field_of_view.to_radians(),
        crate::aspect_ratio(width, height),
        config.near_plane,
        config.far_plane,
    )
}

impl<B: GraphicsBackend> RenderSystem<B> {
    pub fn new(backend: B, mut config: EngineConfig) -> Self {
        if config.framerate.is_nan() || config.framerate <= 0.0 {
            let fallback = EngineConfig::default().framerate;
            log::warn!("Ignoring invalid framerate {}, using {}", config.framerate, fallback);
            config.framerate = fallback;
        }
        let (width, height) = (config.width, config.height);
        Self {
            backend,
            projection: main_projection(&config, width, height),
            config,
            window_width: width,
            window_height: height,
            accumulator: 0.0,
            render_targets: Vec::new(),
            composite_target: None,
            views: ViewStack::new(),
            view_mode: None,
            stereo: None,
            registry: SceneRegistry::new(),
            overlays: Vec::new(),
            resources: ResourceManager::new(),
            gbuffer_pass: GBufferPass::new(),
            lighting_pass: LightingPass::default(),
            forward_pass: ForwardPass::new(),
            overlay_pass: OverlayPass::new(),
            distortion_pass: DistortionPass::default(),
            last_stats: FrameStats::default(),
            frames_rendered: 0,
            started: false,
            shut_down: false,
        }
    }

    /// Validate the backend and create the pipeline resources.
    ///
    /// Missing pipeline programs are logged and only disable the passes that
    /// need them.
    pub fn start(&mut self) -> RenderResult<()> {
        let caps = self.backend.capabilities();
        if caps.api_version < MIN_API_VERSION {
            return Err(RenderError::UnsupportedApiVersion {
                major: caps.api_version.0,
                minor: caps.api_version.1,
            });
        }
        log::info!(
            "Starting render system on {} (API {}.{}, {} color attachments)",
            self.backend.name(),
            caps.api_version.0,
            caps.api_version.1,
            caps.max_color_attachments
        );

        self.projection = main_projection(&self.config, self.window_width, self.window_height);
        // Targets may be missing after a shutdown or sized for another mode
        let (width, height) = self.gbuffer_size();
        self.ensure_gbuffer(width, height)?;
        if self.stereo.is_some() {
            self.ensure_composite(width, height)?;
        }

        let shaders = self.config.shaders.clone();
        let backend = &mut self.backend;
        let resources = &mut self.resources;
        let ambient = resources.shaders.load_or_reuse(backend, &shaders.ambient);
        let point = resources.shaders.load_or_reuse(backend, &shaders.point_light);
        let spot = resources.shaders.load_or_reuse(backend, &shaders.spot_light);
        let distortion = resources.shaders.load_or_reuse(backend, &shaders.distortion);
        let quad = resources
            .meshes
            .get_or_upload_with(backend, "fullscreen_quad", Mesh::fullscreen_quad);
        let strip = resources
            .meshes
            .get_or_upload_with(backend, "fullscreen_strip", Mesh::fullscreen_strip);

        self.lighting_pass = LightingPass::new(ambient, point, spot, quad);
        self.distortion_pass = DistortionPass::new(distortion, strip);

        self.backend.set_cull_mode(CullMode::Back);
        self.backend.set_depth_state(DepthState::standard());
        check_backend_errors!(&mut self.backend);

        self.started = true;
        self.shut_down = false;
        Ok(())
    }

    /// Release every render target and resource. Safe to call more than once.
    ///
    /// The output mode is kept; a later `start` rebuilds its targets.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        for target in &mut self.render_targets {
            target.release(&mut self.backend);
        }
        self.render_targets.clear();
        self.composite_target = None;
        self.resources.release_all(&mut self.backend);
        self.overlays.clear();
        self.registry.clear();
        self.views.clear();
        self.lighting_pass = LightingPass::default();
        self.distortion_pass = DistortionPass::default();
        check_backend_errors!(&mut self.backend);

        self.started = false;
        self.shut_down = true;
        log::info!("Render system shut down after {} frames", self.frames_rendered);
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    /// Resize the window. Recomputes the main projection and, in mono mode,
    /// resizes the primary G-buffer.
    pub fn set_viewport_size(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.window_width = width;
        self.window_height = height;
        self.projection = main_projection(&self.config, width, height);
        if self.started && self.stereo.is_none() {
            self.ensure_gbuffer(width, height)?;
        }
        Ok(())
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Change the target framerate. Non-positive rates are ignored.
    pub fn set_framerate(&mut self, framerate: f32) {
        if framerate > 0.0 {
            self.config.framerate = framerate;
        } else {
            log::warn!("Ignoring invalid framerate {}", framerate);
        }
    }

    pub fn framerate(&self) -> f32 {
        self.config.framerate
    }

    /// Advance the frame clock by `delta` seconds.
    ///
    /// Renders one frame and returns true once the accumulated time exceeds
    /// the frame interval; otherwise returns false without touching the GPU.
    pub fn update(&mut self, delta: f32) -> bool {
        self.accumulator += delta;
        if self.accumulator <= self.config.frame_interval() {
            return false;
        }
        if !self.started {
            log::debug!("Frame due but the render system is not started");
            return false;
        }

        self.render_frame();
        self.accumulator = 0.0;
        true
    }

    /// Statistics of the most recently rendered frame
    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Presentation handoff for the last rendered frame
    pub fn output(&self) -> FrameOutput {
        FrameOutput {
            framebuffer: None,
            width: self.window_width,
            height: self.window_height,
            stereo: self.stereo.is_some(),
            frame_index: self.frames_rendered,
        }
    }

    /// Create an additional off-screen target and return its index
    pub fn create_render_target(&mut self, desc: &RenderTargetDescriptor) -> RenderResult<usize> {
        let target = RenderTarget::new(&mut self.backend, desc)?;
        self.render_targets.push(target);
        Ok(self.render_targets.len() - 1)
    }

    pub fn render_target(&self, index: usize) -> Option<&RenderTarget> {
        self.render_targets.get(index)
    }

    pub fn render_target_mut(&mut self, index: usize) -> Option<&mut RenderTarget> {
        self.render_targets.get_mut(index)
    }

    pub fn render_target_count(&self) -> usize {
        self.render_targets.len()
    }

    /// Bind target `index` for writing
    pub fn bind_render_target(&mut self, index: usize) -> RenderResult<()> {
        let target = self
            .render_targets
            .get_mut(index)
            .ok_or(RenderError::InvalidRenderTarget(index))?;
        target.bind_write(&mut self.backend);
        Ok(())
    }

    /// Restore the default draw framebuffer after [`bind_render_target`](Self::bind_render_target)
    pub fn unbind_render_target(&mut self, index: usize) -> RenderResult<()> {
        let target = self
            .render_targets
            .get_mut(index)
            .ok_or(RenderError::InvalidRenderTarget(index))?;
        target.unbind_write(&mut self.backend);
        Ok(())
    }

    /// Push a view and make it active
    pub fn push_view(&mut self, view: View) {
        self.view_mode = Some(view.mode_name().to_string());
        self.views.push(view);
    }

    /// Drop the active view. Returns false when there was none.
    pub fn pop_view(&mut self) -> bool {
        let popped = self.views.pop();
        if popped {
            self.view_mode = self.views.top().map(|v| v.mode_name().to_string());
        }
        popped
    }

    pub fn view(&self, index: usize) -> Option<&View> {
        self.views.get(index)
    }

    pub fn view_mut(&mut self, index: usize) -> Option<&mut View> {
        self.views.get_mut(index)
    }

    pub fn active_view(&self) -> Option<&View> {
        self.views.top()
    }

    pub fn active_view_mut(&mut self) -> Option<&mut View> {
        self.views.top_mut()
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Factory type name of the active view
    pub fn view_mode(&self) -> Option<&str> {
        self.view_mode.as_deref()
    }

    /// Push a first-person view at the origin when the stack is empty
    pub fn ensure_default_view(&mut self) {
        if self.views.is_empty() {
            log::debug!("No view after scene load, pushing a default first-person view");
            self.push_view(View::FirstPerson(FirstPersonView::new(0, glam::Vec3::ZERO)));
        }
    }

    /// Switch to stereo output for `hmd`.
    ///
    /// Resizes the primary G-buffer to the oversampled stereo size and
    /// creates the composite target the distortion pass reads from.
    pub fn set_stereo_mode(&mut self, hmd: &HmdInfo) -> RenderResult<()> {
        let profile = StereoProfile::compute(hmd, self.config.near_plane, self.config.far_plane);
        let (width, height) = profile.target_size();

        // The G-buffer always sits at index 0. An existing one is resized
        // only once the composite target is in place.
        if self.render_targets.is_empty() {
            self.ensure_gbuffer(width, height)?;
        }
        self.ensure_composite(width, height)?;
        self.ensure_gbuffer(width, height)?;

        log::info!(
            "Stereo mode: {}x{} target, fov {:.1} deg, projection offset {:.4}",
            width,
            height,
            profile.fov.to_degrees(),
            profile.projection_offset
        );
        self.stereo = Some(profile);
        Ok(())
    }

    /// Return to monoscopic output. The composite target stays allocated
    /// for a later switch back to stereo. Before `start` the G-buffer is
    /// resized by `start` itself.
    pub fn set_mono_mode(&mut self) -> RenderResult<()> {
        if self.stereo.take().is_none() {
            return Ok(());
        }
        log::info!("Mono mode");
        if self.started {
            let (width, height) = (self.window_width, self.window_height);
            self.ensure_gbuffer(width, height)?;
        }
        Ok(())
    }

    pub fn is_stereo(&self) -> bool {
        self.stereo.is_some()
    }

    pub fn stereo_profile(&self) -> Option<&StereoProfile> {
        self.stereo.as_ref()
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SceneRegistry {
        &mut self.registry
    }

    pub fn overlays(&self) -> &[ScreenSpaceComponent] {
        &self.overlays
    }

    pub fn overlays_mut(&mut self) -> &mut Vec<ScreenSpaceComponent> {
        &mut self.overlays
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.resources
    }

    /// Backend and resource manager together, for creation functions that
    /// upload through the caches
    pub fn backend_and_resources(&mut self) -> (&mut B, &mut ResourceManager) {
        (&mut self.backend, &mut self.resources)
    }

    /// Remove an entity's registry components and overlays.
    /// Returns true when anything was removed.
    pub fn remove_entity(&mut self, entity: EntityId) -> bool {
        let before = self.overlays.len();
        self.overlays.retain(|o| o.entity != entity);
        let removed_overlays = self.overlays.len() != before;
        self.registry.remove_entity(entity) || removed_overlays
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Make the primary G-buffer exist at the given size, recreating it on
    /// a size change
    fn ensure_gbuffer(&mut self, width: u32, height: u32) -> RenderResult<()> {
        let desc = RenderTargetDescriptor::gbuffer(width, height);
        match self.render_targets.get(GBUFFER_TARGET).map(RenderTarget::size) {
            None => {
                self.create_render_target(&desc)?;
            }
            Some(size) if size != (width, height) => {
                self.replace_target(GBUFFER_TARGET, &desc)?;
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Make the stereo composite target exist at the given size
    fn ensure_composite(&mut self, width: u32, height: u32) -> RenderResult<()> {
        let desc = RenderTargetDescriptor::composite(width, height);
        let existing = self
            .composite_target
            .and_then(|index| self.render_targets.get(index).map(|t| (index, t.size())));
        match existing {
            Some((_, size)) if size == (width, height) => {}
            Some((index, _)) => self.replace_target(index, &desc)?,
            None => self.composite_target = Some(self.create_render_target(&desc)?),
        }
        Ok(())
    }

    /// Size the primary G-buffer needs in the current output mode
    fn gbuffer_size(&self) -> (u32, u32) {
        self.stereo
            .as_ref()
            .map(StereoProfile::target_size)
            .unwrap_or((self.window_width, self.window_height))
    }

    /// Swap target `index` for a new one; the old target is kept on failure
    fn replace_target(&mut self, index: usize, desc: &RenderTargetDescriptor) -> RenderResult<()> {
        let target = RenderTarget::new(&mut self.backend, desc)?;
        let mut old = std::mem::replace(&mut self.render_targets[index], target);
        old.release(&mut self.backend);
        Ok(())
    }

    fn eye_contexts(&self) -> Vec<EyeContext> {
        let view = self.views.top();
        match &self.stereo {
            Some(profile) => [EyeSelection::Left, EyeSelection::Right]
                .into_iter()
                .map(|eye| EyeContext::stereo(view, profile, eye, &self.config))
                .collect(),
            None => vec![EyeContext::mono(
                view,
                Viewport::full(self.window_width, self.window_height),
                self.projection,
            )],
        }
    }

    fn render_frame(&mut self) {
        let mut stats = FrameStats::default();
        let scene = FrameScene::gather(&mut self.registry);
        let eyes = self.eye_contexts();
        stats.eyes = eyes.len() as u32;

        let (mut gbuffer, extra) = match self.render_targets.split_first_mut() {
            Some((first, rest)) => (Some(first), rest),
            None => (None, Default::default()),
        };
        let mut composite = match (&self.stereo, self.composite_target) {
            (Some(_), Some(index)) => index.checked_sub(1).and_then(|i| extra.get_mut(i)),
            _ => None,
        };
        let gbuffer_textures: Vec<TextureHandle> = gbuffer
            .as_ref()
            .map(|g| g.color_attachments().to_vec())
            .unwrap_or_default();

        for eye in &eyes {
            let mut ctx = PassContext {
                backend: &mut self.backend,
                config: &self.config,
                eye,
                stats: &mut stats,
            };

            // Geometry into the G-buffer
            if let Some(target) = gbuffer.as_deref_mut() {
                target.bind_write(&mut *ctx.backend);
            }
            ctx.backend.set_viewport(eye.viewport);
            ctx.backend.set_scissor(Some(eye.viewport));
            ctx.backend.clear(self.config.clear_color, ClearFlags::ALL);
            ctx.backend.set_scissor(None);
            self.gbuffer_pass.execute(&mut ctx, &scene);
            if let Some(target) = gbuffer.as_deref_mut() {
                target.unbind_write(&mut *ctx.backend);
            }

            // Everything else lands in the composite target in stereo and in
            // the default framebuffer otherwise
            if let Some(target) = composite.as_deref_mut() {
                target.bind_write(&mut *ctx.backend);
            }
            ctx.backend.set_viewport(eye.viewport);
            ctx.backend.set_scissor(Some(eye.viewport));
            ctx.backend.clear(self.config.clear_color, ClearFlags::ALL);
            ctx.backend.set_scissor(None);
            if let Some(target) = gbuffer.as_deref_mut() {
                resolve_depth(&mut *ctx.backend, target, eye.viewport);
            }

            self.lighting_pass.execute(&mut ctx, &scene, &gbuffer_textures);
            self.forward_pass.execute(&mut ctx, &scene);
            self.overlay_pass.execute(&mut ctx, &self.overlays);

            if let Some(target) = composite.as_deref_mut() {
                target.unbind_write(&mut *ctx.backend);
            }
            ctx.stats.backend_errors += check_backend_errors!(&mut *ctx.backend);
        }

        if let (Some(profile), Some(target)) = (&self.stereo, composite.as_deref()) {
            let window = EyeContext::mono(
                None,
                Viewport::full(self.window_width, self.window_height),
                Mat4::IDENTITY,
            );
            let mut ctx = PassContext {
                backend: &mut self.backend,
                config: &self.config,
                eye: &window,
                stats: &mut stats,
            };
            self.distortion_pass
                .execute(&mut ctx, profile, target.color_attachment(0));
            ctx.stats.backend_errors += check_backend_errors!(&mut *ctx.backend);
        }

        self.frames_rendered += 1;
        log::debug!("Frame {}: {:?}", self.frames_rendered, stats);
        self.last_stats = stats;
    }
}

impl<B: GraphicsBackend> Drop for RenderSystem<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(all(test, feature = "recording"))]
mod tests {
    use super::*;
    use crate::backend::recording::RecordingBackend;

    fn started_system() -> RenderSystem<RecordingBackend> {
        let mut system = RenderSystem::new(RecordingBackend::new(), EngineConfig::default());
        system.start().unwrap();
        system
    }

    #[test]
    fn test_start_creates_gbuffer_at_window_size() {
        let system = started_system();
        let gbuffer = system.render_target(GBUFFER_TARGET).unwrap();
        assert_eq!(gbuffer.size(), (1024, 768));
        assert_eq!(gbuffer.color_attachments().len(), 3);
        assert!(system.render_target(1).is_none());
    }

    #[test]
    fn test_start_rejects_old_api() {
        let backend = RecordingBackend::with_capabilities(BackendCapabilities {
            api_version: (2, 1),
            ..Default::default()
        });
        let mut system = RenderSystem::new(backend, EngineConfig::default());
        let err = system.start().unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedApiVersion { major: 2, minor: 1 }));
        assert!(!system.is_started());
    }

    #[test]
    fn test_update_before_start_renders_nothing() {
        let mut system = RenderSystem::new(RecordingBackend::new(), EngineConfig::default());
        assert!(!system.update(1.0));
        assert_eq!(system.frames_rendered(), 0);
    }

    #[test]
    fn test_resize_recreates_gbuffer_in_mono() {
        let mut system = started_system();
        system.set_viewport_size(640, 480).unwrap();
        assert_eq!(system.render_target(GBUFFER_TARGET).map(|t| t.size()), Some((640, 480)));
        assert_eq!(system.backend().live_framebuffer_count(), 1);
    }

    #[test]
    fn test_pop_view_updates_mode() {
        let mut system = started_system();
        system.push_view(View::FirstPerson(FirstPersonView::new(1, glam::Vec3::ZERO)));
        system.push_view(View::for_type_name("RiftCamera", 2, glam::Vec3::ZERO, glam::Vec3::ZERO).unwrap());
        assert_eq!(system.view_mode(), Some("RiftCamera"));

        assert!(system.pop_view());
        assert_eq!(system.view_mode(), Some("FPSCamera"));
        assert!(system.pop_view());
        assert!(!system.pop_view());
        assert_eq!(system.view_mode(), None);
    }

    #[test]
    fn test_start_sizes_gbuffer_for_current_mode() {
        let mut system = RenderSystem::new(RecordingBackend::new(), EngineConfig::default());
        system.set_stereo_mode(&HmdInfo::rift_dk1()).unwrap();
        system.set_mono_mode().unwrap();
        system.start().unwrap();
        assert_eq!(system.render_target(GBUFFER_TARGET).map(RenderTarget::size), Some((1024, 768)));

        let mut system = RenderSystem::new(RecordingBackend::new(), EngineConfig::default());
        system.set_stereo_mode(&HmdInfo::rift_dk1()).unwrap();
        system.start().unwrap();
        assert_eq!(system.render_target(GBUFFER_TARGET).map(RenderTarget::size), Some((1600, 1000)));
        assert_eq!(system.render_target(1).map(RenderTarget::size), Some((1600, 1000)));
        assert_eq!(system.render_target_count(), 2);
    }

    #[test]
    fn test_failed_stereo_switch_keeps_mono_gbuffer() {
        let mut backend = RecordingBackend::new();
        backend.fail_framebuffer("stereo_composite");
        let mut system = RenderSystem::new(backend, EngineConfig::default());
        system.start().unwrap();

        let err = system.set_stereo_mode(&HmdInfo::rift_dk1()).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Backend(BackendError::FramebufferCreationFailed(_))
        ));
        assert!(!system.is_stereo());
        assert_eq!(system.render_target(GBUFFER_TARGET).map(RenderTarget::size), Some((1024, 768)));
        assert_eq!(system.render_target_count(), 1);
        assert!(system.update(1.0));
        assert_eq!(system.last_frame_stats().eyes, 1);
    }

    #[test]
    fn test_invalid_configured_framerate_falls_back() {
        let from_toml = EngineConfig::from_toml_str("framerate = 0.0").unwrap();
        let configs = [
            from_toml,
            EngineConfig {
                framerate: -30.0,
                ..Default::default()
            },
            EngineConfig {
                framerate: f32::NAN,
                ..Default::default()
            },
        ];
        for config in configs {
            let mut system = RenderSystem::new(RecordingBackend::new(), config);
            assert_eq!(system.framerate(), 60.0);
            system.start().unwrap();
            assert!(!system.update(0.001));
            assert!(system.update(1.0));
        }
    }

    #[test]
    fn test_invalid_target_index() {
        let mut system = started_system();
        assert!(matches!(
            system.bind_render_target(5),
            Err(RenderError::InvalidRenderTarget(5))
        ));
    }
}
