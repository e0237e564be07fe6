//! Off-screen render targets
//!
//! A render target is a framebuffer with an ordered set of color textures
//! and an optional depth-stencil buffer. The attachment layout is fixed at
//! creation; a target that fails the completeness check is never returned.

use crate::backend::*;
use crate::error::{RenderError, RenderResult};

/// Layout of a render target
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// One color attachment per entry, in slot order
    pub color_formats: Vec<TextureFormat>,
    pub has_depth: bool,
}

impl RenderTargetDescriptor {
    /// Deferred G-buffer: diffuse, normal and linear depth plus depth-stencil
    pub fn gbuffer(width: u32, height: u32) -> Self {
        Self {
            label: "gbuffer".to_string(),
            width,
            height,
            color_formats: vec![
                TextureFormat::Rgba8Unorm,
                TextureFormat::Rgba16Float,
                TextureFormat::R32Float,
            ],
            has_depth: true,
        }
    }

    /// Single color target the stereo eyes are composed into before distortion
    pub fn composite(width: u32, height: u32) -> Self {
        Self {
            label: "stereo_composite".to_string(),
            width,
            height,
            color_formats: vec![TextureFormat::Rgba8Unorm],
            has_depth: true,
        }
    }
}

/// An off-screen framebuffer and its attachments
#[derive(Debug)]
pub struct RenderTarget {
    label: String,
    framebuffer: FramebufferHandle,
    color_attachments: Vec<TextureHandle>,
    depth_attachment: Option<RenderbufferHandle>,
    width: u32,
    height: u32,
    bound_write: bool,
    bound_read: bool,
    released: bool,
}

impl RenderTarget {
    /// Create all attachments and validate the framebuffer.
    ///
    /// On failure every resource created so far is released again.
    pub fn new<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        desc: &RenderTargetDescriptor,
    ) -> RenderResult<Self> {
        let caps = backend.capabilities();
        if desc.width == 0
            || desc.height == 0
            || desc.width > caps.max_texture_size
            || desc.height > caps.max_texture_size
        {
            return Err(RenderError::InvalidDimensions {
                width: desc.width,
                height: desc.height,
            });
        }
        if desc.color_formats.len() > caps.max_color_attachments as usize {
            return Err(RenderError::TooManyAttachments {
                requested: desc.color_formats.len(),
                max: caps.max_color_attachments,
            });
        }
        if let Some(format) = desc.color_formats.iter().find(|f| f.is_depth()) {
            return Err(RenderError::DepthFormatAsColor(*format));
        }

        backend.bind_framebuffer(FramebufferBinding::Both, None);

        let mut target = Self {
            label: desc.label.clone(),
            framebuffer: backend.create_framebuffer(Some(&desc.label))?,
            color_attachments: Vec::with_capacity(desc.color_formats.len()),
            depth_attachment: None,
            width: desc.width,
            height: desc.height,
            bound_write: false,
            bound_read: false,
            released: false,
        };

        if let Err(err) = target.create_attachments(backend, desc) {
            target.release(backend);
            return Err(err);
        }

        if let FramebufferStatus::Incomplete(reason) = backend.framebuffer_status(target.framebuffer) {
            target.release(backend);
            return Err(RenderError::IncompleteFramebuffer {
                label: desc.label.clone(),
                reason,
            });
        }

        backend.bind_framebuffer(FramebufferBinding::Both, None);
        log::info!(
            "Created render target '{}' ({}x{}, {} color attachments, depth: {})",
            desc.label,
            desc.width,
            desc.height,
            desc.color_formats.len(),
            desc.has_depth
        );
        Ok(target)
    }

    fn create_attachments<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        desc: &RenderTargetDescriptor,
    ) -> RenderResult<()> {
        if desc.has_depth {
            self.depth_attachment = Some(backend.create_depth_stencil_buffer(desc.width, desc.height)?);
        }

        for (slot, format) in desc.color_formats.iter().enumerate() {
            let texture = backend.create_texture(&TextureDescriptor {
                label: Some(format!("{}_color{}", desc.label, slot)),
                width: desc.width,
                height: desc.height,
                format: *format,
                filter: FilterMode::Linear,
                address_mode: AddressMode::ClampToEdge,
            })?;
            self.color_attachments.push(texture);
            backend.attach_color(self.framebuffer, slot as u32, texture);
        }

        if let Some(depth) = self.depth_attachment {
            backend.attach_depth_stencil(self.framebuffer, depth);
        }
        Ok(())
    }

    /// Route draws into this target's color attachments
    pub fn bind_write<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        backend.bind_framebuffer(FramebufferBinding::Draw, Some(self.framebuffer));
        backend.set_draw_buffers(self.color_attachments.len() as u32);
        self.bound_write = true;
    }

    /// Restore the default draw framebuffer. Does nothing when not bound.
    pub fn unbind_write<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        if !self.bound_write {
            return;
        }
        backend.bind_framebuffer(FramebufferBinding::Draw, None);
        backend.set_draw_buffers(1);
        self.bound_write = false;
    }

    /// Make this target the source for blits and reads
    pub fn bind_read<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        backend.bind_framebuffer(FramebufferBinding::Read, Some(self.framebuffer));
        self.bound_read = true;
    }

    /// Restore the default read framebuffer. Does nothing when not bound.
    pub fn unbind_read<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        if !self.bound_read {
            return;
        }
        backend.bind_framebuffer(FramebufferBinding::Read, None);
        self.bound_read = false;
    }

    /// Destroy the framebuffer and all attachments. Safe to call twice.
    pub fn release<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        if self.released {
            return;
        }
        self.unbind_write(backend);
        self.unbind_read(backend);
        backend.destroy_framebuffer(self.framebuffer);
        for texture in self.color_attachments.drain(..) {
            backend.destroy_texture(texture);
        }
        if let Some(depth) = self.depth_attachment.take() {
            backend.destroy_renderbuffer(depth);
        }
        self.released = true;
        log::debug!("Released render target '{}'", self.label);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn framebuffer(&self) -> FramebufferHandle {
        self.framebuffer
    }

    pub fn color_attachment(&self, index: usize) -> Option<TextureHandle> {
        self.color_attachments.get(index).copied()
    }

    pub fn color_attachments(&self) -> &[TextureHandle] {
        &self.color_attachments
    }

    pub fn depth_attachment(&self) -> Option<RenderbufferHandle> {
        self.depth_attachment
    }

    pub fn has_depth(&self) -> bool {
        self.depth_attachment.is_some()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Full-target rectangle
    pub fn viewport(&self) -> Viewport {
        Viewport::full(self.width, self.height)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

#[cfg(all(test, feature = "recording"))]
mod tests {
    use super::*;
    use crate::backend::recording::RecordingBackend;

    #[test]
    fn test_gbuffer_layout() {
        let mut backend = RecordingBackend::new();
        let target = RenderTarget::new(&mut backend, &RenderTargetDescriptor::gbuffer(320, 240)).unwrap();

        assert_eq!(target.color_attachments().len(), 3);
        assert!(target.has_depth());
        assert_eq!(target.size(), (320, 240));
        assert_eq!(
            backend.framebuffer_attachments(target.framebuffer()),
            target.color_attachments().to_vec()
        );
        let normal = backend.texture_descriptor(target.color_attachments()[1]).unwrap();
        assert_eq!(normal.format, TextureFormat::Rgba16Float);
        assert_eq!(normal.address_mode, AddressMode::ClampToEdge);
    }

    #[test]
    fn test_bind_write_routes_all_attachments() {
        let mut backend = RecordingBackend::new();
        let mut target = RenderTarget::new(&mut backend, &RenderTargetDescriptor::gbuffer(64, 64)).unwrap();

        target.bind_write(&mut backend);
        assert_eq!(backend.draw_framebuffer(), Some(target.framebuffer()));
        assert_eq!(backend.draw_buffer_count(), 3);

        target.unbind_write(&mut backend);
        assert_eq!(backend.draw_framebuffer(), None);
        assert_eq!(backend.draw_buffer_count(), 1);
    }

    #[test]
    fn test_unbind_when_unbound_is_noop() {
        let mut backend = RecordingBackend::new();
        let mut target = RenderTarget::new(&mut backend, &RenderTargetDescriptor::composite(64, 64)).unwrap();
        backend.clear_calls();

        target.unbind_write(&mut backend);
        target.unbind_read(&mut backend);

        assert!(backend.calls().is_empty());
        assert_eq!(backend.poll_error(), None);
    }

    #[test]
    fn test_too_many_attachments() {
        let mut backend = RecordingBackend::with_capabilities(BackendCapabilities {
            max_color_attachments: 2,
            ..Default::default()
        });
        let err = RenderTarget::new(&mut backend, &RenderTargetDescriptor::gbuffer(64, 64)).unwrap_err();
        assert!(matches!(err, RenderError::TooManyAttachments { requested: 3, max: 2 }));
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_depth_format_rejected_as_color() {
        let mut backend = RecordingBackend::new();
        let desc = RenderTargetDescriptor {
            color_formats: vec![TextureFormat::Depth32Float],
            ..RenderTargetDescriptor::composite(64, 64)
        };
        let err = RenderTarget::new(&mut backend, &desc).unwrap_err();
        assert!(matches!(err, RenderError::DepthFormatAsColor(TextureFormat::Depth32Float)));
    }

    #[test]
    fn test_incomplete_framebuffer_releases_resources() {
        let mut backend = RecordingBackend::new();
        let desc = RenderTargetDescriptor {
            label: "empty".to_string(),
            width: 64,
            height: 64,
            color_formats: Vec::new(),
            has_depth: false,
        };
        let err = RenderTarget::new(&mut backend, &desc).unwrap_err();

        assert!(matches!(err, RenderError::IncompleteFramebuffer { .. }));
        assert_eq!(backend.live_framebuffer_count(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut backend = RecordingBackend::new();
        let mut target = RenderTarget::new(&mut backend, &RenderTargetDescriptor::gbuffer(64, 64)).unwrap();

        target.release(&mut backend);
        target.release(&mut backend);

        assert!(target.is_released());
        assert_eq!(backend.live_texture_count(), 0);
        assert_eq!(backend.live_renderbuffer_count(), 0);
        assert_eq!(backend.live_framebuffer_count(), 0);
    }
}
