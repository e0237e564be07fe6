//! Headless recording backend for testing and development.
//!
//! This backend doesn't touch a GPU. It keeps enough bookkeeping to answer
//! completeness queries, tracks the bound framebuffers and current program,
//! and appends every state-changing call to an inspectable log.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use super::traits::*;
use super::types::*;

/// One call issued against the backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateTexture(TextureHandle),
    WriteTexture { texture: TextureHandle, bytes: usize },
    BindTexture { unit: u32, texture: Option<TextureHandle> },
    DestroyTexture(TextureHandle),
    CreateRenderbuffer(RenderbufferHandle),
    DestroyRenderbuffer(RenderbufferHandle),
    CreateFramebuffer(FramebufferHandle),
    AttachColor { framebuffer: FramebufferHandle, slot: u32, texture: TextureHandle },
    AttachDepthStencil { framebuffer: FramebufferHandle, renderbuffer: RenderbufferHandle },
    DestroyFramebuffer(FramebufferHandle),
    BindFramebuffer { binding: FramebufferBinding, framebuffer: Option<FramebufferHandle> },
    DrawBuffers(u32),
    BlitDepth { src: Viewport, dst: Viewport },
    LoadShader { name: String, shader: ShaderHandle },
    UseShader(Option<ShaderHandle>),
    SetUniform { name: String, value: UniformValue },
    CreateGeometry(GeometryHandle),
    DestroyGeometry(GeometryHandle),
    Draw(DrawRecord),
    Viewport(Viewport),
    Scissor(Option<Viewport>),
    Clear { color: [f32; 4], flags: ClearFlags },
    DepthState(DepthState),
    BlendState(Option<BlendState>),
    CullMode(CullMode),
    Finish,
}

/// Snapshot of the pipeline state at the time of a draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub geometry: GeometryHandle,
    pub element_count: u32,
    /// Name of the program in use, if any
    pub shader: Option<String>,
    pub draw_framebuffer: Option<FramebufferHandle>,
    pub viewport: Viewport,
    pub blend: Option<BlendState>,
    pub depth: DepthState,
    pub cull_mode: CullMode,
    pub textures: BTreeMap<u32, TextureHandle>,
}

#[derive(Debug, Clone, Default)]
struct FramebufferRecord {
    label: Option<String>,
    colors: BTreeMap<u32, TextureHandle>,
    depth: Option<RenderbufferHandle>,
}

#[derive(Debug, Clone, Copy)]
struct GeometryRecord {
    element_count: u32,
    topology: PrimitiveTopology,
}

/// Recording GPU backend.
#[derive(Debug)]
pub struct RecordingBackend {
    capabilities: BackendCapabilities,
    next_id: u64,
    textures: HashMap<u64, TextureDescriptor>,
    renderbuffers: HashMap<u64, (u32, u32)>,
    framebuffers: HashMap<u64, FramebufferRecord>,
    shaders: HashMap<u64, String>,
    geometries: HashMap<u64, GeometryRecord>,
    missing_shaders: HashSet<String>,
    failing_framebuffers: HashSet<String>,
    pending_errors: VecDeque<BackendError>,
    calls: Vec<BackendCall>,

    // Current state
    draw_framebuffer: Option<FramebufferHandle>,
    read_framebuffer: Option<FramebufferHandle>,
    draw_buffers: u32,
    current_shader: Option<ShaderHandle>,
    bound_textures: BTreeMap<u32, TextureHandle>,
    viewport: Viewport,
    scissor: Option<Viewport>,
    depth: DepthState,
    blend: Option<BlendState>,
    cull_mode: CullMode,
    uniforms: HashMap<(u64, String), UniformValue>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    /// Create a new recording backend with default capabilities.
    pub fn new() -> Self {
        Self::with_capabilities(BackendCapabilities::default())
    }

    /// Create a backend reporting the given version and limits.
    pub fn with_capabilities(capabilities: BackendCapabilities) -> Self {
        Self {
            capabilities,
            next_id: 1,
            textures: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            shaders: HashMap::new(),
            geometries: HashMap::new(),
            missing_shaders: HashSet::new(),
            failing_framebuffers: HashSet::new(),
            pending_errors: VecDeque::new(),
            calls: Vec::new(),
            draw_framebuffer: None,
            read_framebuffer: None,
            draw_buffers: 1,
            current_shader: None,
            bound_textures: BTreeMap::new(),
            viewport: Viewport::default(),
            scissor: None,
            depth: DepthState::standard(),
            blend: None,
            cull_mode: CullMode::Back,
            uniforms: HashMap::new(),
        }
    }

    /// Make `load_shader` fail for this program name.
    pub fn mark_shader_missing(&mut self, name: &str) {
        self.missing_shaders.insert(name.to_string());
    }

    /// Make `create_framebuffer` fail for this label.
    pub fn fail_framebuffer(&mut self, label: &str) {
        self.failing_framebuffers.insert(label.to_string());
    }

    /// Queue an error code to be returned by the next `poll_error`.
    pub fn inject_error(&mut self, error: BackendError) {
        self.pending_errors.push_back(error);
    }

    /// Every call recorded so far
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Forget the recorded calls, keeping resources and state
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Draw calls recorded so far
    pub fn draws(&self) -> Vec<&DrawRecord> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Draw(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    /// Draw calls issued while the named program was in use
    pub fn draws_with_shader(&self, name: &str) -> Vec<&DrawRecord> {
        self.draws()
            .into_iter()
            .filter(|draw| draw.shader.as_deref() == Some(name))
            .collect()
    }

    /// Every value assigned to a uniform name, in call order
    pub fn uniform_history(&self, name: &str) -> Vec<UniformValue> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::SetUniform { name: n, value } if n == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Last value set for `name` on the given program
    pub fn uniform(&self, shader: ShaderHandle, name: &str) -> Option<UniformValue> {
        self.uniforms.get(&(shader.0, name.to_string())).copied()
    }

    pub fn draw_framebuffer(&self) -> Option<FramebufferHandle> {
        self.draw_framebuffer
    }

    pub fn read_framebuffer(&self) -> Option<FramebufferHandle> {
        self.read_framebuffer
    }

    pub fn draw_buffer_count(&self) -> u32 {
        self.draw_buffers
    }

    pub fn current_viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn current_depth_state(&self) -> DepthState {
        self.depth
    }

    pub fn current_blend_state(&self) -> Option<BlendState> {
        self.blend
    }

    pub fn current_cull_mode(&self) -> CullMode {
        self.cull_mode
    }

    /// Color attachments of a framebuffer, ordered by slot
    pub fn framebuffer_attachments(&self, framebuffer: FramebufferHandle) -> Vec<TextureHandle> {
        self.framebuffers
            .get(&framebuffer.0)
            .map(|fb| fb.colors.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    pub fn shader_name(&self, shader: ShaderHandle) -> Option<&str> {
        self.shaders.get(&shader.0).map(String::as_str)
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn live_framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn live_renderbuffer_count(&self) -> usize {
        self.renderbuffers.len()
    }

    pub fn live_geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// Number of `CreateTexture` calls recorded
    pub fn texture_creations(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::CreateTexture(_)))
            .count()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&mut self, call: BackendCall) {
        self.calls.push(call);
    }

    fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.textures.get(&texture.0).map(|d| (d.width, d.height))
    }
}

impl GraphicsBackend for RecordingBackend {
    fn name(&self) -> &str {
        "Recording Backend"
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        log::trace!(
            "RecordingBackend: creating texture {:?} ({}x{}, {:?})",
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );
        let max = self.capabilities.max_texture_size;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(BackendError::TextureCreationFailed(format!(
                "unsupported size {}x{}",
                desc.width, desc.height
            )));
        }
        let handle = TextureHandle(self.allocate_id());
        self.textures.insert(handle.0, desc.clone());
        self.record(BackendCall::CreateTexture(handle));
        Ok(handle)
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]) {
        if !self.textures.contains_key(&texture.0) {
            self.pending_errors.push_back(BackendError::InvalidValue);
            return;
        }
        self.record(BackendCall::WriteTexture {
            texture,
            bytes: data.len(),
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        match texture {
            Some(t) => {
                self.bound_textures.insert(unit, t);
            }
            None => {
                self.bound_textures.remove(&unit);
            }
        }
        self.record(BackendCall::BindTexture { unit, texture });
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture.0).is_some() {
            self.bound_textures.retain(|_, bound| *bound != texture);
            self.record(BackendCall::DestroyTexture(texture));
        }
    }

    fn create_depth_stencil_buffer(
        &mut self,
        width: u32,
        height: u32,
    ) -> BackendResult<RenderbufferHandle> {
        log::trace!("RecordingBackend: creating depth-stencil buffer ({}x{})", width, height);
        if width == 0 || height == 0 {
            return Err(BackendError::RenderbufferCreationFailed(format!(
                "unsupported size {}x{}",
                width, height
            )));
        }
        let handle = RenderbufferHandle(self.allocate_id());
        self.renderbuffers.insert(handle.0, (width, height));
        self.record(BackendCall::CreateRenderbuffer(handle));
        Ok(handle)
    }

    fn destroy_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        if self.renderbuffers.remove(&renderbuffer.0).is_some() {
            self.record(BackendCall::DestroyRenderbuffer(renderbuffer));
        }
    }

    fn create_framebuffer(&mut self, label: Option<&str>) -> BackendResult<FramebufferHandle> {
        log::trace!("RecordingBackend: creating framebuffer {:?}", label);
        if let Some(label) = label.filter(|l| self.failing_framebuffers.contains(*l)) {
            return Err(BackendError::FramebufferCreationFailed(label.to_string()));
        }
        let handle = FramebufferHandle(self.allocate_id());
        self.framebuffers.insert(
            handle.0,
            FramebufferRecord {
                label: label.map(str::to_string),
                ..Default::default()
            },
        );
        self.record(BackendCall::CreateFramebuffer(handle));
        Ok(handle)
    }

    fn attach_color(&mut self, framebuffer: FramebufferHandle, slot: u32, texture: TextureHandle) {
        let Some(fb) = self.framebuffers.get_mut(&framebuffer.0) else {
            self.pending_errors.push_back(BackendError::InvalidFramebufferOperation);
            return;
        };
        fb.colors.insert(slot, texture);
        self.record(BackendCall::AttachColor {
            framebuffer,
            slot,
            texture,
        });
    }

    fn attach_depth_stencil(
        &mut self,
        framebuffer: FramebufferHandle,
        renderbuffer: RenderbufferHandle,
    ) {
        let Some(fb) = self.framebuffers.get_mut(&framebuffer.0) else {
            self.pending_errors.push_back(BackendError::InvalidFramebufferOperation);
            return;
        };
        fb.depth = Some(renderbuffer);
        self.record(BackendCall::AttachDepthStencil {
            framebuffer,
            renderbuffer,
        });
    }

    fn framebuffer_status(&self, framebuffer: FramebufferHandle) -> FramebufferStatus {
        let Some(fb) = self.framebuffers.get(&framebuffer.0) else {
            return FramebufferStatus::Incomplete("unknown framebuffer".into());
        };
        if fb.colors.is_empty() && fb.depth.is_none() {
            return FramebufferStatus::Incomplete("missing attachment".into());
        }

        let mut sizes = Vec::new();
        for (slot, texture) in &fb.colors {
            if *slot >= self.capabilities.max_color_attachments {
                return FramebufferStatus::Incomplete(format!("slot {} out of range", slot));
            }
            let Some(desc) = self.textures.get(&texture.0) else {
                return FramebufferStatus::Incomplete(format!("slot {} texture destroyed", slot));
            };
            if desc.format.is_depth() {
                return FramebufferStatus::Incomplete(format!(
                    "slot {} has depth format {:?}",
                    slot, desc.format
                ));
            }
            sizes.extend(self.texture_size(*texture));
        }
        if let Some(depth) = fb.depth {
            match self.renderbuffers.get(&depth.0) {
                Some(size) => sizes.push(*size),
                None => return FramebufferStatus::Incomplete("depth buffer destroyed".into()),
            }
        }
        if sizes.windows(2).any(|pair| pair[0] != pair[1]) {
            return FramebufferStatus::Incomplete(format!(
                "attachment dimensions differ on {:?}",
                fb.label
            ));
        }
        FramebufferStatus::Complete
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self.framebuffers.remove(&framebuffer.0).is_some() {
            if self.draw_framebuffer == Some(framebuffer) {
                self.draw_framebuffer = None;
            }
            if self.read_framebuffer == Some(framebuffer) {
                self.read_framebuffer = None;
            }
            self.record(BackendCall::DestroyFramebuffer(framebuffer));
        }
    }

    fn bind_framebuffer(&mut self, binding: FramebufferBinding, framebuffer: Option<FramebufferHandle>) {
        if let Some(fb) = framebuffer {
            if !self.framebuffers.contains_key(&fb.0) {
                self.pending_errors.push_back(BackendError::InvalidOperation);
                return;
            }
        }
        match binding {
            FramebufferBinding::Draw => self.draw_framebuffer = framebuffer,
            FramebufferBinding::Read => self.read_framebuffer = framebuffer,
            FramebufferBinding::Both => {
                self.draw_framebuffer = framebuffer;
                self.read_framebuffer = framebuffer;
            }
        }
        self.record(BackendCall::BindFramebuffer {
            binding,
            framebuffer,
        });
    }

    fn set_draw_buffers(&mut self, count: u32) {
        if count > self.capabilities.max_color_attachments {
            self.pending_errors.push_back(BackendError::InvalidValue);
            return;
        }
        self.draw_buffers = count;
        self.record(BackendCall::DrawBuffers(count));
    }

    fn blit_depth(&mut self, src: Viewport, dst: Viewport) {
        if self.read_framebuffer == self.draw_framebuffer && self.read_framebuffer.is_some() {
            self.pending_errors.push_back(BackendError::InvalidOperation);
            return;
        }
        self.record(BackendCall::BlitDepth { src, dst });
    }

    fn load_shader(&mut self, name: &str) -> BackendResult<ShaderHandle> {
        log::trace!("RecordingBackend: loading shader {}", name);
        if self.missing_shaders.contains(name) {
            return Err(BackendError::ShaderCreationFailed(name.to_string()));
        }
        let handle = ShaderHandle(self.allocate_id());
        self.shaders.insert(handle.0, name.to_string());
        self.record(BackendCall::LoadShader {
            name: name.to_string(),
            shader: handle,
        });
        Ok(handle)
    }

    fn use_shader(&mut self, shader: Option<ShaderHandle>) {
        self.current_shader = shader;
        self.record(BackendCall::UseShader(shader));
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let Some(shader) = self.current_shader else {
            self.pending_errors.push_back(BackendError::InvalidOperation);
            return;
        };
        self.uniforms.insert((shader.0, name.to_string()), value);
        self.record(BackendCall::SetUniform {
            name: name.to_string(),
            value,
        });
    }

    fn create_geometry(&mut self, desc: &GeometryDescriptor) -> BackendResult<GeometryHandle> {
        log::trace!(
            "RecordingBackend: creating geometry {:?} ({} vertex bytes, {} index bytes)",
            desc.label,
            desc.vertex_bytes().len(),
            desc.index_bytes().len()
        );
        let handle = GeometryHandle(self.allocate_id());
        self.geometries.insert(
            handle.0,
            GeometryRecord {
                element_count: desc.element_count(),
                topology: desc.topology,
            },
        );
        self.record(BackendCall::CreateGeometry(handle));
        Ok(handle)
    }

    fn destroy_geometry(&mut self, geometry: GeometryHandle) {
        if self.geometries.remove(&geometry.0).is_some() {
            self.record(BackendCall::DestroyGeometry(geometry));
        }
    }

    fn draw(&mut self, geometry: GeometryHandle, element_count: u32) {
        let Some(record) = self.geometries.get(&geometry.0).copied() else {
            self.pending_errors.push_back(BackendError::InvalidOperation);
            return;
        };
        if element_count > record.element_count {
            self.pending_errors.push_back(BackendError::InvalidValue);
            return;
        }
        log::trace!(
            "RecordingBackend: draw {:?} ({} elements, {:?})",
            geometry,
            element_count,
            record.topology
        );
        let shader = self
            .current_shader
            .and_then(|s| self.shaders.get(&s.0).cloned());
        let draw = DrawRecord {
            geometry,
            element_count,
            shader,
            draw_framebuffer: self.draw_framebuffer,
            viewport: self.viewport,
            blend: self.blend,
            depth: self.depth,
            cull_mode: self.cull_mode,
            textures: self.bound_textures.clone(),
        };
        self.record(BackendCall::Draw(draw));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.record(BackendCall::Viewport(viewport));
    }

    fn set_scissor(&mut self, scissor: Option<Viewport>) {
        self.scissor = scissor;
        self.record(BackendCall::Scissor(scissor));
    }

    fn clear(&mut self, color: [f32; 4], flags: ClearFlags) {
        self.record(BackendCall::Clear { color, flags });
    }

    fn set_depth_state(&mut self, state: DepthState) {
        self.depth = state;
        self.record(BackendCall::DepthState(state));
    }

    fn set_blend_state(&mut self, blend: Option<BlendState>) {
        self.blend = blend;
        self.record(BackendCall::BlendState(blend));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.cull_mode = mode;
        self.record(BackendCall::CullMode(mode));
    }

    fn finish(&mut self) {
        self.record(BackendCall::Finish);
    }

    fn poll_error(&mut self) -> Option<BackendError> {
        self.pending_errors.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn color_texture(backend: &mut RecordingBackend, width: u32, height: u32) -> TextureHandle {
        backend
            .create_texture(&TextureDescriptor {
                width,
                height,
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_complete_framebuffer() {
        let mut backend = RecordingBackend::new();
        let texture = color_texture(&mut backend, 64, 32);
        let depth = backend.create_depth_stencil_buffer(64, 32).unwrap();
        let fb = backend.create_framebuffer(Some("test")).unwrap();
        backend.attach_color(fb, 0, texture);
        backend.attach_depth_stencil(fb, depth);

        assert!(backend.framebuffer_status(fb).is_complete());
        assert_eq!(backend.framebuffer_attachments(fb), vec![texture]);
    }

    #[test]
    fn test_mismatched_sizes_are_incomplete() {
        let mut backend = RecordingBackend::new();
        let a = color_texture(&mut backend, 64, 32);
        let b = color_texture(&mut backend, 32, 32);
        let fb = backend.create_framebuffer(None).unwrap();
        backend.attach_color(fb, 0, a);
        backend.attach_color(fb, 1, b);

        assert!(!backend.framebuffer_status(fb).is_complete());
    }

    #[test]
    fn test_empty_framebuffer_is_incomplete() {
        let mut backend = RecordingBackend::new();
        let fb = backend.create_framebuffer(None).unwrap();
        assert!(!backend.framebuffer_status(fb).is_complete());
    }

    #[test]
    fn test_draw_snapshots_state() {
        let mut backend = RecordingBackend::new();
        let shader = backend.load_shader("shaders/quad").unwrap();
        let vertices = [Vertex::new(glam::Vec3::ZERO, glam::Vec3::Z, Vec2::ZERO); 4];
        let geometry = backend
            .create_geometry(&GeometryDescriptor {
                label: None,
                vertices: &vertices,
                indices: &[],
                topology: PrimitiveTopology::TriangleStrip,
            })
            .unwrap();

        backend.use_shader(Some(shader));
        backend.set_blend_state(Some(BlendState::additive()));
        backend.draw(geometry, 4);

        let draws = backend.draws_with_shader("shaders/quad");
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].blend, Some(BlendState::additive()));
        assert_eq!(draws[0].element_count, 4);
    }

    #[test]
    fn test_uniform_without_program_reports_error() {
        let mut backend = RecordingBackend::new();
        backend.set_uniform("lightRadius", UniformValue::Float(1.0));
        assert_eq!(backend.poll_error(), Some(BackendError::InvalidOperation));
        assert_eq!(backend.poll_error(), None);
    }

    #[test]
    fn test_missing_shader_fails_to_load() {
        let mut backend = RecordingBackend::new();
        backend.mark_shader_missing("shaders/gone");
        assert!(backend.load_shader("shaders/gone").is_err());
        assert!(backend.load_shader("shaders/here").is_ok());
    }
}
