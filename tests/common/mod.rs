//! Shared fixtures for the integration tests.
//!
//! Every test runs against the headless recording backend, so the whole
//! pipeline can be inspected call by call without a GPU.

#![allow(dead_code)]

use stereo_deferred::backend::recording::RecordingBackend;
use stereo_deferred::backend::UniformValue;
use stereo_deferred::{ComponentFactory, EngineConfig, Property, RenderSystem};

/// Delta large enough to make any reasonable framerate render a frame
pub const FRAME_DUE: f32 = 1.0;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Started render system with the default config
pub fn started_system() -> RenderSystem<RecordingBackend> {
    started_system_with(RecordingBackend::new(), EngineConfig::default())
}

/// Started render system on a prepared backend
pub fn started_system_with(backend: RecordingBackend, config: EngineConfig) -> RenderSystem<RecordingBackend> {
    init_logging();
    let mut system = RenderSystem::new(backend, config);
    system.start().expect("render system should start on the recording backend");
    system
}

pub fn factory() -> ComponentFactory<RecordingBackend> {
    ComponentFactory::with_defaults()
}

pub fn float(name: &str, value: f32) -> Property {
    Property::new(name, value)
}

/// Create a component, panicking on failure
pub fn create(
    system: &mut RenderSystem<RecordingBackend>,
    type_name: &str,
    entity: u32,
    properties: &[Property],
) {
    factory()
        .create(system, type_name, entity, properties)
        .unwrap_or_else(|err| panic!("creating {} failed: {}", type_name, err));
}

/// Render exactly one frame from a clean call log
pub fn render_frame(system: &mut RenderSystem<RecordingBackend>) {
    system.backend_mut().clear_calls();
    assert!(system.update(FRAME_DUE), "frame should have been due");
}

pub fn as_mat4(value: Option<UniformValue>) -> glam::Mat4 {
    match value {
        Some(UniformValue::Mat4(m)) => m,
        other => panic!("expected a mat4 uniform, got {:?}", other),
    }
}
