//! Component factory
//!
//! Maps component type names to creation functions. Each function reads the
//! properties it recognizes from an ordered property list, falls back to
//! defaults for the rest, performs one-time GPU setup through the shared
//! [`ResourceManager`](crate::resources::ResourceManager) and attaches the
//! result to the scene registry, the overlay list or the view stack.

use std::collections::HashMap;

use glam::{Vec2, Vec3, Vec4};

use crate::backend::{CullMode, GraphicsBackend, ShaderHandle, TextureHandle};
use crate::engine::RenderSystem;
use crate::error::{RenderError, RenderResult};
use crate::resources::{GpuGeometry, Mesh};
use crate::scene::{
    EntityId, PointLight, Renderable, RenderableKind, ScreenSpaceComponent, SpotLight, Transform,
};
use crate::view::View;

const ICOSPHERE_SUBDIVISIONS: u32 = 2;

/// Typed value of a named property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    String(String),
}

impl PropertyValue {
    /// Numeric view of the value; strings are parsed
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f32),
            PropertyValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            PropertyValue::String(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            PropertyValue::Float(v) => Some(*v as i32),
            PropertyValue::Bool(v) => Some(*v as i32),
            PropertyValue::String(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v != 0),
            PropertyValue::Float(v) => Some(*v != 0.0),
            PropertyValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

/// Named property handed to a creation function
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

impl Property {
    pub fn new(name: &str, value: impl Into<PropertyValue>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// What a creation function attached, and where
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedComponent {
    Renderable(EntityId),
    PointLight(EntityId),
    SpotLight(EntityId),
    /// Index on the view stack
    View(usize),
    /// Index in the overlay list
    Overlay(usize),
}

/// Signature shared by every creation function
pub type FactoryFunction<B> =
    fn(&mut RenderSystem<B>, EntityId, &[Property]) -> RenderResult<CreatedComponent>;

/// Registry of creation functions keyed by component type name
pub struct ComponentFactory<B: GraphicsBackend> {
    functions: HashMap<String, FactoryFunction<B>>,
}

impl<B: GraphicsBackend> Default for ComponentFactory<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: GraphicsBackend> ComponentFactory<B> {
    /// Empty factory
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Factory with every built-in component type registered
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register("GLSprite", create_sprite::<B>);
        factory.register("GLIcoSphere", create_ico_sphere::<B>);
        factory.register("GLCubeSphere", create_cube_sphere::<B>);
        factory.register("GLMesh", create_mesh::<B>);
        factory.register("RiftCamera", create_rift_camera::<B>);
        factory.register("FPSCamera", create_fps_camera::<B>);
        factory.register("GLSixDOFView", create_six_dof_view::<B>);
        factory.register("PointLight", create_point_light::<B>);
        factory.register("SpotLight", create_spot_light::<B>);
        factory.register("GLScreenQuad", create_screen_quad::<B>);
        factory.register("GLScreenCursor", create_screen_cursor::<B>);
        factory
    }

    /// Register or replace the function for `type_name`
    pub fn register(&mut self, type_name: &str, function: FactoryFunction<B>) {
        self.functions.insert(type_name.to_string(), function);
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.functions.contains_key(type_name)
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build a component of `type_name` for `entity`
    pub fn create(
        &self,
        system: &mut RenderSystem<B>,
        type_name: &str,
        entity: EntityId,
        properties: &[Property],
    ) -> RenderResult<CreatedComponent> {
        let function = self
            .functions
            .get(type_name)
            .ok_or_else(|| RenderError::UnknownComponentType(type_name.to_string()))?;
        let created = function(system, entity, properties)?;
        log::debug!("Created {} for entity {}: {:?}", type_name, entity, created);
        Ok(created)
    }
}

/// Lookup helper over a property list. The last occurrence of a name wins.
struct Properties<'a>(&'a [Property]);

impl<'a> Properties<'a> {
    fn find(&self, name: &str) -> Option<&'a PropertyValue> {
        self.0.iter().rev().find(|p| p.name == name).map(|p| &p.value)
    }

    fn f32_or(&self, name: &str, default: f32) -> f32 {
        self.find(name).and_then(PropertyValue::as_f32).unwrap_or(default)
    }

    fn i32_or(&self, name: &str, default: i32) -> i32 {
        self.find(name).and_then(PropertyValue::as_i32).unwrap_or(default)
    }

    fn bool_or(&self, name: &str, default: bool) -> bool {
        self.find(name).and_then(PropertyValue::as_bool).unwrap_or(default)
    }

    fn string(&self, name: &str) -> Option<&'a str> {
        self.find(name).and_then(PropertyValue::as_str).filter(|s| !s.is_empty())
    }

    fn string_or(&self, name: &str, default: &'a str) -> &'a str {
        self.string(name).unwrap_or(default)
    }

    fn position(&self) -> Vec3 {
        Vec3::new(self.f32_or("x", 0.0), self.f32_or("y", 0.0), self.f32_or("z", 0.0))
    }

    fn rotation_degrees(&self) -> Vec3 {
        Vec3::new(self.f32_or("rx", 0.0), self.f32_or("ry", 0.0), self.f32_or("rz", 0.0))
    }

    fn color(&self) -> Vec4 {
        Vec4::new(
            self.f32_or("cr", 1.0),
            self.f32_or("cg", 1.0),
            self.f32_or("cb", 1.0),
            self.f32_or("ca", 1.0),
        )
    }

    fn cull_mode(&self, name: &str, default: CullMode) -> CullMode {
        match self.string(name) {
            Some(value) => CullMode::from_name(value).unwrap_or_else(|| {
                log::warn!("Unknown cull mode '{}', using {:?}", value, default);
                default
            }),
            None => default,
        }
    }
}

fn load_shader<B: GraphicsBackend>(system: &mut RenderSystem<B>, name: &str) -> Option<ShaderHandle> {
    let (backend, resources) = system.backend_and_resources();
    resources.shaders.load_or_reuse(backend, name)
}

fn load_texture<B: GraphicsBackend>(system: &mut RenderSystem<B>, path: Option<&str>) -> Option<TextureHandle> {
    let path = path?;
    let (backend, resources) = system.backend_and_resources();
    resources.textures.load_or_reuse(backend, path).map(|t| t.handle)
}

fn builtin_geometry<B, F>(system: &mut RenderSystem<B>, key: &str, build: F) -> Option<GpuGeometry>
where
    B: GraphicsBackend,
    F: FnOnce() -> Mesh,
{
    let (backend, resources) = system.backend_and_resources();
    resources.meshes.get_or_upload_with(backend, key, build)
}

fn create_sprite<B: GraphicsBackend>(
    system: &mut RenderSystem<B>,
    entity: EntityId,
    properties: &[Property],
) -> RenderResult<CreatedComponent> {
    let props = Properties(properties);
    let transform = Transform::from_euler_degrees(props.position(), Vec3::ZERO, props.f32_or("scale", 1.0));
    let texture_path = props.string("textureFilename").or_else(|| props.string("textureFileName"));

    let mut renderable = Renderable::new(RenderableKind::Sprite);
    renderable.texture = load_texture(system, texture_path);
    renderable.shader = load_shader(system, "shaders/sprite");
    renderable.geometry = builtin_geometry(system, "sprite", Mesh::sprite);

    system.registry_mut().insert_renderable(entity, transform, renderable);
    Ok(CreatedComponent::Renderable(entity))
}

fn create_ico_sphere<B: GraphicsBackend>(
    system: &mut RenderSystem<B>,
    entity: EntityId,
    properties: &[Property],
) -> RenderResult<CreatedComponent> {
    let props = Properties(properties);
    let transform = Transform::from_euler_degrees(props.position(), Vec3::ZERO, props.f32_or("scale", 1.0));

    let mut renderable = Renderable::new(RenderableKind::IcoSphere);
    renderable.lighting_enabled = props.bool_or("lightEnabled", true);
    renderable.cull_face = CullMode::Back;
    renderable.shader = load_shader(system, props.string_or("shader", "shaders/icosphere"));
    renderable.geometry = builtin_geometry(
        system,
        &format!("icosphere:{}", ICOSPHERE_SUBDIVISIONS),
        || Mesh::icosphere(ICOSPHERE_SUBDIVISIONS),
    );

    system.registry_mut().insert_renderable(entity, transform, renderable);
    Ok(CreatedComponent::Renderable(entity))
}

fn create_cube_sphere<B: GraphicsBackend>(
    system: &mut RenderSystem<B>,
    entity: EntityId,
    properties: &[Property],
) -> RenderResult<CreatedComponent> {
    let props = Properties(properties);
    let transform = Transform::from_euler_degrees(
        props.position(),
        props.rotation_degrees(),
        props.f32_or("scale", 1.0),
    );
    let subdivisions = props.i32_or("subdivision_levels", 1).max(0) as u32;

    let mut renderable = Renderable::new(RenderableKind::CubeSphere);
    renderable.lighting_enabled = props.bool_or("lightEnabled", true);
    renderable.fix_to_camera = props.bool_or("fix_to_camera", false);
    renderable.infinite_distance = props.bool_or("infinite_distance", false);
    renderable.cull_face = props.cull_mode("cullface", CullMode::Back);
    renderable.texture = load_texture(system, props.string("texture"));
    renderable.shader = load_shader(system, props.string_or("shader", "shaders/cubesphere"));
    renderable.geometry = builtin_geometry(system, &format!("cube_sphere:{}", subdivisions), || {
        Mesh::cube_sphere(subdivisions)
    });

    system.registry_mut().insert_renderable(entity, transform, renderable);
    Ok(CreatedComponent::Renderable(entity))
}

fn create_mesh<B: GraphicsBackend>(
    system: &mut RenderSystem<B>,
    entity: EntityId,
    properties: &[Property],
) -> RenderResult<CreatedComponent> {
    let props = Properties(properties);
    let transform = Transform::from_euler_degrees(
        props.position(),
        props.rotation_degrees(),
        props.f32_or("scale", 1.0),
    );

    let mut renderable = Renderable::new(RenderableKind::Mesh);
    renderable.lighting_enabled = props.bool_or("lightEnabled", true);
    renderable.cull_face = props.cull_mode("cullface", CullMode::Back);
    renderable.texture = load_texture(system, props.string("textureFileName"));
    renderable.shader = load_shader(system, props.string_or("shader", "shaders/mesh"));
    renderable.geometry = match props.string("meshFile") {
        Some(mesh_file) => {
            let (backend, resources) = system.backend_and_resources();
            resources.meshes.upload_or_reuse(backend, mesh_file)
        }
        None => {
            log::warn!("GLMesh for entity {} has no meshFile; it will not be drawn", entity);
            None
        }
    };

    system.registry_mut().insert_renderable(entity, transform, renderable);
    Ok(CreatedComponent::Renderable(entity))
}

fn push_view<B: GraphicsBackend>(
    system: &mut RenderSystem<B>,
    type_name: &str,
    entity: EntityId,
    properties: &[Property],
) -> RenderResult<CreatedComponent> {
    let props = Properties(properties);
    let view = View::for_type_name(type_name, entity, props.position(), props.rotation_degrees())
        .ok_or_else(|| RenderError::UnknownComponentType(type_name.to_string()))?;

    system.push_view(view);
    Ok(CreatedComponent::View(system.view_count() - 1))
}

fn create_rift_camera<B: GraphicsBackend>(
    system: &mut RenderSystem<B>,
    entity: EntityId,
    properties: &[Property],
) -> RenderResult<CreatedComponent> {
    push_view(system, "RiftCamera", entity, properties)
}

fn create_fps_camera<B: GraphicsBackend>(
    system: &mut RenderSystem<B>,
    entity: EntityId,
    properties: &[Property],
) -> RenderResult<CreatedComponent> {
    push_view(system, "FPSCamera", entity, properties)
}

fn create_six_dof_view<B: GraphicsBackend>(
    system: &mut RenderSystem<B>,
    entity: EntityId,
    properties: &[Property],
) -> RenderResult<CreatedComponent> {
    push_view(system, "GLSixDOFView", entity, properties)
}

fn create_point_light<B: GraphicsBackend>(
    system: &mut RenderSystem<B>,
    entity: EntityId,
    properties: &[Property],
) -> RenderResult<CreatedComponent> {
    let props = Properties(properties);
    let defaults = PointLight::default();
    let light = PointLight {
        color: props.color(),
        intensity: props.f32_or("intensity", defaults.intensity),
        radius: props.f32_or("radius", defaults.radius),
        falloff: props.f32_or("falloff", defaults.falloff),
    };

    system
        .registry_mut()
        .insert_point_light(entity, Transform::from_position(props.position()), light);
    Ok(CreatedComponent::PointLight(entity))
}

fn create_spot_light<B: GraphicsBackend>(
    system: &mut RenderSystem<B>,
    entity: EntityId,
    properties: &[Property],
) -> RenderResult<CreatedComponent> {
    let props = Properties(properties);
    let defaults = SpotLight::default();
    let mut light = SpotLight::new(
        props.color(),
        props.f32_or("intensity", defaults.intensity),
        props.f32_or("innerAngle", defaults.inner_angle()),
        props.f32_or("outerAngle", defaults.outer_angle()),
    );
    light.range = props.f32_or("range", 0.0).max(0.0);
    light.enabled = props.bool_or("enabled", true);

    let transform = Transform::from_euler_degrees(props.position(), props.rotation_degrees(), 1.0);
    system.registry_mut().insert_spot_light(entity, transform, light);
    Ok(CreatedComponent::SpotLight(entity))
}

/// Shared setup for screen quads and cursors
fn build_overlay<B: GraphicsBackend>(
    system: &mut RenderSystem<B>,
    mut overlay: ScreenSpaceComponent,
    props: &Properties<'_>,
    default_shader: &str,
) -> CreatedComponent {
    let size = overlay.size;
    let key = format!("screen_quad:{}x{}", size.x, size.y);
    overlay.geometry = builtin_geometry(system, &key, || Mesh::screen_quad(size));
    overlay.shader = load_shader(system, props.string_or("shader", default_shader));

    // In-memory textures are filled by an external producer, so they take
    // precedence over files on disk.
    overlay.texture = if let Some(name) = props.string("textureName") {
        let (width, height) = system.window_size();
        let (backend, resources) = system.backend_and_resources();
        resources
            .textures
            .get_or_create_blank(backend, name, width, height)
            .map(|t| t.handle)
    } else {
        load_texture(system, props.string("textureFileName"))
    };

    let overlays = system.overlays_mut();
    overlays.push(overlay);
    CreatedComponent::Overlay(overlays.len() - 1)
}

fn overlay_rect(props: &Properties<'_>) -> (Vec2, Vec2) {
    (
        Vec2::new(props.f32_or("left", 0.0), props.f32_or("top", 0.0)),
        Vec2::new(props.f32_or("width", 0.0), props.f32_or("height", 0.0)),
    )
}

fn create_screen_quad<B: GraphicsBackend>(
    system: &mut RenderSystem<B>,
    entity: EntityId,
    properties: &[Property],
) -> RenderResult<CreatedComponent> {
    let props = Properties(properties);
    let (position, size) = overlay_rect(&props);
    let overlay = ScreenSpaceComponent::quad(entity, position, size);
    Ok(build_overlay(system, overlay, &props, "shaders/quad"))
}

fn create_screen_cursor<B: GraphicsBackend>(
    system: &mut RenderSystem<B>,
    entity: EntityId,
    properties: &[Property],
) -> RenderResult<CreatedComponent> {
    let props = Properties(properties);
    let (position, size) = overlay_rect(&props);
    let hotspot = Vec2::new(props.f32_or("hotspotx", 0.0), props.f32_or("hotspoty", 0.0));
    let overlay = ScreenSpaceComponent::cursor(entity, position, size, hotspot);
    Ok(build_overlay(system, overlay, &props, "shaders/cursor"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_coercion() {
        assert_eq!(PropertyValue::Int(3).as_f32(), Some(3.0));
        assert_eq!(PropertyValue::from("2.5").as_f32(), Some(2.5));
        assert_eq!(PropertyValue::from("yes").as_bool(), Some(true));
        assert_eq!(PropertyValue::Float(0.0).as_bool(), Some(false));
        assert_eq!(PropertyValue::Float(4.9).as_i32(), Some(4));
        assert_eq!(PropertyValue::Float(1.0).as_str(), None);
        assert_eq!(PropertyValue::from("wide").as_f32(), None);
    }

    #[test]
    fn test_last_property_wins() {
        let list = [
            Property::new("radius", 1.0f32),
            Property::new("radius", 4.0f32),
            Property::new("shader", ""),
        ];
        let props = Properties(&list);
        assert_eq!(props.f32_or("radius", 0.0), 4.0);
        assert_eq!(props.f32_or("falloff", 2.0), 2.0);
        // Empty strings count as unset
        assert_eq!(props.string_or("shader", "shaders/mesh"), "shaders/mesh");
    }

    #[test]
    fn test_unusable_value_falls_back_to_default() {
        let list = [Property::new("x", "left"), Property::new("cullface", "sideways")];
        let props = Properties(&list);
        assert_eq!(props.position(), Vec3::ZERO);
        assert_eq!(props.cull_mode("cullface", CullMode::Front), CullMode::Front);
        assert_eq!(props.color(), Vec4::ONE);
    }
}
