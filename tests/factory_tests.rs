//! Component factory integration tests.

mod common;

use glam::{Vec2, Vec3, Vec4};
use rstest::rstest;

use common::{factory, float, started_system};
use stereo_deferred::backend::recording::BackendCall;
use stereo_deferred::backend::CullMode;
use stereo_deferred::resources::Mesh;
use stereo_deferred::{CreatedComponent, Property, RenderError};

#[test]
fn test_default_type_names() {
    let factory = factory();
    assert_eq!(
        factory.type_names(),
        vec![
            "FPSCamera",
            "GLCubeSphere",
            "GLIcoSphere",
            "GLMesh",
            "GLScreenCursor",
            "GLScreenQuad",
            "GLSixDOFView",
            "GLSprite",
            "PointLight",
            "RiftCamera",
            "SpotLight",
        ]
    );
}

#[test]
fn test_unknown_type_is_rejected() {
    let mut system = started_system();
    let err = factory()
        .create(&mut system, "GLTeapot", 1, &[float("x", 1.0)])
        .unwrap_err();
    assert!(matches!(err, RenderError::UnknownComponentType(name) if name == "GLTeapot"));
    assert!(!system.registry().contains(1));
}

#[test]
fn test_point_light_from_properties() {
    let mut system = started_system();
    let created = factory()
        .create(
            &mut system,
            "PointLight",
            3,
            &[
                float("x", 1.0),
                float("y", 2.0),
                float("radius", 5.0),
                float("intensity", 0.8),
            ],
        )
        .unwrap();
    assert_eq!(created, CreatedComponent::PointLight(3));

    let light = system.registry().point_light(3).unwrap();
    assert_eq!(light.radius, 5.0);
    assert_eq!(light.intensity, 0.8);
    assert_eq!(light.falloff, 2.0);
    assert_eq!(light.color, Vec4::ONE);
    assert_eq!(
        system.registry().transform(3).map(|t| t.position),
        Some(Vec3::new(1.0, 2.0, 0.0))
    );
}

#[test]
fn test_spot_light_from_properties() {
    let mut system = started_system();
    factory()
        .create(
            &mut system,
            "SpotLight",
            4,
            &[
                float("cr", 0.5),
                float("innerAngle", 0.3),
                float("outerAngle", 0.5),
                Property::new("range", 12),
                float("rx", -90.0),
            ],
        )
        .unwrap();

    let light = system.registry().spot_light(4).unwrap();
    assert_eq!(light.color, Vec4::new(0.5, 1.0, 1.0, 1.0));
    assert!((light.cos_inner_angle() - 0.3f32.cos()).abs() < 1e-6);
    assert!((light.cos_outer_angle() - 0.5f32.cos()).abs() < 1e-6);
    assert_eq!(light.range, 12.0);
    assert!(light.enabled);
    assert!(light.is_bounded());

    let forward = system.registry().transform(4).unwrap().forward();
    assert!(forward.abs_diff_eq(Vec3::NEG_Y, 1e-5));
}

#[test]
fn test_cube_sphere_defaults_and_overrides() {
    let mut system = started_system();
    let factory = factory();
    factory.create(&mut system, "GLCubeSphere", 1, &[]).unwrap();
    factory
        .create(
            &mut system,
            "GLCubeSphere",
            2,
            &[
                Property::new("subdivision_levels", 3),
                Property::new("cullface", "front"),
                Property::new("infinite_distance", "true"),
                Property::new("lightEnabled", 0),
            ],
        )
        .unwrap();
    factory.create(&mut system, "GLCubeSphere", 3, &[]).unwrap();

    let registry = system.registry();
    let plain = registry.renderable(1).unwrap();
    assert_eq!(plain.cull_face, CullMode::Back);
    assert!(plain.lighting_enabled);
    assert!(!plain.infinite_distance);
    assert!(plain.is_drawable());

    let sky = registry.renderable(2).unwrap();
    assert_eq!(sky.cull_face, CullMode::Front);
    assert!(sky.infinite_distance);
    assert!(!sky.lighting_enabled);
    assert_ne!(sky.geometry, plain.geometry);

    // Same subdivision level shares the uploaded geometry
    assert_eq!(registry.renderable(3).unwrap().geometry, plain.geometry);
}

#[test]
fn test_shaders_loaded_once() {
    let mut system = started_system();
    system.backend_mut().clear_calls();
    let factory = factory();
    for entity in 1..=3 {
        factory.create(&mut system, "GLIcoSphere", entity, &[]).unwrap();
    }

    let loads = system
        .backend()
        .calls()
        .iter()
        .filter(|call| matches!(call, BackendCall::LoadShader { name, .. } if name == "shaders/icosphere"))
        .count();
    assert_eq!(loads, 1);

    let geometry = system.registry().renderable(1).unwrap().geometry;
    assert!(geometry.is_some());
    assert_eq!(system.registry().renderable(3).unwrap().geometry, geometry);
}

#[test]
fn test_missing_texture_file_is_not_fatal() {
    let mut system = started_system();
    let created = factory()
        .create(
            &mut system,
            "GLSprite",
            1,
            &[Property::new("textureFilename", "does/not/exist.png")],
        )
        .unwrap();
    assert_eq!(created, CreatedComponent::Renderable(1));

    let sprite = system.registry().renderable(1).unwrap();
    assert_eq!(sprite.texture, None);
    assert!(sprite.is_drawable());
}

#[rstest]
#[case::no_mesh_file(None, false)]
#[case::registered(Some("models/crate"), true)]
#[case::unregistered(Some("models/missing"), false)]
fn test_mesh_file_lookup(#[case] mesh_file: Option<&str>, #[case] drawable: bool) {
    let mut system = started_system();
    system
        .resources_mut()
        .meshes
        .register("models/crate", Mesh::icosphere(1));

    let properties: Vec<Property> = mesh_file
        .map(|file| vec![Property::new("meshFile", file)])
        .unwrap_or_default();
    factory().create(&mut system, "GLMesh", 5, &properties).unwrap();

    let mesh = system.registry().renderable(5).unwrap();
    assert_eq!(mesh.geometry.is_some(), drawable);
    assert_eq!(mesh.is_drawable(), drawable);
}

#[test]
fn test_registered_mesh_uploaded_once() {
    let mut system = started_system();
    system
        .resources_mut()
        .meshes
        .register("models/crate", Mesh::icosphere(1));
    let factory = factory();
    let file = [Property::new("meshFile", "models/crate")];
    factory.create(&mut system, "GLMesh", 1, &file).unwrap();
    factory.create(&mut system, "GLMesh", 2, &file).unwrap();

    let registry = system.registry();
    assert_eq!(
        registry.renderable(1).unwrap().geometry,
        registry.renderable(2).unwrap().geometry
    );
}

#[test]
fn test_views_from_factory() {
    let mut system = started_system();
    let factory = factory();

    let fps = factory
        .create(&mut system, "FPSCamera", 1, &[float("z", 3.0)])
        .unwrap();
    assert_eq!(fps, CreatedComponent::View(0));
    assert_eq!(system.view_mode(), Some("FPSCamera"));

    let rift = factory
        .create(&mut system, "RiftCamera", 2, &[float("y", 1.7)])
        .unwrap();
    assert_eq!(rift, CreatedComponent::View(1));
    assert_eq!(system.view_mode(), Some("RiftCamera"));

    let active = system.active_view().unwrap();
    assert_eq!(active.entity(), 2);
    assert_eq!(active.position(), Vec3::new(0.0, 1.7, 0.0));

    assert!(system.pop_view());
    assert_eq!(system.view_mode(), Some("FPSCamera"));
}

#[test]
fn test_screen_quads_share_named_texture() {
    let mut system = started_system();
    let factory = factory();
    let creations = system.backend().texture_creations();
    let quad = [
        float("width", 0.5),
        float("height", 0.5),
        Property::new("textureName", "vm_screen"),
    ];
    assert_eq!(
        factory.create(&mut system, "GLScreenQuad", 1, &quad).unwrap(),
        CreatedComponent::Overlay(0)
    );
    assert_eq!(
        factory.create(&mut system, "GLScreenQuad", 2, &quad).unwrap(),
        CreatedComponent::Overlay(1)
    );

    assert_eq!(system.backend().texture_creations(), creations + 1);
    let overlays = system.overlays();
    assert_eq!(overlays[0].texture, overlays[1].texture);
    assert_eq!(overlays[0].geometry, overlays[1].geometry);

    let texture = overlays[0].texture.unwrap();
    let desc = system.backend().texture_descriptor(texture).unwrap();
    assert_eq!((desc.width, desc.height), (1024, 768));
}

#[test]
fn test_cursor_from_properties() {
    let mut system = started_system();
    factory()
        .create(
            &mut system,
            "GLScreenCursor",
            9,
            &[
                float("left", 0.5),
                float("top", 0.5),
                float("width", 0.04),
                float("height", 0.06),
                float("hotspotx", 0.25),
                float("hotspoty", 0.5),
                Property::new("textureName", "cursor"),
            ],
        )
        .unwrap();

    let cursor = &system.overlays()[0];
    assert!(cursor.is_cursor());
    assert_eq!(cursor.entity, 9);
    assert_eq!(cursor.position, Vec2::new(0.5, 0.5));
    assert_eq!(cursor.cursor.map(|c| c.hotspot), Some(Vec2::new(0.25, 0.5)));
    assert!(cursor.should_draw());

    // Cursors without a texture never draw
    factory()
        .create(&mut system, "GLScreenCursor", 10, &[float("width", 0.04), float("height", 0.04)])
        .unwrap();
    assert!(!system.overlays()[1].should_draw());
}

#[test]
fn test_remove_entity_drops_all_components() {
    let mut system = started_system();
    let factory = factory();
    factory.create(&mut system, "GLIcoSphere", 1, &[]).unwrap();
    factory.create(&mut system, "PointLight", 1, &[]).unwrap();
    factory
        .create(
            &mut system,
            "GLScreenQuad",
            1,
            &[float("width", 0.1), float("height", 0.1)],
        )
        .unwrap();
    factory.create(&mut system, "GLIcoSphere", 2, &[]).unwrap();

    assert!(system.remove_entity(1));
    assert!(system.registry().renderable(1).is_none());
    assert!(system.registry().point_light(1).is_none());
    assert!(system.overlays().is_empty());
    assert!(system.registry().renderable(2).is_some());

    assert!(!system.remove_entity(1));
}
