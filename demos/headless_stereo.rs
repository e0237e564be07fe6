//! Headless stereo demo
//!
//! Builds a small scene through the component factory on the recording
//! backend, optionally switches to Rift DK1 stereo output and renders a
//! number of frames at a simulated clock.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example headless_stereo
//!   RUST_LOG=debug cargo run --example headless_stereo -- --stereo --frames 5

use clap::Parser;
use stereo_deferred::backend::recording::RecordingBackend;
use stereo_deferred::{ComponentFactory, EngineConfig, HmdInfo, Property, RenderSystem};

#[derive(Parser, Debug)]
#[command(name = "headless_stereo", about = "Render a demo scene without a GPU", version)]
struct Args {
    /// Render side-by-side stereo with lens distortion (Rift DK1 geometry)
    #[arg(long)]
    stereo: bool,

    /// Number of frames to render
    #[arg(long, default_value = "3")]
    frames: u32,

    /// Simulated seconds between updates
    #[arg(long, default_value = "0.01")]
    step: f32,

    /// Optional TOML engine config
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Window width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Window height in pixels
    #[arg(long)]
    height: Option<u32>,
}

fn build_scene(
    system: &mut RenderSystem<RecordingBackend>,
    factory: &ComponentFactory<RecordingBackend>,
) -> stereo_deferred::RenderResult<()> {
    let scene: Vec<(&str, u32, Vec<Property>)> = vec![
        (
            "GLCubeSphere",
            1,
            vec![
                Property::new("subdivision_levels", 2),
                Property::new("scale", 500.0f32),
                Property::new("infinite_distance", true),
                Property::new("lightEnabled", false),
                Property::new("cullface", "front"),
            ],
        ),
        (
            "GLIcoSphere",
            2,
            vec![Property::new("z", -5.0f32), Property::new("scale", 2.0f32)],
        ),
        (
            "PointLight",
            3,
            vec![
                Property::new("x", 1.0f32),
                Property::new("y", 2.0f32),
                Property::new("z", -4.0f32),
                Property::new("radius", 5.0f32),
                Property::new("intensity", 0.8f32),
            ],
        ),
        (
            "PointLight",
            4,
            vec![Property::new("z", 50.0f32), Property::new("radius", 1.0f32)],
        ),
        (
            "SpotLight",
            5,
            vec![
                Property::new("y", 3.0f32),
                Property::new("rx", -90.0f32),
                Property::new("outerAngle", 0.6f32),
                Property::new("innerAngle", 0.4f32),
            ],
        ),
        (
            "GLScreenQuad",
            6,
            vec![
                Property::new("left", 0.7f32),
                Property::new("top", 0.05f32),
                Property::new("width", 0.25f32),
                Property::new("height", 0.25f32),
                Property::new("textureName", "vm_screen"),
            ],
        ),
        (
            "FPSCamera",
            7,
            vec![Property::new("z", 3.0f32), Property::new("ry", 10.0f32)],
        ),
    ];

    for (type_name, entity, properties) in &scene {
        factory.create(system, type_name, *entity, properties)?;
    }
    system.ensure_default_view();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }

    let mut system = RenderSystem::new(RecordingBackend::new(), config);
    system.start()?;

    let factory = ComponentFactory::with_defaults();
    build_scene(&mut system, &factory)?;

    if args.stereo {
        system.set_stereo_mode(&HmdInfo::rift_dk1())?;
    }

    let mut rendered = 0;
    let mut updates = 0u64;
    while rendered < args.frames {
        updates += 1;
        if system.update(args.step) {
            rendered += 1;
            let stats = system.last_frame_stats();
            log::info!(
                "frame {}: {} eyes, {} geometry / {} forward / {} overlay draws, \
                 point lights {} drawn {} culled, distortion {}",
                system.frames_rendered(),
                stats.eyes,
                stats.geometry_draws,
                stats.forward_draws,
                stats.overlay_draws,
                stats.point_lights_drawn,
                stats.point_lights_culled,
                stats.distortion_applied
            );
        }
    }

    let output = system.output();
    println!(
        "Rendered {} frames in {} updates ({}x{}, stereo: {}, {} backend calls)",
        rendered,
        updates,
        output.width,
        output.height,
        output.stereo,
        system.backend().calls().len()
    );

    system.shutdown();
    Ok(())
}
