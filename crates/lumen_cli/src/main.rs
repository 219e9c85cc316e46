//! Lumen - headless driver for the interactive path tracer
//!
//! Spawns the render loop on the demo scene, optionally feeds it a stretch
//! of simulated camera input, waits for the requested number of frames and
//! writes the result as a PNG.

mod cli;
mod demo;

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use lumen_core::TextureCache;
use lumen_math::Vec2;
use lumen_renderer::{Camera, CameraInput, Frame, Properties, RenderLoop};

use cli::Args;

/// Simulated input tick.
const TICK: Duration = Duration::from_millis(16);
/// Pointer travel per simulated tick, in window pixels.
const ORBIT_STEP: f32 = 12.0;

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(args.log_level.into())
        .init();

    log::info!("Starting Lumen");

    let properties = load_properties(&args)?;
    log::info!("Render properties: {:?}", properties);

    let mut cache = TextureCache::new();
    let scene = demo::build_scene(&mut cache, args.texture.as_deref());

    let mut camera = demo::default_camera();
    if let Some(fov) = args.fov {
        camera.change_view(fov, camera.near_clip, camera.far_clip);
    }

    let render = RenderLoop::spawn(scene, &camera, properties, args.width, args.height)
        .context("Failed to start the render loop")?;

    if args.orbit_ticks > 0 {
        orbit(&render, &mut camera, args.orbit_ticks);
    }

    let start = Instant::now();
    let target = render.completed_frames() + args.frames;
    if !render.wait_for_frames(target, Duration::from_secs(args.timeout)) {
        log::warn!(
            "Timed out after {}s with {} of {} frames",
            args.timeout,
            render.completed_frames(),
            target
        );
    }

    let frame = render.frame();
    let stats = render.stats();
    render.shutdown()?;

    log::info!(
        "Rendered {} frames ({} cancelled) in {:.2?}, last frame {:.2?}",
        stats.completed,
        stats.cancelled,
        start.elapsed(),
        stats.last_frame_time
    );

    save_png(&args.output, &frame)?;
    log::info!("Saved {}", args.output.display());

    Ok(())
}

/// Properties from the optional JSON file, then overridden by the command line.
fn load_properties(args: &Args) -> Result<Properties> {
    let mut properties = match &args.properties {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => Properties::default(),
    };

    if let Some(flags) = args.flags {
        properties.render_flags = flags;
    }
    if let Some(bounces) = args.bounces {
        properties.bounce_limit = bounces;
    }

    Ok(properties.clamped())
}

/// Drag the view sideways for `ticks` input samples, the way a user holding
/// the look button would.
fn orbit(render: &RenderLoop, camera: &mut Camera, ticks: u32) {
    let mut input = CameraInput {
        look: true,
        ..Default::default()
    };

    // First sample only anchors the pointer.
    camera.on_update(&input, TICK.as_secs_f32());

    for _ in 0..ticks {
        input.pointer += Vec2::new(ORBIT_STEP, 0.0);
        if camera.on_update(&input, TICK.as_secs_f32()) {
            render.camera_moved(camera);
        }
        thread::sleep(TICK);
    }

    log::debug!("Camera after orbit: {:?}", camera);
}

fn save_png(path: &Path, frame: &Frame) -> Result<()> {
    if frame.width == 0 || frame.height == 0 {
        bail!("Nothing to save: frame is {}x{}", frame.width, frame.height);
    }

    image::save_buffer(
        path,
        &frame.to_rgba_bytes_top_down(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
    )
    .with_context(|| format!("Failed to write {}", path.display()))
}
