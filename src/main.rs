//! Headless driver: renders a TOML scene for a number of frames into
//! offscreen textures and logs each frame's outcome.

use std::path::PathBuf;

use volmarch::gpu::render_context::RenderContext;
use volmarch::gpu::wgpu_backend::WgpuBackend;
use volmarch::options::Options;
use volmarch::raymarch::pipeline::{FrameIo, RaymarchPipeline};
use volmarch::scene::camera::CameraSlots;
use volmarch::scene::{SceneDescription, SceneSnapshot, VolumeDescription};
use volmarch::util::frame_timing::FrameClock;
use volmarch::VolmarchError;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const SCENE_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct Args {
    scene: PathBuf,
    options: Option<PathBuf>,
    frames: u64,
}

impl Args {
    fn parse() -> Option<Self> {
        let mut args = std::env::args().skip(1);
        let scene = PathBuf::from(args.next()?);
        let mut options = None;
        let mut frames = 60;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--options" => options = Some(PathBuf::from(args.next()?)),
                "--frames" => frames = args.next()?.parse().ok()?,
                _ => return None,
            }
        }
        Some(Self {
            scene,
            options,
            frames,
        })
    }
}

fn offscreen(
    device: &wgpu::Device,
    label: &str,
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: WIDTH,
            height: HEIGHT,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// Stand-in for the host's scene render: a flat sky and a far-plane depth.
fn clear_scene(context: &RenderContext, color: &wgpu::Texture, depth: &wgpu::Texture) {
    let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
    let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
    let mut encoder = context.create_encoder();
    {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.35,
                        g: 0.5,
                        b: 0.7,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
    context.submit(encoder);
}

fn run(args: &Args) -> Result<(), VolmarchError> {
    let scene = SceneDescription::load(&args.scene)?;
    let options = match &args.options {
        Some(path) => Options::load(path)?,
        None => Options::default(),
    };
    log::info!(
        "Loaded {} shapes from {}",
        scene.shapes.len(),
        args.scene.display()
    );

    let context = pollster::block_on(RenderContext::new_headless())?;
    let source = offscreen(&context.device, "Scene Color", COLOR_FORMAT);
    let destination = offscreen(&context.device, "Destination", COLOR_FORMAT);
    let depth = offscreen(&context.device, "Scene Depth", SCENE_DEPTH_FORMAT);
    clear_scene(&context, &source, &depth);

    let mut backend = WgpuBackend::new(context, &options.pipeline)?;
    let io = FrameIo {
        source: backend.import_texture(&source),
        destination: backend.import_texture(&destination),
        scene_depth: Some(backend.import_texture(&depth)),
    };

    let registry = scene.registry();
    let volume = scene
        .volume
        .as_ref()
        .map(VolumeDescription::to_volume)
        .transpose()?;
    let camera = scene.camera.to_camera(WIDTH, HEIGHT);
    let mut pipeline = RaymarchPipeline::new(options);
    let mut clock = FrameClock::new();

    for _ in 0..args.frames {
        let mut snapshot = SceneSnapshot::new(
            CameraSlots::main(camera),
            scene.light.as_ref(),
            &registry,
        )
        .at_time(clock.elapsed_secs());
        if let Some(volume) = &volume {
            snapshot = snapshot.with_volume(volume);
        }
        let outcome = pipeline.render_frame(&mut backend, &io, &snapshot);
        let frame_time = clock.end_frame();
        log::debug!(
            "Frame {}: {outcome:?} in {:.2} ms",
            pipeline.frame_index(),
            frame_time.as_secs_f64() * 1000.0
        );
    }
    log::info!("Rendered {} frames at {:.1} fps", clock.frames(), clock.fps());

    pipeline.release(&mut backend);
    backend.forget_texture(io.source);
    backend.forget_texture(io.destination);
    if let Some(id) = io.scene_depth {
        backend.forget_texture(id);
    }
    Ok(())
}

fn main() -> std::process::ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(args) = Args::parse() else {
        log::error!("usage: volmarch <scene.toml> [--options <preset.toml>] [--frames <n>]");
        return std::process::ExitCode::FAILURE;
    };
    match run(&args) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            std::process::ExitCode::FAILURE
        }
    }
}
