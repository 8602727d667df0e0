//! Per-frame sequencing of the smoke passes.

use super::binder::{voxel_upload_bytes, FrameParameters, ParameterBinder};
use super::dispatch::WorkgroupCount;
use super::frame_resources::{FrameResources, FrameTargets, TransientBuffers};
use super::packer::DescriptorPacker;
use crate::error::VolmarchError;
use crate::gpu::backend::{CompositeDraw, GpuBackend, KernelBindings, TextureId};
use crate::options::{Options, RaymarchOptions};
use crate::scene::camera::Camera;
use crate::scene::SceneSnapshot;

/// Host images for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameIo {
    /// Rendered scene color (read only).
    pub source: TextureId,
    /// Where the final image goes.
    pub destination: TextureId,
    /// Scene depth, if the host has one.
    pub scene_depth: Option<TextureId>,
}

/// Why a frame was passed through unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassThroughReason {
    /// Neither a current nor a main camera exists.
    NoCamera,
    /// The camera has a zero-sized viewport.
    EmptyViewport,
    /// The raymarch kernel did not load.
    KernelUnavailable,
    /// A pass failed; the frame fell back to a copy.
    FrameFailed,
}

/// What [`RaymarchPipeline::render_frame`] wrote into the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The source, copied unmodified.
    PassThrough(PassThroughReason),
    /// The source with smoke composited over it.
    Composited {
        /// Thread groups dispatched.
        groups: WorkgroupCount,
        /// Descriptors the kernel iterated over.
        shape_count: usize,
    },
}

impl FrameOutcome {
    /// Whether smoke was composited.
    #[must_use]
    pub fn is_composited(&self) -> bool {
        matches!(self, Self::Composited { .. })
    }
}

/// Orchestrates depth capture, binding, dispatch, upscale, and composite.
///
/// One instance per rendering session. Targets persist across frames and
/// are reallocated only when the viewport changes; shape and voxel buffers
/// live for exactly one frame.
#[derive(Debug)]
pub struct RaymarchPipeline {
    options: Options,
    packer: DescriptorPacker,
    binder: ParameterBinder,
    resources: FrameResources,
    frame_index: u64,
}

impl RaymarchPipeline {
    /// Pipeline with `options`. The null-shape policy is fixed here for the
    /// pipeline's lifetime.
    #[must_use]
    pub fn new(options: Options) -> Self {
        let packer = DescriptorPacker::new(options.pipeline.null_shape_policy);
        log::info!(
            "Raymarch pipeline created (quarter resolution: {}, null shapes: {:?})",
            options.pipeline.quarter_resolution,
            packer.policy()
        );
        Self {
            options,
            packer,
            binder: ParameterBinder::new(),
            resources: FrameResources::new(),
            frame_index: 0,
        }
    }

    /// Current options.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Replace the options. A changed null-shape policy is ignored.
    pub fn set_options(&mut self, options: Options) {
        if options.pipeline.null_shape_policy != self.packer.policy() {
            log::warn!(
                "Null-shape policy is fixed per pipeline; keeping {:?}",
                self.packer.policy()
            );
        }
        self.options = options;
        self.options.pipeline.null_shape_policy = self.packer.policy();
    }

    /// Replace the volumetric tuning scalars.
    pub fn set_raymarch_options(&mut self, raymarch: RaymarchOptions) {
        self.options.raymarch = raymarch;
    }

    /// Session-wide targets.
    #[must_use]
    pub fn resources(&self) -> &FrameResources {
        &self.resources
    }

    /// Frames rendered so far, including pass-throughs.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Render one frame into `io.destination`.
    ///
    /// Exactly one of a pass-through copy or the smoke composite is written.
    /// Failures never escape the frame: they are logged and the source is
    /// copied instead.
    pub fn render_frame(
        &mut self,
        backend: &mut dyn GpuBackend,
        io: &FrameIo,
        scene: &SceneSnapshot<'_>,
    ) -> FrameOutcome {
        self.frame_index += 1;

        let Some(camera) = scene.cameras.resolve() else {
            log::debug!("No camera for frame {}, passing through", self.frame_index);
            return pass_through(backend, io, PassThroughReason::NoCamera);
        };
        if !backend.kernel_available() {
            return pass_through(backend, io, PassThroughReason::KernelUnavailable);
        }
        let (width, height) = camera.viewport();
        if width == 0 || height == 0 {
            log::debug!("Empty viewport for frame {}, passing through", self.frame_index);
            return pass_through(backend, io, PassThroughReason::EmptyViewport);
        }

        let mut transients = TransientBuffers::new();
        let outcome =
            match self.encode(backend, io, scene, camera, &mut transients) {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!(
                        "Raymarch frame {} failed, passing through: {e}",
                        self.frame_index
                    );
                    copy(backend, io);
                    FrameOutcome::PassThrough(PassThroughReason::FrameFailed)
                }
            };
        backend.submit();
        transients.release_all(backend);
        outcome
    }

    fn encode(
        &mut self,
        backend: &mut dyn GpuBackend,
        io: &FrameIo,
        scene: &SceneSnapshot<'_>,
        camera: &Camera,
        transients: &mut TransientBuffers,
    ) -> Result<FrameOutcome, VolmarchError> {
        let (width, height) = camera.viewport();
        let quarter = self.options.pipeline.quarter_resolution;
        let targets = self.resources.ensure_viewport(backend, width, height)?;

        if quarter {
            backend.composite(
                &CompositeDraw::DepthCapture {
                    scene_depth: io.scene_depth,
                },
                targets.depth,
            )?;
        }

        let packed = self.packer.pack(scene.shapes.iter().copied());
        let shape_count = u32::try_from(packed.count()).map_err(|_| {
            VolmarchError::Allocation(format!("{} shapes", packed.count()))
        })?;
        let shapes =
            transients.upload(backend, "Raymarch Shapes", &packed.upload_bytes())?;
        let voxels = transients.upload(
            backend,
            "Raymarch Voxels",
            &voxel_upload_bytes(scene.volume),
        )?;

        let params = self.binder.bind(&FrameParameters {
            camera,
            light: scene.light,
            tuning: &self.options.raymarch,
            volume: scene.volume,
            shape_count,
            time: scene.time,
            quarter_resolution: quarter,
        })?;

        let groups = WorkgroupCount::for_viewport(width, height);
        backend.dispatch_raymarch(
            &KernelBindings {
                params: &params,
                shapes,
                voxels,
                source: io.source,
                result: targets.main,
                albedo_quarter: targets.albedo_quarter,
                mask_quarter: targets.mask_quarter,
                depth: targets.depth,
            },
            groups,
        )?;

        if quarter {
            self.upscale_and_composite(backend, io, &targets)?;
        } else {
            backend.blit(targets.main, io.destination)?;
        }

        log::debug!(
            "Frame {}: {} shapes ({} skipped), {}x{}x{} groups",
            self.frame_index,
            packed.count(),
            packed.skipped(),
            groups.x,
            groups.y,
            groups.z
        );
        Ok(FrameOutcome::Composited {
            groups,
            shape_count: packed.count(),
        })
    }

    fn upscale_and_composite(
        &self,
        backend: &mut dyn GpuBackend,
        io: &FrameIo,
        targets: &FrameTargets,
    ) -> Result<(), VolmarchError> {
        backend.composite(
            &CompositeDraw::Upscale {
                smoke: targets.albedo_quarter,
                mask: targets.mask_quarter,
                depth: targets.depth,
                sharpness: self.options.raymarch.sharpness,
            },
            targets.albedo_full,
        )?;
        backend.composite(
            &CompositeDraw::Overlay {
                scene: io.source,
                smoke: targets.albedo_full,
            },
            io.destination,
        )
    }

    /// Release every session target.
    pub fn release(&mut self, backend: &mut dyn GpuBackend) {
        self.resources.release_all(backend);
    }
}

fn copy(backend: &mut dyn GpuBackend, io: &FrameIo) {
    if let Err(e) = backend.blit(io.source, io.destination) {
        log::error!("Pass-through copy failed: {e}");
    }
}

fn pass_through(
    backend: &mut dyn GpuBackend,
    io: &FrameIo,
    reason: PassThroughReason,
) -> FrameOutcome {
    copy(backend, io);
    backend.submit();
    FrameOutcome::PassThrough(reason)
}
