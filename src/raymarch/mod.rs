//! Raymarch orchestration: descriptor packing, parameter binding, target
//! management, and per-frame pass sequencing.

/// Per-frame uniform binding.
pub mod binder;
/// Kernel interface checks against the Rust layouts.
pub mod contract;
/// GPU layout of one shape.
pub mod descriptor;
/// Compute dispatch sizing.
pub mod dispatch;
/// Cached render targets and per-frame transient buffers.
pub mod frame_resources;
/// Shape slot → descriptor array conversion.
pub mod packer;
/// Pass sequencing.
pub mod pipeline;
/// Named kernel uniforms and their block layout.
pub mod uniforms;

pub use binder::ParameterBinder;
pub use descriptor::{ShapeDescriptor, SHAPE_DESCRIPTOR_STRIDE};
pub use dispatch::WorkgroupCount;
pub use frame_resources::{FrameResources, TargetTag, TransientBuffers};
pub use packer::{DescriptorPacker, PackedShapes};
pub use pipeline::{FrameIo, FrameOutcome, PassThroughReason, RaymarchPipeline};
pub use uniforms::{Uniform, UniformTable};
