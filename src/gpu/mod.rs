//! GPU seam and its implementations.
//!
//! The raymarch pipeline talks to the GPU only through
//! [`backend::GpuBackend`]. [`wgpu_backend::WgpuBackend`] drives a real
//! device; [`recording::RecordingBackend`] records commands for tests and
//! dry runs.

/// Backend trait, resource handles, and pass descriptions.
pub mod backend;
/// wgpu boilerplate helpers for the kernel and material pipelines.
pub mod pipeline_helpers;
/// Command-recording backend: a public test double for hosts that unit
/// test their frame loop without a GPU.
pub mod recording;
/// wgpu device and queue initialization.
pub mod render_context;
/// WGSL shader composition with `#import` support via naga-oil.
pub mod shader_composer;
/// Backend-owned and imported textures.
pub mod texture;
/// wgpu backend.
pub mod wgpu_backend;
