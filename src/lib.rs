// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]
// Tests unwrap and panic freely
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

//! Volumetric smoke raymarching over an existing rendered frame, built on
//! wgpu.
//!
//! Each frame a compute kernel marches rays through analytic shapes and an
//! optional voxel density grid, optionally at quarter resolution followed
//! by a depth-aware upscale, and the smoke is composited over the host's
//! image. When no camera exists or the kernel failed to load, the frame is
//! copied through unmodified.
//!
//! # Key entry points
//!
//! - [`raymarch::RaymarchPipeline`] - per-frame pass sequencing
//! - [`gpu::backend::GpuBackend`] - the GPU seam, implemented by
//!   [`gpu::wgpu_backend::WgpuBackend`] and
//!   [`gpu::recording::RecordingBackend`]
//! - [`scene::SceneSnapshot`] - cameras, light, shapes, and voxels for one
//!   frame
//! - [`options::Options`] - tuning and pipeline configuration
//!
//! # Frame sequence
//!
//! depth capture → parameter binding → raymarch dispatch → upscale →
//! overlay, submitted once. Render targets persist across frames and are
//! reallocated only on resize; shape and voxel buffers live for one frame.

pub mod error;
pub mod gpu;
pub mod options;
pub mod raymarch;
pub mod scene;
pub mod util;

pub use error::VolmarchError;
