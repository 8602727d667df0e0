//! GPU layout of one volumetric shape.
//!
//! The kernel declares the same record as
//!
//! ```wgsl
//! struct ShapeDescriptor {
//!     position: array<f32, 3>,
//!     half_extent: array<f32, 3>,
//!     color: array<f32, 3>,
//!     collider_min: array<f32, 3>,
//!     collider_max: array<f32, 3>,
//!     shape_kind: u32,
//!     phase_kind: u32,
//!     sigma_absorption: f32,
//!     sigma_scatter: f32,
//!     feathering_strength: f32,
//!     asymmetry_g: f32,
//!     sparsity: f32,
//!     transparency: f32,
//!     gravity_multiplier: f32,
//!     use_light: u32,
//!     use_forward_path: u32,
//! }
//! ```
//!
//! Vectors are `array<f32, 3>` rather than `vec3<f32>` so the storage
//! layout has no alignment padding. Adding a field means adding it here,
//! to [`SHAPE_DESCRIPTOR_STRIDE`], and to the WGSL declaration together.

use crate::scene::shape::{PhaseKind, ShapeKind};

/// One shape as the raymarch kernel reads it.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShapeDescriptor {
    /// World-space center.
    pub position: [f32; 3],
    /// Half of the bounding-volume size.
    pub half_extent: [f32; 3],
    /// Albedo RGB.
    pub color: [f32; 3],
    /// Bounding-volume minimum corner.
    pub collider_min: [f32; 3],
    /// Bounding-volume maximum corner.
    pub collider_max: [f32; 3],
    /// [`ShapeKind`] discriminant.
    pub shape_kind: u32,
    /// [`PhaseKind`] discriminant.
    pub phase_kind: u32,
    /// Absorption coefficient σa.
    pub sigma_absorption: f32,
    /// Scattering coefficient σs.
    pub sigma_scatter: f32,
    /// Edge falloff strength.
    pub feathering_strength: f32,
    /// Henyey-Greenstein asymmetry, clamped to [-0.5, 0.5].
    pub asymmetry_g: f32,
    /// Noise-driven density holes.
    pub sparsity: f32,
    /// Global opacity reduction.
    pub transparency: f32,
    /// Vertical density bias.
    pub gravity_multiplier: f32,
    /// 1 if the shape is lit by the scene light.
    pub use_light: u32,
    /// 1 if the shape is marched front-to-back.
    pub use_forward_path: u32,
}

/// Byte stride of [`ShapeDescriptor`], summed field by field.
pub const SHAPE_DESCRIPTOR_STRIDE: usize = 5 * 3 * size_of::<f32>() // vectors
    + 2 * size_of::<u32>() // kinds
    + 7 * size_of::<f32>() // scalars
    + 2 * size_of::<u32>(); // flags

const _: () = assert!(size_of::<ShapeDescriptor>() == SHAPE_DESCRIPTOR_STRIDE);

impl ShapeDescriptor {
    /// Kind of shape, if the discriminant is valid.
    #[must_use]
    pub fn kind(&self) -> Option<ShapeKind> {
        ShapeKind::from_gpu(self.shape_kind)
    }

    /// Phase function, if the discriminant is valid.
    #[must_use]
    pub fn phase(&self) -> Option<PhaseKind> {
        PhaseKind::from_gpu(self.phase_kind)
    }
}

#[cfg(test)]
mod tests {
    use std::mem::offset_of;

    use super::*;

    #[test]
    fn stride_is_104_bytes() {
        assert_eq!(SHAPE_DESCRIPTOR_STRIDE, 104);
        assert_eq!(size_of::<ShapeDescriptor>(), 104);
    }

    #[test]
    fn field_offsets_are_dense() {
        assert_eq!(offset_of!(ShapeDescriptor, half_extent), 12);
        assert_eq!(offset_of!(ShapeDescriptor, collider_max), 48);
        assert_eq!(offset_of!(ShapeDescriptor, shape_kind), 60);
        assert_eq!(offset_of!(ShapeDescriptor, sigma_absorption), 68);
        assert_eq!(offset_of!(ShapeDescriptor, asymmetry_g), 80);
        assert_eq!(offset_of!(ShapeDescriptor, gravity_multiplier), 92);
        assert_eq!(offset_of!(ShapeDescriptor, use_forward_path), 100);
    }

    #[test]
    fn zeroed_descriptor_is_an_empty_sphere() {
        let d = ShapeDescriptor::default();
        assert_eq!(d.kind(), Some(ShapeKind::Sphere));
        assert_eq!(d.sigma_absorption + d.sigma_scatter, 0.0);
        assert!(bytemuck::bytes_of(&d).iter().all(|&b| b == 0));
    }
}
