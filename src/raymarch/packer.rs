//! Snapshot of the shape slots into the kernel's descriptor array.

use super::descriptor::{ShapeDescriptor, SHAPE_DESCRIPTOR_STRIDE};
use crate::options::NullShapePolicy;
use crate::scene::shape::ShapeSource;

/// Phase asymmetry range the kernel's Henyey-Greenstein lobe is tuned for.
pub const ASYMMETRY_RANGE: (f32, f32) = (-0.5, 0.5);

/// Descriptor array for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedShapes {
    descriptors: Vec<ShapeDescriptor>,
    skipped: usize,
}

impl PackedShapes {
    /// Number of descriptors the kernel iterates over.
    #[must_use]
    pub fn count(&self) -> usize {
        self.descriptors.len()
    }

    /// Number of empty slots encountered while packing.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Packed descriptors.
    #[must_use]
    pub fn descriptors(&self) -> &[ShapeDescriptor] {
        &self.descriptors
    }

    /// Exactly `count × stride` bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.descriptors)
    }

    /// Bytes to upload. A storage binding cannot be empty, so an empty set
    /// uploads a single zeroed descriptor; the kernel still sees a count of
    /// zero.
    #[must_use]
    pub fn upload_bytes(&self) -> Vec<u8> {
        if self.descriptors.is_empty() {
            vec![0; SHAPE_DESCRIPTOR_STRIDE]
        } else {
            self.as_bytes().to_vec()
        }
    }
}

/// Converts shape slots into [`PackedShapes`] under one fixed
/// [`NullShapePolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorPacker {
    policy: NullShapePolicy,
}

impl DescriptorPacker {
    /// Packer using `policy` for empty slots.
    #[must_use]
    pub fn new(policy: NullShapePolicy) -> Self {
        Self { policy }
    }

    /// Empty-slot policy of this packer.
    #[must_use]
    pub fn policy(&self) -> NullShapePolicy {
        self.policy
    }

    /// Pack `slots` in order. Bounds are read from each source now.
    pub fn pack<'a, I>(&self, slots: I) -> PackedShapes
    where
        I: IntoIterator<Item = Option<&'a dyn ShapeSource>>,
    {
        let slots = slots.into_iter();
        let mut packed = PackedShapes {
            descriptors: Vec::with_capacity(slots.size_hint().0),
            skipped: 0,
        };
        for (index, slot) in slots.enumerate() {
            let Some(shape) = slot else {
                log::warn!("Shape at index {index} is missing, skipping");
                packed.skipped += 1;
                if self.policy == NullShapePolicy::ZeroFill {
                    packed.descriptors.push(ShapeDescriptor::default());
                }
                continue;
            };
            packed.descriptors.push(describe(shape));
        }
        packed
    }
}

/// Descriptor for one live shape.
#[must_use]
pub fn describe(shape: &dyn ShapeSource) -> ShapeDescriptor {
    let bounds = shape.bounds();
    let [r, g, b, _] = shape.color();
    ShapeDescriptor {
        position: shape.position().to_array(),
        half_extent: (bounds.size() * 0.5).to_array(),
        color: [r, g, b],
        collider_min: bounds.min.to_array(),
        collider_max: bounds.max.to_array(),
        shape_kind: shape.kind().to_gpu(),
        phase_kind: shape.phase_kind().to_gpu(),
        sigma_absorption: shape.sigma_absorption(),
        sigma_scatter: shape.sigma_scatter(),
        feathering_strength: shape.feathering_strength(),
        asymmetry_g: shape
            .asymmetry_g()
            .clamp(ASYMMETRY_RANGE.0, ASYMMETRY_RANGE.1),
        sparsity: shape.sparsity(),
        transparency: shape.transparency(),
        gravity_multiplier: shape.gravity_multiplier(),
        use_light: u32::from(shape.use_light()),
        use_forward_path: u32::from(shape.use_forward_path()),
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::scene::shape::{as_source, Collider, PhaseKind, Shape, ShapeKind};

    fn cube(sigma_a: f32) -> Shape {
        Shape {
            kind: ShapeKind::Cube,
            sigma_absorption: sigma_a,
            ..Shape::default()
        }
    }

    fn slots(shapes: &[Option<Shape>]) -> Vec<Option<&dyn ShapeSource>> {
        shapes
            .iter()
            .map(|s| s.as_ref().map(as_source))
            .collect()
    }

    #[test]
    fn counts_match_for_zero_one_and_many() {
        let packer = DescriptorPacker::default();
        for n in [0usize, 1, 17] {
            let shapes: Vec<_> = (0..n).map(|i| Some(cube(i as f32))).collect();
            let packed = packer.pack(slots(&shapes));
            assert_eq!(packed.count(), n);
            assert_eq!(packed.as_bytes().len(), n * SHAPE_DESCRIPTOR_STRIDE);
            assert_eq!(packed.skipped(), 0);
        }
    }

    #[test]
    fn empty_set_still_uploads_one_descriptor() {
        let packed = DescriptorPacker::default().pack(Vec::<Option<&dyn ShapeSource>>::new());
        assert_eq!(packed.count(), 0);
        assert!(packed.as_bytes().is_empty());
        assert_eq!(packed.upload_bytes(), vec![0; SHAPE_DESCRIPTOR_STRIDE]);
    }

    #[test]
    fn zero_fill_keeps_index_alignment() {
        let shapes = [Some(cube(0.1)), None, Some(cube(0.3))];
        let packed =
            DescriptorPacker::new(NullShapePolicy::ZeroFill).pack(slots(&shapes));
        assert_eq!(packed.count(), 3);
        assert_eq!(packed.skipped(), 1);
        assert_eq!(packed.descriptors()[1], ShapeDescriptor::default());
        assert_eq!(packed.descriptors()[2].sigma_absorption, 0.3);
    }

    #[test]
    fn compact_shrinks_the_count() {
        let shapes = [None, Some(cube(0.1)), None, Some(cube(0.3))];
        let packed =
            DescriptorPacker::new(NullShapePolicy::Compact).pack(slots(&shapes));
        assert_eq!(packed.count(), 2);
        assert_eq!(packed.skipped(), 2);
        assert_eq!(packed.descriptors()[1].sigma_absorption, 0.3);
    }

    #[test]
    fn lit_cube_descriptor() {
        let shape = Shape {
            kind: ShapeKind::Cube,
            position: Vec3::new(0.0, 1.0, 0.0),
            collider: Collider::Box {
                size: Vec3::new(2.0, 2.0, 4.0),
            },
            color: [0.2, 0.4, 0.6, 0.5],
            sigma_absorption: 0.5,
            sigma_scatter: 0.3,
            phase: PhaseKind::HenyeyGreenstein,
            asymmetry_g: 0.9,
            use_light: true,
            ..Shape::default()
        };
        let d = describe(&shape);
        assert_eq!(d.kind(), Some(ShapeKind::Cube));
        assert_eq!(d.phase(), Some(PhaseKind::HenyeyGreenstein));
        assert_eq!(d.sigma_absorption, 0.5);
        assert_eq!(d.sigma_scatter, 0.3);
        assert_eq!(d.use_light, 1);
        assert_eq!(d.use_forward_path, 0);
        assert_eq!(d.color, [0.2, 0.4, 0.6]);
        assert_eq!(d.half_extent, [1.0, 1.0, 2.0]);
        assert_eq!(d.collider_min, [-1.0, 0.0, -2.0]);
        assert_eq!(d.collider_max, [1.0, 2.0, 2.0]);
        assert_eq!(d.asymmetry_g, 0.5);
    }

    #[test]
    fn bounds_are_read_at_pack_time() {
        let mut shapes = [Some(cube(0.1))];
        let packer = DescriptorPacker::default();
        let before = packer.pack(slots(&shapes)).descriptors()[0];
        if let Some(shape) = shapes[0].as_mut() {
            shape.position = Vec3::new(3.0, 0.0, 0.0);
        }
        let after = packer.pack(slots(&shapes)).descriptors()[0];
        assert_eq!(before.collider_min[0], -0.5);
        assert_eq!(after.collider_min[0], 2.5);
        assert_eq!(after.position, [3.0, 0.0, 0.0]);
    }
}
