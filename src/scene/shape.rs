//! Volumetric shape sources and the slot registry that holds them.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Analytic shape the kernel evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    /// Ellipsoid filling the bounds.
    Sphere,
    /// Box filling the bounds.
    #[default]
    Cube,
}

impl ShapeKind {
    /// Discriminant written to the GPU.
    #[must_use]
    pub const fn to_gpu(self) -> u32 {
        match self {
            Self::Sphere => 0,
            Self::Cube => 1,
        }
    }

    /// Inverse of [`to_gpu`](Self::to_gpu).
    #[must_use]
    pub const fn from_gpu(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Sphere),
            1 => Some(Self::Cube),
            _ => None,
        }
    }
}

/// Scattering phase function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// Uniform scattering in all directions.
    #[default]
    Isotropic,
    /// Henyey-Greenstein lobe controlled by the asymmetry `g`.
    HenyeyGreenstein,
    /// No in-scattering; absorption only.
    None,
}

impl PhaseKind {
    /// Discriminant written to the GPU.
    #[must_use]
    pub const fn to_gpu(self) -> u32 {
        match self {
            Self::Isotropic => 0,
            Self::HenyeyGreenstein => 1,
            Self::None => 2,
        }
    }

    /// Inverse of [`to_gpu`](Self::to_gpu).
    #[must_use]
    pub const fn from_gpu(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Isotropic),
            1 => Some(Self::HenyeyGreenstein),
            2 => Some(Self::None),
            _ => None,
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Box centered on `center` extending `half_extent` along each axis.
    #[must_use]
    pub fn from_center_half_extent(center: Vec3, half_extent: Vec3) -> Self {
        let half = half_extent.abs();
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Edge lengths.
    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Midpoint.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// What the packer reads from a scene object every frame.
///
/// Only [`bounds`](Self::bounds) needs to track the current transform; it is
/// queried at pack time and never cached.
pub trait ShapeSource {
    /// Analytic shape.
    fn kind(&self) -> ShapeKind;
    /// RGBA color; alpha is not uploaded.
    fn color(&self) -> [f32; 4];
    /// Absorption coefficient σa.
    fn sigma_absorption(&self) -> f32;
    /// Scattering coefficient σs.
    fn sigma_scatter(&self) -> f32;
    /// Phase function.
    fn phase_kind(&self) -> PhaseKind;
    /// Phase asymmetry `g`.
    fn asymmetry_g(&self) -> f32;
    /// World-space position.
    fn position(&self) -> Vec3;
    /// World-space bounds of the collision volume.
    fn bounds(&self) -> Aabb;
    /// Whether the scene light affects this shape.
    fn use_light(&self) -> bool;
    /// Whether the kernel marches this shape front-to-back.
    fn use_forward_path(&self) -> bool;

    /// Noise-driven density holes.
    fn sparsity(&self) -> f32 {
        0.0
    }
    /// Opacity reduction.
    fn transparency(&self) -> f32 {
        0.0
    }
    /// Vertical density bias.
    fn gravity_multiplier(&self) -> f32 {
        0.0
    }
    /// Edge falloff strength.
    fn feathering_strength(&self) -> f32 {
        0.0
    }
}

/// Local collision volume of a [`Shape`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Collider {
    /// Sphere collider; scales with the largest axis.
    Sphere {
        /// Local radius.
        radius: f32,
    },
    /// Box collider.
    Box {
        /// Local edge lengths.
        size: Vec3,
    },
}

impl Default for Collider {
    fn default() -> Self {
        Self::Box { size: Vec3::ONE }
    }
}

/// Plain-data shape usable directly as a [`ShapeSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shape {
    /// Analytic shape.
    pub kind: ShapeKind,
    /// World-space position.
    pub position: Vec3,
    /// World-space scale applied to the collider.
    pub scale: Vec3,
    /// Collider offset from `position`, in local units.
    pub collider_offset: Vec3,
    /// Collision volume.
    pub collider: Collider,
    /// RGBA color.
    pub color: [f32; 4],
    /// Absorption coefficient σa (0–2).
    pub sigma_absorption: f32,
    /// Scattering coefficient σs.
    pub sigma_scatter: f32,
    /// Phase function.
    pub phase: PhaseKind,
    /// Phase asymmetry `g`.
    pub asymmetry_g: f32,
    /// Noise-driven density holes.
    pub sparsity: f32,
    /// Opacity reduction.
    pub transparency: f32,
    /// Vertical density bias.
    pub gravity_multiplier: f32,
    /// Edge falloff strength.
    pub feathering_strength: f32,
    /// Lit by the scene light.
    pub use_light: bool,
    /// Marched front-to-back.
    pub use_forward_path: bool,
}

impl Default for Shape {
    fn default() -> Self {
        Self {
            kind: ShapeKind::Cube,
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            collider_offset: Vec3::ZERO,
            collider: Collider::default(),
            color: [1.0, 1.0, 1.0, 1.0],
            sigma_absorption: 0.0,
            sigma_scatter: 0.0,
            phase: PhaseKind::Isotropic,
            asymmetry_g: 0.0,
            sparsity: 0.0,
            transparency: 0.0,
            gravity_multiplier: 0.0,
            feathering_strength: 0.0,
            use_light: false,
            use_forward_path: false,
        }
    }
}

impl ShapeSource for Shape {
    fn kind(&self) -> ShapeKind {
        self.kind
    }

    fn color(&self) -> [f32; 4] {
        self.color
    }

    fn sigma_absorption(&self) -> f32 {
        self.sigma_absorption
    }

    fn sigma_scatter(&self) -> f32 {
        self.sigma_scatter
    }

    fn phase_kind(&self) -> PhaseKind {
        self.phase
    }

    fn asymmetry_g(&self) -> f32 {
        self.asymmetry_g
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn bounds(&self) -> Aabb {
        let center = self.position + self.collider_offset * self.scale;
        let half_extent = match self.collider {
            Collider::Sphere { radius } => {
                Vec3::splat(radius * self.scale.abs().max_element())
            }
            Collider::Box { size } => size * self.scale * 0.5,
        };
        Aabb::from_center_half_extent(center, half_extent)
    }

    fn use_light(&self) -> bool {
        self.use_light
    }

    fn use_forward_path(&self) -> bool {
        self.use_forward_path
    }

    fn sparsity(&self) -> f32 {
        self.sparsity
    }

    fn transparency(&self) -> f32 {
        self.transparency
    }

    fn gravity_multiplier(&self) -> f32 {
        self.gravity_multiplier
    }

    fn feathering_strength(&self) -> f32 {
        self.feathering_strength
    }
}

/// View a concrete shape as a trait object.
#[must_use]
pub fn as_source<S: ShapeSource>(shape: &S) -> &dyn ShapeSource {
    shape
}

/// Index of a slot in a [`ShapeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeSlot(pub usize);

/// Ordered shape slots. Removing a shape empties its slot instead of
/// shifting later shapes, so slot indices stay stable for the host.
pub struct ShapeRegistry<S = Box<dyn ShapeSource>> {
    slots: Vec<Option<S>>,
}

impl<S> Default for ShapeRegistry<S> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<S: ShapeSource> ShapeRegistry<S> {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a shape.
    pub fn add(&mut self, shape: S) -> ShapeSlot {
        self.slots.push(Some(shape));
        ShapeSlot(self.slots.len() - 1)
    }

    /// Destroy the shape in `slot`, leaving the slot empty.
    pub fn destroy(&mut self, slot: ShapeSlot) -> Option<S> {
        self.slots.get_mut(slot.0).and_then(Option::take)
    }

    /// Mutable access to a live shape.
    pub fn get_mut(&mut self, slot: ShapeSlot) -> Option<&mut S> {
        self.slots.get_mut(slot.0).and_then(Option::as_mut)
    }

    /// Number of slots, live or empty.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the registry has no slots at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots in order; `None` for destroyed shapes.
    pub fn slots(&self) -> impl Iterator<Item = Option<&dyn ShapeSource>> + '_ {
        self.slots
            .iter()
            .map(|slot| slot.as_ref().map(as_source))
    }
}

impl ShapeSource for Box<dyn ShapeSource> {
    fn kind(&self) -> ShapeKind {
        (**self).kind()
    }

    fn color(&self) -> [f32; 4] {
        (**self).color()
    }

    fn sigma_absorption(&self) -> f32 {
        (**self).sigma_absorption()
    }

    fn sigma_scatter(&self) -> f32 {
        (**self).sigma_scatter()
    }

    fn phase_kind(&self) -> PhaseKind {
        (**self).phase_kind()
    }

    fn asymmetry_g(&self) -> f32 {
        (**self).asymmetry_g()
    }

    fn position(&self) -> Vec3 {
        (**self).position()
    }

    fn bounds(&self) -> Aabb {
        (**self).bounds()
    }

    fn use_light(&self) -> bool {
        (**self).use_light()
    }

    fn use_forward_path(&self) -> bool {
        (**self).use_forward_path()
    }

    fn sparsity(&self) -> f32 {
        (**self).sparsity()
    }

    fn transparency(&self) -> f32 {
        (**self).transparency()
    }

    fn gravity_multiplier(&self) -> f32 {
        (**self).gravity_multiplier()
    }

    fn feathering_strength(&self) -> f32 {
        (**self).feathering_strength()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_bounds_follow_transform() {
        let mut shape = Shape {
            position: Vec3::new(1.0, 2.0, 3.0),
            scale: Vec3::new(2.0, 1.0, 1.0),
            collider: Collider::Box {
                size: Vec3::new(1.0, 4.0, 2.0),
            },
            ..Shape::default()
        };
        let b = shape.bounds();
        assert_eq!(b.min, Vec3::new(0.0, 0.0, 2.0));
        assert_eq!(b.max, Vec3::new(2.0, 4.0, 4.0));

        shape.position.x += 10.0;
        assert_eq!(shape.bounds().center(), Vec3::new(11.0, 2.0, 3.0));
    }

    #[test]
    fn sphere_bounds_use_largest_scale_axis() {
        let shape = Shape {
            scale: Vec3::new(1.0, -3.0, 2.0),
            collider: Collider::Sphere { radius: 0.5 },
            ..Shape::default()
        };
        assert_eq!(shape.bounds().size(), Vec3::splat(3.0));
    }

    #[test]
    fn destroy_keeps_slot_indices_stable() {
        let mut registry: ShapeRegistry<Shape> = ShapeRegistry::new();
        let a = registry.add(Shape::default());
        let b = registry.add(Shape {
            kind: ShapeKind::Sphere,
            ..Shape::default()
        });
        assert!(registry.destroy(a).is_some());
        assert!(registry.destroy(a).is_none());

        let kinds: Vec<_> = registry.slots().map(|s| s.map(ShapeSource::kind)).collect();
        assert_eq!(kinds, vec![None, Some(ShapeKind::Sphere)]);
        assert_eq!(registry.len(), 2);
        assert!(registry.get_mut(b).is_some());
    }

    #[test]
    fn discriminants_round_trip() {
        for kind in [ShapeKind::Sphere, ShapeKind::Cube] {
            assert_eq!(ShapeKind::from_gpu(kind.to_gpu()), Some(kind));
        }
        for phase in [
            PhaseKind::Isotropic,
            PhaseKind::HenyeyGreenstein,
            PhaseKind::None,
        ] {
            assert_eq!(PhaseKind::from_gpu(phase.to_gpu()), Some(phase));
        }
        assert_eq!(ShapeKind::from_gpu(7), None);
    }

    #[test]
    fn shape_parses_from_toml() {
        let shape: Shape = toml::from_str(
            r#"
kind = "sphere"
position = [0.0, 1.0, 0.0]
sigma_absorption = 0.5
phase = "henyey_greenstein"
collider = { type = "sphere", radius = 2.0 }
"#,
        )
        .unwrap();
        assert_eq!(shape.kind, ShapeKind::Sphere);
        assert_eq!(shape.phase, PhaseKind::HenyeyGreenstein);
        assert_eq!(shape.collider, Collider::Sphere { radius: 2.0 });
        assert_eq!(shape.scale, Vec3::ONE);
    }
}
