use glam::UVec3;

use super::shape::Aabb;

/// Dense density grid sampled by the kernel inside `bounds`.
///
/// Densities are stored x-fastest: index = x + y·w + z·w·h.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelVolume {
    resolution: UVec3,
    bounds: Aabb,
    density: Vec<f32>,
}

impl VoxelVolume {
    /// Grid from raw densities. Returns `None` if `density.len()` does not
    /// match the resolution.
    #[must_use]
    pub fn new(resolution: UVec3, bounds: Aabb, density: Vec<f32>) -> Option<Self> {
        (density.len() == voxel_count(resolution)?).then_some(Self {
            resolution,
            bounds,
            density,
        })
    }

    /// Grid filled by evaluating `f` at every voxel coordinate. Returns
    /// `None` if the voxel count overflows `usize`.
    pub fn from_fn(
        resolution: UVec3,
        bounds: Aabb,
        mut f: impl FnMut(UVec3) -> f32,
    ) -> Option<Self> {
        let mut density = Vec::with_capacity(voxel_count(resolution)?);
        for z in 0..resolution.z {
            for y in 0..resolution.y {
                for x in 0..resolution.x {
                    density.push(f(UVec3::new(x, y, z)));
                }
            }
        }
        Some(Self {
            resolution,
            bounds,
            density,
        })
    }

    /// Voxel counts per axis.
    #[must_use]
    pub fn resolution(&self) -> UVec3 {
        self.resolution
    }

    /// World-space extent of the grid.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Raw densities.
    #[must_use]
    pub fn density(&self) -> &[f32] {
        &self.density
    }
}

fn voxel_count(resolution: UVec3) -> Option<usize> {
    (resolution.x as usize)
        .checked_mul(resolution.y as usize)?
        .checked_mul(resolution.z as usize)
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn unit_bounds() -> Aabb {
        Aabb {
            min: Vec3::ZERO,
            max: Vec3::ONE,
        }
    }

    #[test]
    fn rejects_mismatched_density_length() {
        assert!(VoxelVolume::new(UVec3::new(2, 2, 2), unit_bounds(), vec![0.0; 7]).is_none());
        assert!(VoxelVolume::new(UVec3::new(2, 2, 2), unit_bounds(), vec![0.0; 8]).is_some());
    }

    #[test]
    fn from_fn_is_x_fastest() {
        let v = VoxelVolume::from_fn(UVec3::new(3, 2, 2), unit_bounds(), |c| {
            (c.x + 10 * c.y + 100 * c.z) as f32
        })
        .unwrap();
        assert_eq!(v.density().len(), 12);
        assert_eq!(v.density()[1], 1.0);
        assert_eq!(v.density()[3], 10.0);
        assert_eq!(v.density()[6], 100.0);
    }

    #[test]
    fn oversized_grid_is_rejected_before_allocating() {
        let mut calls = 0;
        let huge = UVec3::splat(u32::MAX);
        assert!(VoxelVolume::from_fn(huge, unit_bounds(), |_| {
            calls += 1;
            0.0
        })
        .is_none());
        assert_eq!(calls, 0);
        assert!(VoxelVolume::new(huge, unit_bounds(), Vec::new()).is_none());
    }
}
