use glam::Vec3;
use serde::{Deserialize, Serialize};

/// How a light emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    /// Parallel rays along the forward direction.
    #[default]
    Directional,
    /// Omnidirectional from a point.
    Point,
    /// Cone from a point; treated as a point light by the kernel.
    Spot,
}

/// The scene light the kernel shades with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Light {
    /// Emission model.
    pub kind: LightKind,
    /// World-space position.
    pub position: Vec3,
    /// World-space forward direction (normalized).
    pub forward: Vec3,
    /// Linear RGB color.
    pub color: [f32; 3],
    /// Intensity multiplier.
    pub intensity: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            forward: Vec3::NEG_Y,
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
        }
    }
}

impl Light {
    /// Directional light shining along `forward`.
    #[must_use]
    pub fn directional(forward: Vec3, color: [f32; 3], intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            forward: forward.normalize_or(Vec3::NEG_Y),
            color,
            intensity,
            ..Self::default()
        }
    }

    /// Point light at `position`.
    #[must_use]
    pub fn point(position: Vec3, color: [f32; 3], intensity: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            color,
            intensity,
            ..Self::default()
        }
    }

    /// Whether the kernel should treat the light as a position rather than
    /// a direction.
    #[must_use]
    pub fn is_positional(&self) -> bool {
        self.kind != LightKind::Directional
    }

    /// The vector bound as the kernel's `light`: forward direction for
    /// directional lights, world position otherwise.
    #[must_use]
    pub fn kernel_vector(&self) -> Vec3 {
        if self.is_positional() {
            self.position
        } else {
            self.forward
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_light_binds_its_direction() {
        let light = Light {
            position: Vec3::new(5.0, 5.0, 5.0),
            ..Light::directional(Vec3::new(0.0, -2.0, 0.0), [1.0; 3], 1.0)
        };
        assert!(!light.is_positional());
        assert_eq!(light.kernel_vector(), Vec3::NEG_Y);
    }

    #[test]
    fn point_and_spot_lights_bind_their_position() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        let point = Light::point(p, [1.0; 3], 2.0);
        assert!(point.is_positional());
        assert_eq!(point.kernel_vector(), p);

        let spot = Light {
            kind: LightKind::Spot,
            ..point
        };
        assert_eq!(spot.kernel_vector(), p);
    }
}
