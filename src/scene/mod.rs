//! External scene state consumed once per frame.
//!
//! The host owns cameras, the light, shapes, and the optional voxel grid;
//! the pipeline only reads them through a [`SceneSnapshot`].

/// Camera matrices, projection conventions, and camera resolution.
pub mod camera;
/// Scene light.
pub mod light;
/// Shape sources and the slot registry.
pub mod shape;
/// Dense voxel density grids.
pub mod volume;

use std::path::Path;

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::VolmarchError;
use camera::{Camera, CameraSlots, Lens};
use light::Light;
use shape::{Aabb, Shape, ShapeRegistry, ShapeSource};
use volume::VoxelVolume;

/// Read-only view of the scene for one frame.
pub struct SceneSnapshot<'a> {
    /// Cameras available this frame.
    pub cameras: CameraSlots,
    /// Scene light, if any.
    pub light: Option<&'a Light>,
    /// Shape slots in registry order; `None` for destroyed shapes.
    pub shapes: Vec<Option<&'a dyn ShapeSource>>,
    /// Voxel density grid, if any.
    pub volume: Option<&'a VoxelVolume>,
    /// Seconds since the host started rendering.
    pub time: f32,
}

impl<'a> SceneSnapshot<'a> {
    /// Snapshot of `registry` seen through `cameras`.
    pub fn new<S: ShapeSource>(
        cameras: CameraSlots,
        light: Option<&'a Light>,
        registry: &'a ShapeRegistry<S>,
    ) -> Self {
        Self {
            cameras,
            light,
            shapes: registry.slots().collect(),
            volume: None,
            time: 0.0,
        }
    }

    /// Attach a voxel grid.
    #[must_use]
    pub fn with_volume(mut self, volume: &'a VoxelVolume) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Set the elapsed time.
    #[must_use]
    pub fn at_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }
}

/// Camera placement in a scene file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDescription {
    /// Eye position.
    pub eye: Vec3,
    /// Look-at target.
    pub target: Vec3,
    /// Up vector.
    pub up: Vec3,
    /// Lens parameters.
    #[serde(flatten)]
    pub lens: Lens,
}

impl Default for CameraDescription {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 1.0, 6.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            lens: Lens::default(),
        }
    }
}

impl CameraDescription {
    /// Camera rendering a `width` × `height` viewport.
    #[must_use]
    pub fn to_camera(&self, width: u32, height: u32) -> Camera {
        Camera::look_at(self.eye, self.target, self.up, &self.lens, width, height)
    }
}

/// Voxel grid in a scene file.
///
/// `density` lists voxels x-fastest; when empty every voxel holds `fill`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeDescription {
    /// Voxel counts per axis.
    pub resolution: UVec3,
    /// World-space extent.
    pub bounds: Aabb,
    /// Density of every voxel when `density` is empty.
    #[serde(default)]
    pub fill: f32,
    /// Explicit densities.
    #[serde(default)]
    pub density: Vec<f32>,
}

impl VolumeDescription {
    /// Build the grid.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::SceneParse`] if `density` does not hold one
    /// value per voxel or the grid is too large.
    pub fn to_volume(&self) -> Result<VoxelVolume, VolmarchError> {
        let volume = if self.density.is_empty() {
            VoxelVolume::from_fn(self.resolution, self.bounds, |_| self.fill)
        } else {
            VoxelVolume::new(self.resolution, self.bounds, self.density.clone())
        };
        volume.ok_or_else(|| {
            VolmarchError::SceneParse(format!(
                "volume: {} densities for a {} grid",
                self.density.len(),
                self.resolution
            ))
        })
    }
}

/// A complete scene loadable from TOML.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescription {
    /// Main camera.
    pub camera: CameraDescription,
    /// Scene light.
    pub light: Option<Light>,
    /// Shapes in slot order.
    #[serde(rename = "shape")]
    pub shapes: Vec<Shape>,
    /// Optional voxel density grid.
    pub volume: Option<VolumeDescription>,
}

impl SceneDescription {
    /// Load a scene from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::Io`] if the file cannot be read or
    /// [`VolmarchError::SceneParse`] if it is not a valid scene.
    pub fn load(path: &Path) -> Result<Self, VolmarchError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a scene from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::SceneParse`] if the text is not a valid scene.
    pub fn parse(content: &str) -> Result<Self, VolmarchError> {
        toml::from_str(content).map_err(|e| VolmarchError::SceneParse(e.to_string()))
    }

    /// Registry holding a copy of every shape.
    #[must_use]
    pub fn registry(&self) -> ShapeRegistry<Shape> {
        let mut registry = ShapeRegistry::new();
        for shape in &self.shapes {
            let _ = registry.add(shape.clone());
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::light::LightKind;
    use crate::scene::shape::ShapeKind;

    const SCENE: &str = r#"
[camera]
eye = [0.0, 0.0, 10.0]
fovy = 45.0

[light]
kind = "directional"
forward = [0.0, -1.0, 0.0]
intensity = 2.0

[[shape]]
kind = "cube"
sigma_absorption = 0.5
sigma_scatter = 0.3
use_light = true

[[shape]]
kind = "sphere"
position = [2.0, 0.0, 0.0]
"#;

    #[test]
    fn parses_scene_file() {
        let scene = SceneDescription::parse(SCENE).unwrap();
        assert_eq!(scene.camera.lens.fovy, 45.0);
        assert_eq!(scene.camera.lens.znear, Lens::default().znear);
        assert_eq!(scene.light.map(|l| l.kind), Some(LightKind::Directional));
        assert_eq!(scene.shapes.len(), 2);
        assert_eq!(scene.shapes[1].kind, ShapeKind::Sphere);
        assert!(scene.shapes[0].use_light);
    }

    #[test]
    fn malformed_scene_is_a_parse_error() {
        assert!(matches!(
            SceneDescription::parse("[[shape]]\nkind = 3"),
            Err(VolmarchError::SceneParse(_))
        ));
    }

    #[test]
    fn snapshot_preserves_empty_slots() {
        let scene = SceneDescription::parse(SCENE).unwrap();
        let mut registry = scene.registry();
        let _ = registry.destroy(shape::ShapeSlot(0));
        let cam = scene.camera.to_camera(64, 64);
        let snapshot = SceneSnapshot::new(CameraSlots::main(cam), scene.light.as_ref(), &registry)
            .at_time(1.5);
        assert_eq!(snapshot.shapes.len(), 2);
        assert!(snapshot.shapes[0].is_none());
        assert_eq!(snapshot.time, 1.5);
    }

    #[test]
    fn bundled_scene_parses() {
        let scene =
            SceneDescription::parse(include_str!("../../assets/scenes/smoke.toml")).unwrap();
        assert_eq!(scene.shapes.len(), 2);
        assert!(scene.light.is_some_and(|l| l.is_positional()));
        assert_eq!(
            scene.shapes[1].collider,
            shape::Collider::Sphere { radius: 0.9 }
        );
        let volume = scene.volume.unwrap().to_volume().unwrap();
        assert_eq!(volume.resolution(), UVec3::new(8, 4, 8));
        assert!(volume.density().iter().all(|d| *d == 0.2));
    }

    #[test]
    fn volume_density_must_match_resolution() {
        let scene = SceneDescription::parse(
            r#"
[volume]
resolution = [2, 1, 1]
bounds = { min = [0.0, 0.0, 0.0], max = [1.0, 1.0, 1.0] }
density = [0.5]
"#,
        )
        .unwrap();
        assert!(matches!(
            scene.volume.unwrap().to_volume(),
            Err(VolmarchError::SceneParse(_))
        ));
    }
}
