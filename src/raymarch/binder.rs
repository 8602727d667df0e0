//! Per-frame binding of camera, light, tuning, and voxel parameters.

use glam::{UVec3, Vec3};

use super::uniforms::{Uniform, UniformTable, UniformValue};
use crate::error::VolmarchError;
use crate::options::RaymarchOptions;
use crate::scene::camera::Camera;
use crate::scene::light::Light;
use crate::scene::volume::VoxelVolume;

/// Everything bound to the kernel for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameParameters<'a> {
    /// Camera the frame renders with.
    pub camera: &'a Camera,
    /// Scene light, if any.
    pub light: Option<&'a Light>,
    /// Volumetric tuning scalars.
    pub tuning: &'a RaymarchOptions,
    /// Voxel density grid, if any.
    pub volume: Option<&'a VoxelVolume>,
    /// Descriptor count the kernel iterates over.
    pub shape_count: u32,
    /// Host time in seconds.
    pub time: f32,
    /// Whether the kernel writes the quarter-resolution targets.
    pub quarter_resolution: bool,
}

/// Writes every kernel uniform, every frame.
///
/// Nothing is carried between frames: binding the same inputs twice yields
/// the same bytes.
#[derive(Debug, Default)]
pub struct ParameterBinder {
    table: UniformTable,
}

impl ParameterBinder {
    /// Binder with an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table written by the last [`bind`](Self::bind).
    #[must_use]
    pub fn table(&self) -> &UniformTable {
        &self.table
    }

    /// Bind `params` and return the packed `KernelParams` block.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::UnboundUniform`] if any uniform was left
    /// unwritten, or [`VolmarchError::UniformType`] on a kind mismatch.
    pub fn bind(
        &mut self,
        params: &FrameParameters<'_>,
    ) -> Result<Vec<u8>, VolmarchError> {
        let table = &mut self.table;
        table.begin_frame();

        let camera = params.camera;
        let projection = camera.gpu_projection();
        table.set(
            Uniform::CameraToWorld,
            UniformValue::Mat4(camera.world_from_camera),
        )?;
        table.set(
            Uniform::CameraInverseProjection,
            UniformValue::Mat4(projection.inverse()),
        )?;
        table.set(
            Uniform::InverseViewProjection,
            UniformValue::Mat4(camera.inverse_view_projection()),
        )?;

        bind_light(table, params.light)?;

        let (bounds_min, bounds_max, resolution) = match params.volume {
            Some(volume) => {
                let bounds = volume.bounds();
                (bounds.min, bounds.max, volume.resolution())
            }
            None => (Vec3::ZERO, Vec3::ZERO, UVec3::ZERO),
        };
        table.set(Uniform::VoxelBoundsMin, UniformValue::Vec3(bounds_min))?;
        table.set(Uniform::VoxelBoundsMax, UniformValue::Vec3(bounds_max))?;
        table.set(Uniform::VoxelResolution, UniformValue::UVec3(resolution))?;
        table.set(Uniform::NumShapes, UniformValue::U32(params.shape_count))?;

        let t = params.tuning;
        for (uniform, value) in [
            (Uniform::GlobalDensity, t.global_density),
            (Uniform::StepSize, t.step_size),
            (Uniform::DensityFalloff, t.density_falloff),
            (Uniform::AlphaThreshold, t.alpha_threshold),
            (Uniform::ScatteringCoefficient, t.scattering_coefficient),
            (Uniform::SigmaAbsorption, t.sigma_absorption),
            (Uniform::SigmaScatter, t.sigma_scatter),
            (Uniform::PhaseG, t.phase_g),
            (Uniform::Sharpness, t.sharpness),
            (Uniform::Time, params.time),
        ] {
            table.set(uniform, UniformValue::F32(value))?;
        }
        table.set(Uniform::StepCount, UniformValue::U32(t.step_count))?;
        table.set(
            Uniform::QuarterResolution,
            UniformValue::Bool(params.quarter_resolution),
        )?;

        if let Some(&missing) = table.missing().first() {
            return Err(VolmarchError::UnboundUniform(missing.name()));
        }
        table.pack()
    }
}

fn bind_light(
    table: &mut UniformTable,
    light: Option<&Light>,
) -> Result<(), VolmarchError> {
    let (vector, color, intensity, positional) = match light {
        Some(light) => (
            light.kernel_vector(),
            Vec3::from_array(light.color),
            light.intensity,
            light.is_positional(),
        ),
        None => (Vec3::ZERO, Vec3::ZERO, 0.0, false),
    };
    table.set(Uniform::Light, UniformValue::Vec3(vector))?;
    table.set(Uniform::LightColor, UniformValue::Vec3(color))?;
    table.set(Uniform::LightIntensity, UniformValue::F32(intensity))?;
    table.set(Uniform::PositionLight, UniformValue::Bool(positional))
}

/// Voxel storage buffer contents. A missing grid uploads a single zero so
/// the binding is never empty.
#[must_use]
pub fn voxel_upload_bytes(volume: Option<&VoxelVolume>) -> Vec<u8> {
    match volume {
        Some(volume) if !volume.density().is_empty() => {
            bytemuck::cast_slice(volume.density()).to_vec()
        }
        _ => vec![0; size_of::<f32>()],
    }
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;
    use crate::scene::camera::{Lens, ProjectionConvention};
    use crate::scene::shape::Aabb;

    fn camera() -> Camera {
        Camera::look_at(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
            Vec3::Y,
            &Lens::default(),
            640,
            480,
        )
    }

    fn params<'a>(
        camera: &'a Camera,
        light: Option<&'a Light>,
        tuning: &'a RaymarchOptions,
    ) -> FrameParameters<'a> {
        FrameParameters {
            camera,
            light,
            tuning,
            volume: None,
            shape_count: 1,
            time: 0.25,
            quarter_resolution: true,
        }
    }

    #[test]
    fn binds_every_uniform() {
        let cam = camera();
        let tuning = RaymarchOptions::default();
        let mut binder = ParameterBinder::new();
        let bytes = binder.bind(&params(&cam, None, &tuning)).unwrap();
        assert!(binder.table().missing().is_empty());
        assert_eq!(bytes.len(), binder.table().layout().size());
    }

    #[test]
    fn binding_is_idempotent() {
        let cam = camera();
        let light = Light::point(Vec3::new(1.0, 2.0, 3.0), [1.0; 3], 1.0);
        let tuning = RaymarchOptions::default();
        let mut binder = ParameterBinder::new();
        let first = binder.bind(&params(&cam, Some(&light), &tuning)).unwrap();
        let second = binder.bind(&params(&cam, Some(&light), &tuning)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn directional_light_binds_forward_and_clears_flag() {
        let cam = camera();
        let light = Light::directional(Vec3::new(0.0, -1.0, 0.0), [1.0; 3], 1.0);
        let tuning = RaymarchOptions::default();
        let mut binder = ParameterBinder::new();
        let _ = binder.bind(&params(&cam, Some(&light), &tuning)).unwrap();
        let table = binder.table();
        assert_eq!(
            table.get(Uniform::Light),
            Some(UniformValue::Vec3(Vec3::new(0.0, -1.0, 0.0)))
        );
        assert_eq!(
            table.get(Uniform::PositionLight),
            Some(UniformValue::Bool(false))
        );
    }

    #[test]
    fn point_light_binds_position_and_sets_flag() {
        let cam = camera();
        let light = Light::point(Vec3::new(4.0, 5.0, 6.0), [1.0; 3], 1.0);
        let tuning = RaymarchOptions::default();
        let mut binder = ParameterBinder::new();
        let _ = binder.bind(&params(&cam, Some(&light), &tuning)).unwrap();
        let table = binder.table();
        assert_eq!(
            table.get(Uniform::Light),
            Some(UniformValue::Vec3(Vec3::new(4.0, 5.0, 6.0)))
        );
        assert_eq!(
            table.get(Uniform::PositionLight),
            Some(UniformValue::Bool(true))
        );
    }

    #[test]
    fn absent_light_binds_zero_intensity() {
        let cam = camera();
        let tuning = RaymarchOptions::default();
        let mut binder = ParameterBinder::new();
        let _ = binder.bind(&params(&cam, None, &tuning)).unwrap();
        assert_eq!(
            binder.table().get(Uniform::LightIntensity),
            Some(UniformValue::F32(0.0))
        );
    }

    #[test]
    fn opengl_projection_is_remapped_before_inversion() {
        let lens = Lens::default();
        let aspect = 640.0 / 480.0;
        let gl = Camera {
            projection: Mat4::perspective_rh_gl(
                lens.fovy.to_radians(),
                aspect,
                lens.znear,
                lens.zfar,
            ),
            convention: ProjectionConvention::OpenGl,
            ..camera()
        };
        let tuning = RaymarchOptions::default();
        let mut binder = ParameterBinder::new();
        let _ = binder.bind(&params(&gl, None, &tuning)).unwrap();
        let Some(UniformValue::Mat4(ivp)) =
            binder.table().get(Uniform::InverseViewProjection)
        else {
            panic!("inverse_view_projection not bound");
        };
        let expected = camera().inverse_view_projection();
        assert!(ivp.abs_diff_eq(expected, 1e-3));
    }

    #[test]
    fn tuning_scalars_are_bound_individually() {
        let cam = camera();
        let tuning = RaymarchOptions {
            step_count: 200,
            phase_g: -0.25,
            sharpness: 4.0,
            ..RaymarchOptions::default()
        };
        let mut binder = ParameterBinder::new();
        let _ = binder.bind(&params(&cam, None, &tuning)).unwrap();
        let table = binder.table();
        assert_eq!(table.get(Uniform::StepCount), Some(UniformValue::U32(200)));
        assert_eq!(table.get(Uniform::PhaseG), Some(UniformValue::F32(-0.25)));
        assert_eq!(table.get(Uniform::Sharpness), Some(UniformValue::F32(4.0)));
        assert_eq!(table.get(Uniform::Time), Some(UniformValue::F32(0.25)));
    }

    #[test]
    fn voxel_volume_binds_bounds_and_resolution() {
        let cam = camera();
        let tuning = RaymarchOptions::default();
        let volume = VoxelVolume::from_fn(
            UVec3::new(2, 3, 4),
            Aabb {
                min: Vec3::splat(-1.0),
                max: Vec3::splat(1.0),
            },
            |_| 0.5,
        )
        .unwrap();
        let mut binder = ParameterBinder::new();
        let frame = FrameParameters {
            volume: Some(&volume),
            ..params(&cam, None, &tuning)
        };
        let _ = binder.bind(&frame).unwrap();
        let table = binder.table();
        assert_eq!(
            table.get(Uniform::VoxelResolution),
            Some(UniformValue::UVec3(UVec3::new(2, 3, 4)))
        );
        assert_eq!(
            table.get(Uniform::VoxelBoundsMin),
            Some(UniformValue::Vec3(Vec3::splat(-1.0)))
        );
        assert_eq!(voxel_upload_bytes(Some(&volume)).len(), 24 * 4);
        assert_eq!(voxel_upload_bytes(None), vec![0; 4]);
    }
}
