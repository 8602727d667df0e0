use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Clip-space depth convention a projection matrix was authored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionConvention {
    /// OpenGL style, depth in [-1, 1].
    OpenGl,
    /// wgpu/Vulkan/D3D style, depth in [0, 1].
    #[default]
    ZeroToOne,
}

/// Camera state consumed by the parameter binder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Camera space → world space.
    pub world_from_camera: Mat4,
    /// Camera space → clip space, in `convention`.
    pub projection: Mat4,
    /// Depth convention of `projection`.
    pub convention: ProjectionConvention,
    /// Viewport width in pixels.
    pub pixel_width: u32,
    /// Viewport height in pixels.
    pub pixel_height: u32,
}

/// Remaps clip z from [-w, w] to [0, w].
const GL_TO_ZERO_TO_ONE: Mat4 = Mat4::from_cols(
    Vec4::X,
    Vec4::Y,
    Vec4::new(0.0, 0.0, 0.5, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 1.0),
);

impl Camera {
    /// Perspective camera at `eye` looking at `target`.
    #[must_use]
    pub fn look_at(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        lens: &Lens,
        pixel_width: u32,
        pixel_height: u32,
    ) -> Self {
        let world_to_camera = Mat4::look_at_rh(eye, target, up);
        let aspect = pixel_width.max(1) as f32 / pixel_height.max(1) as f32;
        // perspective_rh already uses [0,1] depth range (wgpu/Vulkan
        // convention)
        let projection = Mat4::perspective_rh(
            lens.fovy.to_radians(),
            aspect,
            lens.znear,
            lens.zfar,
        );
        Self {
            world_from_camera: world_to_camera.inverse(),
            projection,
            convention: ProjectionConvention::ZeroToOne,
            pixel_width,
            pixel_height,
        }
    }

    /// World space → camera space.
    #[must_use]
    pub fn world_to_camera(&self) -> Mat4 {
        self.world_from_camera.inverse()
    }

    /// Projection in the zero-to-one depth convention the GPU expects.
    #[must_use]
    pub fn gpu_projection(&self) -> Mat4 {
        match self.convention {
            ProjectionConvention::OpenGl => GL_TO_ZERO_TO_ONE * self.projection,
            ProjectionConvention::ZeroToOne => self.projection,
        }
    }

    /// `inverse(gpu_projection × world_to_camera)`: clip space → world.
    #[must_use]
    pub fn inverse_view_projection(&self) -> Mat4 {
        (self.gpu_projection() * self.world_to_camera()).inverse()
    }

    /// Viewport size in pixels.
    #[must_use]
    pub fn viewport(&self) -> (u32, u32) {
        (self.pixel_width, self.pixel_height)
    }
}

/// Perspective lens parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lens {
    /// Vertical field of view in degrees.
    pub fovy: f32,
    /// Near clipping plane distance.
    pub znear: f32,
    /// Far clipping plane distance.
    pub zfar: f32,
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            fovy: 60.0,
            znear: 0.1,
            zfar: 1000.0,
        }
    }
}

/// The cameras a frame may render with.
///
/// `current` is the camera rendering right now (e.g. an editor view);
/// `main` is the designated scene camera used when nothing else renders.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraSlots {
    /// Camera currently rendering.
    pub current: Option<Camera>,
    /// Designated main camera.
    pub main: Option<Camera>,
}

impl CameraSlots {
    /// Only a main camera.
    #[must_use]
    pub fn main(camera: Camera) -> Self {
        Self {
            current: None,
            main: Some(camera),
        }
    }

    /// The current camera, else the main camera.
    #[must_use]
    pub fn resolve(&self) -> Option<&Camera> {
        self.current.as_ref().or(self.main.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::look_at(
            Vec3::new(0.0, 2.0, 8.0),
            Vec3::ZERO,
            Vec3::Y,
            &Lens::default(),
            1920,
            1080,
        )
    }

    #[test]
    fn gl_projection_is_remapped_to_zero_to_one() {
        let lens = Lens::default();
        let aspect = 16.0 / 9.0;
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
        let expected = Mat4::perspective_rh(
            lens.fovy.to_radians(),
            aspect,
            lens.znear,
            lens.zfar,
        );
        assert!(gl.gpu_projection().abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn inverse_view_projection_unprojects_the_near_plane_center() {
        let cam = camera();
        let near_center = cam.inverse_view_projection().project_point3(Vec3::ZERO);
        let eye = cam.world_from_camera.transform_point3(Vec3::ZERO);
        let forward = (Vec3::ZERO - eye).normalize();
        let expected = eye + forward * Lens::default().znear;
        assert!(near_center.abs_diff_eq(expected, 1e-3));
    }

    #[test]
    fn resolve_prefers_current_camera() {
        let main = camera();
        let current = Camera {
            pixel_width: 640,
            pixel_height: 480,
            ..main
        };
        let slots = CameraSlots {
            current: Some(current),
            main: Some(main),
        };
        assert_eq!(slots.resolve().map(Camera::viewport), Some((640, 480)));
        assert_eq!(
            CameraSlots::main(main).resolve().map(Camera::viewport),
            Some((1920, 1080))
        );
        assert!(CameraSlots::default().resolve().is_none());
    }
}
