//! Named kernel uniforms and their `KernelParams` uniform-block layout.
//!
//! Each [`Uniform`] is an independent named value. The table packs them, in
//! declaration order, following WGSL uniform address-space alignment:
//! scalars align to 4, `vec3`/`vec4` to 16, `mat4x4` to 16, and the block
//! size rounds up to 16. The kernel's `KernelParams` struct declares the
//! same members in the same order.

use glam::{Mat4, UVec3, Vec3};

use crate::error::VolmarchError;

/// Storage class of one uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    /// `f32`
    F32,
    /// `u32`
    U32,
    /// `u32` holding 0 or 1 (WGSL has no `bool` in uniform blocks).
    Bool,
    /// `vec3<f32>`
    Vec3,
    /// `vec3<u32>`
    UVec3,
    /// `mat4x4<f32>`
    Mat4,
}

impl UniformKind {
    /// Alignment in the uniform address space.
    #[must_use]
    pub const fn align(self) -> usize {
        match self {
            Self::F32 | Self::U32 | Self::Bool => 4,
            Self::Vec3 | Self::UVec3 | Self::Mat4 => 16,
        }
    }

    /// Size in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::F32 | Self::U32 | Self::Bool => 4,
            Self::Vec3 | Self::UVec3 => 12,
            Self::Mat4 => 64,
        }
    }

    /// WGSL spelling.
    #[must_use]
    pub const fn wgsl(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::U32 | Self::Bool => "u32",
            Self::Vec3 => "vec3<f32>",
            Self::UVec3 => "vec3<u32>",
            Self::Mat4 => "mat4x4<f32>",
        }
    }
}

/// A value written to one uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// `f32`
    F32(f32),
    /// `u32`
    U32(u32),
    /// Boolean flag, stored as `u32`.
    Bool(bool),
    /// `vec3<f32>`
    Vec3(Vec3),
    /// `vec3<u32>`
    UVec3(UVec3),
    /// `mat4x4<f32>`, column-major.
    Mat4(Mat4),
}

impl UniformValue {
    /// Kind of this value.
    #[must_use]
    pub const fn kind(&self) -> UniformKind {
        match self {
            Self::F32(_) => UniformKind::F32,
            Self::U32(_) => UniformKind::U32,
            Self::Bool(_) => UniformKind::Bool,
            Self::Vec3(_) => UniformKind::Vec3,
            Self::UVec3(_) => UniformKind::UVec3,
            Self::Mat4(_) => UniformKind::Mat4,
        }
    }

    fn write(&self, out: &mut [u8]) {
        match *self {
            Self::F32(v) => out.copy_from_slice(bytemuck::bytes_of(&v)),
            Self::U32(v) => out.copy_from_slice(bytemuck::bytes_of(&v)),
            Self::Bool(v) => {
                out.copy_from_slice(bytemuck::bytes_of(&u32::from(v)));
            }
            Self::Vec3(v) => {
                out.copy_from_slice(bytemuck::cast_slice(&v.to_array()));
            }
            Self::UVec3(v) => {
                out.copy_from_slice(bytemuck::cast_slice(&v.to_array()));
            }
            Self::Mat4(m) => {
                out.copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()));
            }
        }
    }
}

macro_rules! uniforms {
    ($($variant:ident => $name:literal : $kind:ident,)+) => {
        /// Every uniform the raymarch kernel reads, in block order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Uniform {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )+
        }

        impl Uniform {
            /// All uniforms in block order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Kernel-side member name.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            /// Declared kind.
            #[must_use]
            pub const fn kind(self) -> UniformKind {
                match self {
                    $(Self::$variant => UniformKind::$kind,)+
                }
            }
        }
    };
}

uniforms! {
    CameraToWorld => "camera_to_world": Mat4,
    CameraInverseProjection => "camera_inverse_projection": Mat4,
    InverseViewProjection => "inverse_view_projection": Mat4,
    Light => "light": Vec3,
    LightIntensity => "light_intensity": F32,
    LightColor => "light_color": Vec3,
    PositionLight => "position_light": Bool,
    VoxelBoundsMin => "voxel_bounds_min": Vec3,
    NumShapes => "num_shapes": U32,
    VoxelBoundsMax => "voxel_bounds_max": Vec3,
    GlobalDensity => "global_density": F32,
    VoxelResolution => "voxel_resolution": UVec3,
    StepCount => "step_count": U32,
    StepSize => "step_size": F32,
    DensityFalloff => "density_falloff": F32,
    AlphaThreshold => "alpha_threshold": F32,
    ScatteringCoefficient => "scattering_coefficient": F32,
    SigmaAbsorption => "sigma_absorption": F32,
    SigmaScatter => "sigma_scatter": F32,
    PhaseG => "phase_g": F32,
    Time => "time": F32,
    Sharpness => "sharpness": F32,
    QuarterResolution => "quarter_resolution": Bool,
}

/// Byte offset of every uniform plus the block size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    offsets: Vec<usize>,
    size: usize,
}

const BLOCK_ALIGN: usize = 16;

impl UniformLayout {
    /// Layout of [`Uniform::ALL`].
    #[must_use]
    pub fn kernel_params() -> Self {
        let mut offsets = Vec::with_capacity(Uniform::ALL.len());
        let mut cursor: usize = 0;
        for uniform in Uniform::ALL {
            let kind = uniform.kind();
            cursor = cursor.next_multiple_of(kind.align());
            offsets.push(cursor);
            cursor += kind.size();
        }
        Self {
            offsets,
            size: cursor.next_multiple_of(BLOCK_ALIGN),
        }
    }

    /// Byte offset of `uniform`.
    #[must_use]
    pub fn offset(&self, uniform: Uniform) -> usize {
        self.offsets[uniform as usize]
    }

    /// Block size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Per-frame values of every [`Uniform`].
///
/// [`begin_frame`](Self::begin_frame) forgets which uniforms were written;
/// [`pack`](Self::pack) refuses to produce a block until every one has been
/// written again.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformTable {
    values: Vec<Option<UniformValue>>,
    layout: UniformLayout,
}

impl Default for UniformTable {
    fn default() -> Self {
        Self::new()
    }
}

impl UniformTable {
    /// Table with nothing written.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: vec![None; Uniform::ALL.len()],
            layout: UniformLayout::kernel_params(),
        }
    }

    /// Start a new frame: every uniform must be written again.
    pub fn begin_frame(&mut self) {
        self.values.fill(None);
    }

    /// Write one uniform.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::UniformType`] if `value` does not match the
    /// uniform's declared kind.
    pub fn set(
        &mut self,
        uniform: Uniform,
        value: UniformValue,
    ) -> Result<(), VolmarchError> {
        if value.kind() != uniform.kind() {
            return Err(VolmarchError::UniformType {
                name: uniform.name(),
                expected: uniform.kind().wgsl(),
                found: value.kind().wgsl(),
            });
        }
        self.values[uniform as usize] = Some(value);
        Ok(())
    }

    /// Value written this frame.
    #[must_use]
    pub fn get(&self, uniform: Uniform) -> Option<UniformValue> {
        self.values[uniform as usize]
    }

    /// Uniforms not yet written this frame.
    #[must_use]
    pub fn missing(&self) -> Vec<Uniform> {
        Uniform::ALL
            .iter()
            .copied()
            .filter(|u| self.values[*u as usize].is_none())
            .collect()
    }

    /// Block layout.
    #[must_use]
    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    /// `KernelParams` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::UnboundUniform`] naming the first uniform
    /// not written this frame.
    pub fn pack(&self) -> Result<Vec<u8>, VolmarchError> {
        let mut bytes = vec![0u8; self.layout.size()];
        for &uniform in Uniform::ALL {
            let value = self.values[uniform as usize]
                .ok_or(VolmarchError::UnboundUniform(uniform.name()))?;
            let offset = self.layout.offset(uniform);
            value.write(&mut bytes[offset..offset + uniform.kind().size()]);
        }
        Ok(bytes)
    }
}
