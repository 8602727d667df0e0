//! The seam between the raymarch orchestration and the GPU.
//!
//! Everything the dispatch pipeline does to the GPU goes through
//! [`GpuBackend`]: target and buffer lifetime, the compute dispatch, and the
//! composite material passes. Resources are referred to by opaque handles so
//! the pipeline never holds a wgpu object across frames.

use crate::error::VolmarchError;
use crate::raymarch::dispatch::WorkgroupCount;

/// Handle to a texture owned (or imported) by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Handle to a GPU buffer owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// Monotonic handle source shared by backend implementations.
#[derive(Debug, Default)]
pub struct HandleAllocator {
    next: u64,
}

impl HandleAllocator {
    /// Next unused texture handle.
    pub fn texture(&mut self) -> TextureId {
        self.next += 1;
        TextureId(self.next)
    }

    /// Next unused buffer handle.
    pub fn buffer(&mut self) -> BufferId {
        self.next += 1;
        BufferId(self.next)
    }
}

/// Everything that identifies a render target allocation.
///
/// Two specs compare equal exactly when an existing allocation can be
/// reused for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetSpec {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Texel format.
    pub format: wgpu::TextureFormat,
    /// Usage flags the texture is created with.
    pub usage: wgpu::TextureUsages,
}

impl TargetSpec {
    /// Target written by the compute kernel and read by later passes.
    #[must_use]
    pub fn storage(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        }
    }

    /// Target written by a composite material pass and read by later passes.
    #[must_use]
    pub fn attachment(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        }
    }
}

/// The three passes of the composite material, in pipeline order.
///
/// Each variant carries the auxiliary inputs of its pass; the primary
/// output is the destination handed to [`GpuBackend::composite`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompositeDraw {
    /// Pass 0: copy scene depth into the depth capture target. `None`
    /// means the host has no depth and the far plane is written.
    DepthCapture {
        /// Host scene depth (a depth-format texture).
        scene_depth: Option<TextureId>,
    },
    /// Pass 1: edge-aware quarter → full upsample of the smoke albedo.
    Upscale {
        /// Quarter-resolution smoke albedo.
        smoke: TextureId,
        /// Quarter-resolution coverage mask.
        mask: TextureId,
        /// Full-resolution captured depth.
        depth: TextureId,
        /// Depth edge sharpness.
        sharpness: f32,
    },
    /// Pass 2: blend the upscaled smoke over the original scene.
    Overlay {
        /// Original scene color.
        scene: TextureId,
        /// Full-resolution smoke.
        smoke: TextureId,
    },
}

impl CompositeDraw {
    /// Pass index inside the composite material.
    #[must_use]
    pub const fn pass_index(&self) -> u32 {
        match self {
            Self::DepthCapture { .. } => 0,
            Self::Upscale { .. } => 1,
            Self::Overlay { .. } => 2,
        }
    }
}

/// Per-dispatch resource bindings of the raymarch kernel.
#[derive(Debug, Clone, Copy)]
pub struct KernelBindings<'a> {
    /// Packed `KernelParams` uniform block.
    pub params: &'a [u8],
    /// Shape descriptor storage buffer.
    pub shapes: BufferId,
    /// Voxel density storage buffer.
    pub voxels: BufferId,
    /// Read-only scene color.
    pub source: TextureId,
    /// Full-resolution write target.
    pub result: TextureId,
    /// Quarter-resolution albedo write target.
    pub albedo_quarter: TextureId,
    /// Quarter-resolution mask write target.
    pub mask_quarter: TextureId,
    /// Captured scene depth.
    pub depth: TextureId,
}

/// GPU command sink used by the raymarch pipeline.
///
/// Commands are recorded in call order and reach the GPU queue no later
/// than the next [`submit`](Self::submit).
pub trait GpuBackend {
    /// Whether the raymarch compute kernel loaded successfully.
    fn kernel_available(&self) -> bool;

    /// Allocate a render target.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::Allocation`] if the texture cannot be
    /// created.
    fn create_target(
        &mut self,
        label: &'static str,
        spec: &TargetSpec,
    ) -> Result<TextureId, VolmarchError>;

    /// Release a target created by [`create_target`](Self::create_target).
    fn release_target(&mut self, id: TextureId);

    /// Allocate a storage buffer initialized with `contents`.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::Allocation`] if the buffer cannot be created.
    fn create_storage_buffer(
        &mut self,
        label: &'static str,
        contents: &[u8],
    ) -> Result<BufferId, VolmarchError>;

    /// Release a buffer created by
    /// [`create_storage_buffer`](Self::create_storage_buffer).
    fn release_buffer(&mut self, id: BufferId);

    /// Copy `source` into `destination` unmodified.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::UnknownTexture`] for a stale handle.
    fn blit(
        &mut self,
        source: TextureId,
        destination: TextureId,
    ) -> Result<(), VolmarchError>;

    /// Run one composite material pass into `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::UnknownTexture`] for a stale handle.
    fn composite(
        &mut self,
        draw: &CompositeDraw,
        destination: TextureId,
    ) -> Result<(), VolmarchError>;

    /// Dispatch the raymarch kernel once.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::KernelUnavailable`] if the kernel did not
    /// load, or a handle error for stale bindings.
    fn dispatch_raymarch(
        &mut self,
        bindings: &KernelBindings<'_>,
        groups: WorkgroupCount,
    ) -> Result<(), VolmarchError>;

    /// Submit everything recorded since the last submit.
    fn submit(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_indices_follow_material_order() {
        let id = TextureId(1);
        assert_eq!(
            CompositeDraw::DepthCapture { scene_depth: None }.pass_index(),
            0
        );
        assert_eq!(
            CompositeDraw::Upscale {
                smoke: id,
                mask: id,
                depth: id,
                sharpness: 1.0,
            }
            .pass_index(),
            1
        );
        assert_eq!(
            CompositeDraw::Overlay {
                scene: id,
                smoke: id
            }
            .pass_index(),
            2
        );
    }

    #[test]
    fn handles_are_never_reused() {
        let mut handles = HandleAllocator::default();
        let a = handles.texture();
        let b = handles.buffer();
        let c = handles.texture();
        assert_ne!(a.0, b.0);
        assert_ne!(a, c);
        assert!(c.0 > b.0);
    }

    #[test]
    fn spec_equality_includes_format() {
        let a = TargetSpec::storage(64, 32, wgpu::TextureFormat::Rgba32Float);
        let b = TargetSpec::storage(64, 32, wgpu::TextureFormat::Rgba16Float);
        assert_ne!(a, b);
        assert_eq!(a, TargetSpec::storage(64, 32, wgpu::TextureFormat::Rgba32Float));
    }
}
