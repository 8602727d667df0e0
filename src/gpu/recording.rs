//! In-memory [`GpuBackend`] that records commands instead of running them.
//!
//! Used to check resource lifetime and pass ordering without a GPU device.
//! Every live texture and buffer is tracked, releases of unknown handles
//! are counted, and allocation failure can be injected.

use rustc_hash::FxHashMap;

use super::backend::{
    BufferId, CompositeDraw, GpuBackend, HandleAllocator, KernelBindings,
    TargetSpec, TextureId,
};
use crate::error::VolmarchError;
use crate::raymarch::dispatch::WorkgroupCount;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A render target was allocated.
    CreateTarget {
        /// New handle.
        id: TextureId,
        /// Debug label.
        label: &'static str,
        /// Requested spec.
        spec: TargetSpec,
    },
    /// A render target was released.
    ReleaseTarget(TextureId),
    /// A storage buffer was allocated.
    CreateBuffer {
        /// New handle.
        id: BufferId,
        /// Debug label.
        label: &'static str,
        /// Size in bytes.
        len: usize,
    },
    /// A storage buffer was released.
    ReleaseBuffer(BufferId),
    /// A pass-through copy.
    Blit {
        /// Copied from.
        source: TextureId,
        /// Copied into.
        destination: TextureId,
    },
    /// A composite material pass.
    Composite {
        /// Pass inputs.
        draw: CompositeDraw,
        /// Pass output.
        destination: TextureId,
    },
    /// A raymarch kernel dispatch.
    Dispatch {
        /// Thread-group counts.
        groups: WorkgroupCount,
        /// Copy of the packed uniform block.
        params: Vec<u8>,
        /// Shape buffer binding.
        shapes: BufferId,
        /// Voxel buffer binding.
        voxels: BufferId,
        /// Source image binding.
        source: TextureId,
        /// Full-resolution result binding.
        result: TextureId,
    },
    /// A queue submission.
    Submit,
}

/// Recording backend.
#[derive(Debug)]
pub struct RecordingBackend {
    handles: HandleAllocator,
    kernel_available: bool,
    /// Every call, in order.
    pub commands: Vec<Command>,
    live_textures: FxHashMap<TextureId, TargetSpec>,
    imported: FxHashMap<TextureId, TargetSpec>,
    live_buffers: FxHashMap<BufferId, Vec<u8>>,
    uploads: FxHashMap<BufferId, Vec<u8>>,
    invalid_releases: usize,
    allocation_budget: Option<usize>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    /// Backend with a loaded kernel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handles: HandleAllocator::default(),
            kernel_available: true,
            commands: Vec::new(),
            live_textures: FxHashMap::default(),
            imported: FxHashMap::default(),
            live_buffers: FxHashMap::default(),
            uploads: FxHashMap::default(),
            invalid_releases: 0,
            allocation_budget: None,
        }
    }

    /// Backend whose kernel failed to load.
    #[must_use]
    pub fn without_kernel() -> Self {
        Self {
            kernel_available: false,
            ..Self::new()
        }
    }

    /// Make every allocation after the next `count` fail.
    pub fn fail_allocations_after(&mut self, count: usize) {
        self.allocation_budget = Some(count);
    }

    /// Register a host-owned texture (scene color, depth, destination).
    pub fn import_texture(
        &mut self,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> TextureId {
        let id = self.handles.texture();
        let _ = self.imported.insert(
            id,
            TargetSpec {
                width,
                height,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::RENDER_ATTACHMENT,
            },
        );
        id
    }

    /// Number of targets currently allocated.
    #[must_use]
    pub fn live_target_count(&self) -> usize {
        self.live_textures.len()
    }

    /// Spec of a live target.
    #[must_use]
    pub fn target_spec(&self, id: TextureId) -> Option<TargetSpec> {
        self.live_textures.get(&id).copied()
    }

    /// Number of buffers currently allocated.
    #[must_use]
    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.len()
    }

    /// Contents of a live buffer.
    #[must_use]
    pub fn buffer_contents(&self, id: BufferId) -> Option<&[u8]> {
        self.live_buffers.get(&id).map(Vec::as_slice)
    }

    /// Contents a buffer was created with, kept after its release.
    #[must_use]
    pub fn uploaded_contents(&self, id: BufferId) -> Option<&[u8]> {
        self.uploads.get(&id).map(Vec::as_slice)
    }

    /// Releases of handles that were not live (double or foreign frees).
    #[must_use]
    pub fn invalid_releases(&self) -> usize {
        self.invalid_releases
    }

    /// Forget the recorded commands, keeping resource state.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Most recent dispatch, if any.
    #[must_use]
    pub fn last_dispatch(&self) -> Option<&Command> {
        self.commands
            .iter()
            .rev()
            .find(|c| matches!(c, Command::Dispatch { .. }))
    }

    fn charge_allocation(&mut self, what: &str) -> Result<(), VolmarchError> {
        match self.allocation_budget {
            Some(0) => Err(VolmarchError::Allocation(format!(
                "injected failure allocating {what}"
            ))),
            Some(ref mut n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn check_texture(&self, id: TextureId) -> Result<(), VolmarchError> {
        if self.live_textures.contains_key(&id) || self.imported.contains_key(&id)
        {
            Ok(())
        } else {
            Err(VolmarchError::UnknownTexture(id))
        }
    }

    fn check_buffer(&self, id: BufferId) -> Result<(), VolmarchError> {
        if self.live_buffers.contains_key(&id) {
            Ok(())
        } else {
            Err(VolmarchError::UnknownBuffer(id))
        }
    }
}

impl GpuBackend for RecordingBackend {
    fn kernel_available(&self) -> bool {
        self.kernel_available
    }

    fn create_target(
        &mut self,
        label: &'static str,
        spec: &TargetSpec,
    ) -> Result<TextureId, VolmarchError> {
        self.charge_allocation(label)?;
        let id = self.handles.texture();
        let _ = self.live_textures.insert(id, *spec);
        self.commands.push(Command::CreateTarget {
            id,
            label,
            spec: *spec,
        });
        Ok(id)
    }

    fn release_target(&mut self, id: TextureId) {
        if self.live_textures.remove(&id).is_none() {
            self.invalid_releases += 1;
        }
        self.commands.push(Command::ReleaseTarget(id));
    }

    fn create_storage_buffer(
        &mut self,
        label: &'static str,
        contents: &[u8],
    ) -> Result<BufferId, VolmarchError> {
        self.charge_allocation(label)?;
        let id = self.handles.buffer();
        let _ = self.live_buffers.insert(id, contents.to_vec());
        let _ = self.uploads.insert(id, contents.to_vec());
        self.commands.push(Command::CreateBuffer {
            id,
            label,
            len: contents.len(),
        });
        Ok(id)
    }

    fn release_buffer(&mut self, id: BufferId) {
        if self.live_buffers.remove(&id).is_none() {
            self.invalid_releases += 1;
        }
        self.commands.push(Command::ReleaseBuffer(id));
    }

    fn blit(
        &mut self,
        source: TextureId,
        destination: TextureId,
    ) -> Result<(), VolmarchError> {
        self.check_texture(source)?;
        self.check_texture(destination)?;
        self.commands.push(Command::Blit {
            source,
            destination,
        });
        Ok(())
    }

    fn composite(
        &mut self,
        draw: &CompositeDraw,
        destination: TextureId,
    ) -> Result<(), VolmarchError> {
        match *draw {
            CompositeDraw::DepthCapture { scene_depth } => {
                if let Some(depth) = scene_depth {
                    self.check_texture(depth)?;
                }
            }
            CompositeDraw::Upscale {
                smoke, mask, depth, ..
            } => {
                self.check_texture(smoke)?;
                self.check_texture(mask)?;
                self.check_texture(depth)?;
            }
            CompositeDraw::Overlay { scene, smoke } => {
                self.check_texture(scene)?;
                self.check_texture(smoke)?;
            }
        }
        self.check_texture(destination)?;
        self.commands.push(Command::Composite {
            draw: *draw,
            destination,
        });
        Ok(())
    }

    fn dispatch_raymarch(
        &mut self,
        bindings: &KernelBindings<'_>,
        groups: WorkgroupCount,
    ) -> Result<(), VolmarchError> {
        if !self.kernel_available {
            return Err(VolmarchError::KernelUnavailable);
        }
        self.check_buffer(bindings.shapes)?;
        self.check_buffer(bindings.voxels)?;
        for id in [
            bindings.source,
            bindings.result,
            bindings.albedo_quarter,
            bindings.mask_quarter,
            bindings.depth,
        ] {
            self.check_texture(id)?;
        }
        self.commands.push(Command::Dispatch {
            groups,
            params: bindings.params.to_vec(),
            shapes: bindings.shapes,
            voxels: bindings.voxels,
            source: bindings.source,
            result: bindings.result,
        });
        Ok(())
    }

    fn submit(&mut self) {
        self.commands.push(Command::Submit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_live_resources() {
        let mut backend = RecordingBackend::new();
        let spec = TargetSpec::storage(4, 4, wgpu::TextureFormat::R32Float);
        let t = backend.create_target("t", &spec).unwrap();
        let b = backend.create_storage_buffer("b", &[1, 2, 3, 4]).unwrap();
        assert_eq!(backend.live_target_count(), 1);
        assert_eq!(backend.buffer_contents(b), Some(&[1u8, 2, 3, 4][..]));

        backend.release_target(t);
        backend.release_buffer(b);
        backend.release_buffer(b);
        assert_eq!(backend.live_target_count(), 0);
        assert_eq!(backend.live_buffer_count(), 0);
        assert_eq!(backend.invalid_releases(), 1);
    }

    #[test]
    fn injected_allocation_failure() {
        let mut backend = RecordingBackend::new();
        backend.fail_allocations_after(1);
        assert!(backend.create_storage_buffer("a", &[0; 4]).is_ok());
        assert!(matches!(
            backend.create_storage_buffer("b", &[0; 4]),
            Err(VolmarchError::Allocation(_))
        ));
    }

    #[test]
    fn blit_rejects_unknown_handles() {
        let mut backend = RecordingBackend::new();
        let src =
            backend.import_texture(8, 8, wgpu::TextureFormat::Rgba8Unorm);
        assert!(matches!(
            backend.blit(src, TextureId(999)),
            Err(VolmarchError::UnknownTexture(TextureId(999)))
        ));
        assert!(backend.commands.is_empty());
    }
}
