//! Session-wide render targets and per-frame transient buffers.

use rustc_hash::FxHashMap;

use crate::error::VolmarchError;
use crate::gpu::backend::{BufferId, GpuBackend, TargetSpec, TextureId};

/// Kernel full-resolution result.
pub const MAIN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Captured scene depth.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
/// Smoke albedo at quarter and full resolution.
pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Quarter-resolution coverage mask.
pub const MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// Divisor of the quarter-resolution tier.
pub const QUARTER_DIVISOR: u32 = 4;

/// Identifies one cached render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetTag {
    /// Full-resolution kernel output.
    Main,
    /// Full-resolution captured depth.
    Depth,
    /// Quarter-resolution smoke albedo.
    AlbedoQuarter,
    /// Quarter-resolution coverage mask.
    MaskQuarter,
    /// Full-resolution upscaled smoke albedo.
    AlbedoFull,
}

impl TargetTag {
    /// Every tag.
    pub const ALL: [Self; 5] = [
        Self::Main,
        Self::Depth,
        Self::AlbedoQuarter,
        Self::MaskQuarter,
        Self::AlbedoFull,
    ];

    /// Debug label of the backing texture.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Main => "Raymarch Main",
            Self::Depth => "Raymarch Depth",
            Self::AlbedoQuarter => "Raymarch Albedo Quarter",
            Self::MaskQuarter => "Raymarch Mask Quarter",
            Self::AlbedoFull => "Raymarch Albedo Full",
        }
    }

    /// Target spec for a `width` × `height` viewport.
    #[must_use]
    pub fn spec(self, width: u32, height: u32) -> TargetSpec {
        let (qw, qh) = quarter_extent(width, height);
        match self {
            Self::Main => TargetSpec::storage(width, height, MAIN_FORMAT),
            Self::Depth => TargetSpec::attachment(width, height, DEPTH_FORMAT),
            Self::AlbedoQuarter => TargetSpec::storage(qw, qh, ALBEDO_FORMAT),
            Self::MaskQuarter => TargetSpec::storage(qw, qh, MASK_FORMAT),
            Self::AlbedoFull => {
                TargetSpec::attachment(width, height, ALBEDO_FORMAT)
            }
        }
    }
}

/// Quarter tier of a viewport: `ceil(dim / 4)`, at least 1.
#[must_use]
pub const fn quarter_extent(width: u32, height: u32) -> (u32, u32) {
    let w = width.div_ceil(QUARTER_DIVISOR);
    let h = height.div_ceil(QUARTER_DIVISOR);
    (if w == 0 { 1 } else { w }, if h == 0 { 1 } else { h })
}

/// Render targets that outlive a frame, keyed by [`TargetTag`].
#[derive(Debug, Default)]
pub struct FrameResources {
    targets: FxHashMap<TargetTag, (TargetSpec, TextureId)>,
}

/// Handles of every target for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTargets {
    /// [`TargetTag::Main`]
    pub main: TextureId,
    /// [`TargetTag::Depth`]
    pub depth: TextureId,
    /// [`TargetTag::AlbedoQuarter`]
    pub albedo_quarter: TextureId,
    /// [`TargetTag::MaskQuarter`]
    pub mask_quarter: TextureId,
    /// [`TargetTag::AlbedoFull`]
    pub albedo_full: TextureId,
}

impl FrameResources {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `tag`, reallocating only if `spec` differs from the cached
    /// one. The stale target is released before its replacement is created.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::Allocation`] if the backend cannot create the
    /// target. The tag is left empty in that case.
    pub fn ensure_target(
        &mut self,
        backend: &mut dyn GpuBackend,
        tag: TargetTag,
        spec: TargetSpec,
    ) -> Result<TextureId, VolmarchError> {
        if let Some(&(cached, id)) = self.targets.get(&tag) {
            if cached == spec {
                return Ok(id);
            }
            log::debug!(
                "Reallocating {} ({}x{} -> {}x{})",
                tag.label(),
                cached.width,
                cached.height,
                spec.width,
                spec.height
            );
            let _ = self.targets.remove(&tag);
            backend.release_target(id);
        }
        let id = backend.create_target(tag.label(), &spec)?;
        let _ = self.targets.insert(tag, (spec, id));
        Ok(id)
    }

    /// Ensure every target for a `width` × `height` viewport.
    ///
    /// # Errors
    ///
    /// Returns the first allocation failure.
    pub fn ensure_viewport(
        &mut self,
        backend: &mut dyn GpuBackend,
        width: u32,
        height: u32,
    ) -> Result<FrameTargets, VolmarchError> {
        let mut ensure = |tag: TargetTag| {
            self.ensure_target(backend, tag, tag.spec(width, height))
        };
        Ok(FrameTargets {
            main: ensure(TargetTag::Main)?,
            depth: ensure(TargetTag::Depth)?,
            albedo_quarter: ensure(TargetTag::AlbedoQuarter)?,
            mask_quarter: ensure(TargetTag::MaskQuarter)?,
            albedo_full: ensure(TargetTag::AlbedoFull)?,
        })
    }

    /// Cached spec of `tag`.
    #[must_use]
    pub fn spec(&self, tag: TargetTag) -> Option<TargetSpec> {
        self.targets.get(&tag).map(|&(spec, _)| spec)
    }

    /// Number of live targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether no target is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Release every cached target.
    pub fn release_all(&mut self, backend: &mut dyn GpuBackend) {
        for (_, (_, id)) in self.targets.drain() {
            backend.release_target(id);
        }
    }
}

/// Buffers that live for exactly one frame.
///
/// Every registered buffer must be handed back with
/// [`release_all`](Self::release_all) before the set is dropped.
#[derive(Debug, Default)]
pub struct TransientBuffers {
    buffers: Vec<BufferId>,
}

impl TransientBuffers {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `id` for release at the end of the frame.
    pub fn register(&mut self, id: BufferId) -> BufferId {
        self.buffers.push(id);
        id
    }

    /// Allocate a storage buffer and track it.
    ///
    /// # Errors
    ///
    /// Returns the backend's allocation error; nothing is tracked then.
    pub fn upload(
        &mut self,
        backend: &mut dyn GpuBackend,
        label: &'static str,
        contents: &[u8],
    ) -> Result<BufferId, VolmarchError> {
        let id = backend.create_storage_buffer(label, contents)?;
        Ok(self.register(id))
    }

    /// Number of tracked buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Release every tracked buffer.
    pub fn release_all(&mut self, backend: &mut dyn GpuBackend) {
        for id in self.buffers.drain(..) {
            backend.release_buffer(id);
        }
    }
}

impl Drop for TransientBuffers {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            log::error!(
                "{} transient buffer(s) dropped without release",
                self.buffers.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::{Command, RecordingBackend};

    #[test]
    fn quarter_extent_rounds_up_and_never_hits_zero() {
        assert_eq!(quarter_extent(1920, 1080), (480, 270));
        assert_eq!(quarter_extent(1921, 1081), (481, 271));
        assert_eq!(quarter_extent(3, 1), (1, 1));
        assert_eq!(quarter_extent(0, 0), (1, 1));
    }

    #[test]
    fn ensure_reuses_matching_target() {
        let mut backend = RecordingBackend::new();
        let mut resources = FrameResources::new();
        let spec = TargetTag::Main.spec(64, 64);
        let a = resources
            .ensure_target(&mut backend, TargetTag::Main, spec)
            .unwrap();
        let b = resources
            .ensure_target(&mut backend, TargetTag::Main, spec)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(backend.live_target_count(), 1);
        assert_eq!(backend.commands.len(), 1);
    }

    #[test]
    fn ensure_releases_before_reallocating() {
        let mut backend = RecordingBackend::new();
        let mut resources = FrameResources::new();
        let old = resources
            .ensure_target(&mut backend, TargetTag::Main, TargetTag::Main.spec(64, 64))
            .unwrap();
        let new = resources
            .ensure_target(&mut backend, TargetTag::Main, TargetTag::Main.spec(128, 64))
            .unwrap();
        assert_ne!(old, new);
        assert_eq!(backend.commands[1], Command::ReleaseTarget(old));
        assert!(matches!(
            backend.commands[2],
            Command::CreateTarget { id, .. } if id == new
        ));
        assert_eq!(backend.live_target_count(), 1);
        assert_eq!(backend.invalid_releases(), 0);
    }

    #[test]
    fn viewport_allocates_both_tiers() {
        let mut backend = RecordingBackend::new();
        let mut resources = FrameResources::new();
        let targets = resources.ensure_viewport(&mut backend, 100, 50).unwrap();
        assert_eq!(resources.len(), TargetTag::ALL.len());
        let quarter = backend.target_spec(targets.albedo_quarter).unwrap();
        assert_eq!((quarter.width, quarter.height), (25, 13));
        assert_eq!(quarter.format, ALBEDO_FORMAT);
        let full = backend.target_spec(targets.albedo_full).unwrap();
        assert_eq!((full.width, full.height), (100, 50));

        resources.release_all(&mut backend);
        assert!(resources.is_empty());
        assert_eq!(backend.live_target_count(), 0);
    }

    #[test]
    fn failed_allocation_leaves_tag_empty() {
        let mut backend = RecordingBackend::new();
        let mut resources = FrameResources::new();
        let _ = resources
            .ensure_target(&mut backend, TargetTag::Main, TargetTag::Main.spec(8, 8))
            .unwrap();
        backend.fail_allocations_after(0);
        assert!(resources
            .ensure_target(&mut backend, TargetTag::Main, TargetTag::Main.spec(16, 8))
            .is_err());
        assert_eq!(resources.spec(TargetTag::Main), None);
        assert_eq!(backend.live_target_count(), 0);
    }

    #[test]
    fn transients_release_everything_registered() {
        let mut backend = RecordingBackend::new();
        let mut transients = TransientBuffers::new();
        let _ = transients.upload(&mut backend, "a", &[0; 4]).unwrap();
        let _ = transients.upload(&mut backend, "b", &[0; 8]).unwrap();
        assert_eq!(backend.live_buffer_count(), 2);
        transients.release_all(&mut backend);
        assert!(transients.is_empty());
        assert_eq!(backend.live_buffer_count(), 0);
    }
}
