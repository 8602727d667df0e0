//! Textures known to the wgpu backend.

use super::backend::TargetSpec;

/// A texture and its default view.
///
/// Backend-created targets are built from a [`TargetSpec`]; host textures
/// are wrapped as-is.
pub struct RenderTarget {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// A default full-texture view (depth aspect only for depth-stencil
    /// formats).
    pub view: wgpu::TextureView,
}

impl RenderTarget {
    /// Create a texture matching `spec`.
    #[must_use]
    pub fn from_spec(
        device: &wgpu::Device,
        label: &str,
        spec: &TargetSpec,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: spec.width,
                height: spec.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: spec.format,
            usage: spec.usage,
            view_formats: &[],
        });
        Self::wrap(texture)
    }

    /// Wrap an existing texture.
    #[must_use]
    pub fn wrap(texture: wgpu::Texture) -> Self {
        let format = texture.format();
        let aspect = if format.has_depth_aspect() && format.has_stencil_aspect() {
            wgpu::TextureAspect::DepthOnly
        } else {
            wgpu::TextureAspect::All
        };
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            aspect,
            ..Default::default()
        });
        Self { texture, view }
    }

    /// Texel format.
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    /// Size in pixels.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }
}
