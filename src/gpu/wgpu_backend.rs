//! [`GpuBackend`] on a wgpu device.
//!
//! Commands are recorded into one encoder per frame and submitted by
//! [`GpuBackend::submit`]. Material pipelines are built lazily per output
//! format and cached for the life of the backend.

use std::path::Path;

use rustc_hash::FxHashMap;
use wgpu::util::DeviceExt;

use super::backend::{
    BufferId, CompositeDraw, GpuBackend, HandleAllocator, KernelBindings,
    TargetSpec, TextureId,
};
use super::pipeline_helpers::{
    create_compute_pipeline, create_fullscreen_pipeline, depth_texture_2d,
    storage_buffer_read_only, storage_texture_2d, texture_2d_unfilterable,
    uniform_buffer,
};
use super::render_context::RenderContext;
use super::shader_composer::{
    create_module, ShaderComposer, BLIT_SHADER, COMPOSITE_SHADER,
};
use super::texture::RenderTarget;
use crate::error::VolmarchError;
use crate::options::PipelineOptions;
use crate::raymarch::contract::{self, BUILTIN_KERNEL, ENTRY_POINT};
use crate::raymarch::dispatch::WorkgroupCount;
use crate::raymarch::frame_resources::{ALBEDO_FORMAT, MAIN_FORMAT, MASK_FORMAT};
use crate::raymarch::uniforms::UniformLayout;

/// Fullscreen passes the backend can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MaterialPass {
    Blit,
    Depth,
    Upscale,
    Overlay,
}

impl MaterialPass {
    const fn label(self) -> &'static str {
        match self {
            Self::Blit => "Blit",
            Self::Depth => "Smoke Depth Capture",
            Self::Upscale => "Smoke Upscale",
            Self::Overlay => "Smoke Overlay",
        }
    }

    const fn fragment_entry(self) -> &'static str {
        match self {
            Self::Blit => "fs_main",
            Self::Depth => "fs_depth",
            Self::Upscale => "fs_upscale",
            Self::Overlay => "fs_overlay",
        }
    }
}

struct KernelPipeline {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
    params_size: usize,
}

impl KernelPipeline {
    fn new(device: &wgpu::Device, module: naga::Module) -> Self {
        let shader = create_module(device, "Raymarch Kernel", module);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Raymarch Kernel Layout"),
            entries: &[
                uniform_buffer(0, wgpu::ShaderStages::COMPUTE),
                storage_buffer_read_only(1),
                storage_buffer_read_only(2),
                texture_2d_unfilterable(3, wgpu::ShaderStages::COMPUTE),
                storage_texture_2d(4, MAIN_FORMAT),
                storage_texture_2d(5, ALBEDO_FORMAT),
                storage_texture_2d(6, MASK_FORMAT),
                texture_2d_unfilterable(7, wgpu::ShaderStages::COMPUTE),
            ],
        });
        let pipeline =
            create_compute_pipeline(device, "Raymarch", &shader, ENTRY_POINT, &layout);
        let params_size = UniformLayout::kernel_params().size();
        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Raymarch Params"),
            size: params_size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            pipeline,
            layout,
            params,
            params_size,
        }
    }
}

struct Materials {
    blit: wgpu::ShaderModule,
    composite: wgpu::ShaderModule,
    blit_layout: wgpu::BindGroupLayout,
    depth_layout: wgpu::BindGroupLayout,
    upscale_layout: wgpu::BindGroupLayout,
    overlay_layout: wgpu::BindGroupLayout,
    upscale_params: wgpu::Buffer,
    /// 1×1 depth cleared to the far plane, read when the host has no depth.
    depth_fallback: RenderTarget,
    pipelines: FxHashMap<(MaterialPass, wgpu::TextureFormat), wgpu::RenderPipeline>,
}

impl Materials {
    fn new(context: &RenderContext) -> Result<Self, VolmarchError> {
        let device = &context.device;
        let mut composer = ShaderComposer::new()?;
        let blit = composer.compose(device, "Blit Shader", BLIT_SHADER, "blit.wgsl")?;
        let composite =
            composer.compose(device, "Composite Shader", COMPOSITE_SHADER, "composite.wgsl")?;

        let frag = wgpu::ShaderStages::FRAGMENT;
        let layout = |label: &str, entries: &[wgpu::BindGroupLayoutEntry]| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries,
            })
        };
        let blit_layout = layout("Blit Layout", &[texture_2d_unfilterable(0, frag)]);
        let depth_layout = layout("Depth Capture Layout", &[depth_texture_2d(0)]);
        let upscale_layout = layout(
            "Upscale Layout",
            &[
                texture_2d_unfilterable(1, frag),
                texture_2d_unfilterable(2, frag),
                texture_2d_unfilterable(3, frag),
                uniform_buffer(4, frag),
            ],
        );
        let overlay_layout = layout(
            "Overlay Layout",
            &[texture_2d_unfilterable(5, frag), texture_2d_unfilterable(6, frag)],
        );

        let upscale_params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Upscale Params"),
            contents: bytemuck::cast_slice(&[0.0f32; 4]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let depth_fallback = RenderTarget::from_spec(
            device,
            "Far Plane Depth",
            &TargetSpec {
                width: 1,
                height: 1,
                format: wgpu::TextureFormat::Depth32Float,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
            },
        );
        let mut encoder = context.create_encoder();
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Far Plane Depth"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_fallback.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        context.submit(encoder);

        Ok(Self {
            blit,
            composite,
            blit_layout,
            depth_layout,
            upscale_layout,
            overlay_layout,
            upscale_params,
            depth_fallback,
            pipelines: FxHashMap::default(),
        })
    }

    fn layout(&self, pass: MaterialPass) -> &wgpu::BindGroupLayout {
        match pass {
            MaterialPass::Blit => &self.blit_layout,
            MaterialPass::Depth => &self.depth_layout,
            MaterialPass::Upscale => &self.upscale_layout,
            MaterialPass::Overlay => &self.overlay_layout,
        }
    }

    fn pipeline(
        &mut self,
        device: &wgpu::Device,
        pass: MaterialPass,
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.pipelines.get(&(pass, format)) {
            return pipeline.clone();
        }
        log::debug!("Building {} pipeline for {format:?}", pass.label());
        let shader = match pass {
            MaterialPass::Blit => &self.blit,
            _ => &self.composite,
        };
        let pipeline = create_fullscreen_pipeline(
            device,
            pass.label(),
            shader,
            pass.fragment_entry(),
            format,
            &[self.layout(pass)],
        );
        let _ = self.pipelines.insert((pass, format), pipeline.clone());
        pipeline
    }
}

struct TextureEntry {
    target: RenderTarget,
    imported: bool,
}

/// wgpu implementation of [`GpuBackend`].
pub struct WgpuBackend {
    context: RenderContext,
    handles: HandleAllocator,
    textures: FxHashMap<TextureId, TextureEntry>,
    buffers: FxHashMap<BufferId, wgpu::Buffer>,
    kernel: Option<KernelPipeline>,
    materials: Materials,
    encoder: Option<wgpu::CommandEncoder>,
}

fn kernel_source(kernel_path: Option<&Path>) -> Result<String, VolmarchError> {
    match kernel_path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => Ok(BUILTIN_KERNEL.to_owned()),
    }
}

/// Run `create` inside out-of-memory and validation error scopes so a
/// failed allocation comes back as an error instead of reaching the
/// device's uncaptured-error handler.
fn allocation_scope<T>(
    device: &wgpu::Device,
    label: &str,
    create: impl FnOnce() -> T,
) -> Result<T, VolmarchError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    scoped_result(label, value, out_of_memory.or(validation))
}

fn scoped_result<T>(
    label: &str,
    value: T,
    error: Option<wgpu::Error>,
) -> Result<T, VolmarchError> {
    match error {
        None => Ok(value),
        Some(e) => Err(VolmarchError::Allocation(format!("{label}: {e}"))),
    }
}

impl WgpuBackend {
    /// Backend on `context` loading the kernel named by `options`.
    ///
    /// A kernel that fails to load or does not match the expected interface
    /// is logged once; the backend then reports
    /// [`kernel_available`](GpuBackend::kernel_available) as `false`.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::ShaderCompose`] if the composite materials
    /// cannot be built.
    pub fn new(
        context: RenderContext,
        options: &PipelineOptions,
    ) -> Result<Self, VolmarchError> {
        let materials = Materials::new(&context)?;
        let kernel = match kernel_source(options.kernel_path.as_deref())
            .and_then(|source| contract::load_kernel(&source))
        {
            Ok(module) => {
                log::info!("Raymarch kernel loaded");
                Some(KernelPipeline::new(&context.device, module))
            }
            Err(e) => {
                log::error!("Raymarch kernel unavailable, frames will pass through: {e}");
                None
            }
        };
        Ok(Self {
            context,
            handles: HandleAllocator::default(),
            textures: FxHashMap::default(),
            buffers: FxHashMap::default(),
            kernel,
            materials,
            encoder: None,
        })
    }

    /// Underlying device and queue.
    #[must_use]
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Register a host texture (scene color, scene depth, destination).
    pub fn import_texture(&mut self, texture: &wgpu::Texture) -> TextureId {
        let id = self.handles.texture();
        let _ = self.textures.insert(
            id,
            TextureEntry {
                target: RenderTarget::wrap(texture.clone()),
                imported: true,
            },
        );
        id
    }

    /// Forget a texture registered with
    /// [`import_texture`](Self::import_texture).
    pub fn forget_texture(&mut self, id: TextureId) {
        match self.textures.get(&id) {
            Some(entry) if entry.imported => {
                let _ = self.textures.remove(&id);
            }
            _ => log::warn!("forget_texture({id:?}) on a texture that was not imported"),
        }
    }

    /// The wgpu texture behind `id`.
    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&wgpu::Texture> {
        self.textures.get(&id).map(|e| &e.target.texture)
    }

    fn target(&self, id: TextureId) -> Result<&RenderTarget, VolmarchError> {
        self.textures
            .get(&id)
            .map(|e| &e.target)
            .ok_or(VolmarchError::UnknownTexture(id))
    }

    fn view(&self, id: TextureId) -> Result<wgpu::TextureView, VolmarchError> {
        self.target(id).map(|t| t.view.clone())
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.context.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Raymarch Frame Encoder"),
            })
        })
    }

    fn draw(
        &mut self,
        pass: MaterialPass,
        entries: &[(u32, wgpu::BindingResource<'_>)],
        destination: TextureId,
    ) -> Result<(), VolmarchError> {
        let target = self.target(destination)?;
        let format = target.format();
        let view = target.view.clone();
        let pipeline = self.materials.pipeline(&self.context.device, pass, format);
        let entries: Vec<_> = entries
            .iter()
            .map(|(binding, resource)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: resource.clone(),
            })
            .collect();
        let bind_group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(pass.label()),
                layout: self.materials.layout(pass),
                entries: &entries,
            });

        let mut render_pass = self.encoder().begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(&pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        Ok(())
    }
}

impl GpuBackend for WgpuBackend {
    fn kernel_available(&self) -> bool {
        self.kernel.is_some()
    }

    fn create_target(
        &mut self,
        label: &'static str,
        spec: &TargetSpec,
    ) -> Result<TextureId, VolmarchError> {
        let max = self.context.device.limits().max_texture_dimension_2d;
        if spec.width == 0 || spec.height == 0 || spec.width > max || spec.height > max {
            return Err(VolmarchError::Allocation(format!(
                "{label}: {}x{} outside 1..={max}",
                spec.width, spec.height
            )));
        }
        let device = &self.context.device;
        let target = allocation_scope(device, label, || {
            RenderTarget::from_spec(device, label, spec)
        })?;
        let id = self.handles.texture();
        let _ = self.textures.insert(
            id,
            TextureEntry {
                target,
                imported: false,
            },
        );
        Ok(id)
    }

    fn release_target(&mut self, id: TextureId) {
        match self.textures.get(&id) {
            Some(entry) if !entry.imported => {
                let _ = self.textures.remove(&id);
            }
            Some(_) => log::warn!("release_target({id:?}) on an imported texture"),
            None => log::warn!("release_target({id:?}) on an unknown texture"),
        }
    }

    fn create_storage_buffer(
        &mut self,
        label: &'static str,
        contents: &[u8],
    ) -> Result<BufferId, VolmarchError> {
        let max = self.context.device.limits().max_storage_buffer_binding_size as usize;
        if contents.is_empty() || contents.len() > max {
            return Err(VolmarchError::Allocation(format!(
                "{label}: {} bytes outside 1..={max}",
                contents.len()
            )));
        }
        let device = &self.context.device;
        let buffer = allocation_scope(device, label, || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::STORAGE,
            })
        })?;
        let id = self.handles.buffer();
        let _ = self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn release_buffer(&mut self, id: BufferId) {
        if self.buffers.remove(&id).is_none() {
            log::warn!("release_buffer({id:?}) on an unknown buffer");
        }
    }

    fn blit(
        &mut self,
        source: TextureId,
        destination: TextureId,
    ) -> Result<(), VolmarchError> {
        let source = self.view(source)?;
        self.draw(
            MaterialPass::Blit,
            &[(0, wgpu::BindingResource::TextureView(&source))],
            destination,
        )
    }

    fn composite(
        &mut self,
        draw: &CompositeDraw,
        destination: TextureId,
    ) -> Result<(), VolmarchError> {
        match *draw {
            CompositeDraw::DepthCapture { scene_depth } => {
                let depth = match scene_depth {
                    Some(id) => self.view(id)?,
                    None => self.materials.depth_fallback.view.clone(),
                };
                self.draw(
                    MaterialPass::Depth,
                    &[(0, wgpu::BindingResource::TextureView(&depth))],
                    destination,
                )
            }
            CompositeDraw::Upscale {
                smoke,
                mask,
                depth,
                sharpness,
            } => {
                let smoke = self.view(smoke)?;
                let mask = self.view(mask)?;
                let depth = self.view(depth)?;
                self.context.queue.write_buffer(
                    &self.materials.upscale_params,
                    0,
                    bytemuck::cast_slice(&[sharpness, 0.0, 0.0, 0.0]),
                );
                let params = self.materials.upscale_params.clone();
                self.draw(
                    MaterialPass::Upscale,
                    &[
                        (1, wgpu::BindingResource::TextureView(&smoke)),
                        (2, wgpu::BindingResource::TextureView(&mask)),
                        (3, wgpu::BindingResource::TextureView(&depth)),
                        (4, params.as_entire_binding()),
                    ],
                    destination,
                )
            }
            CompositeDraw::Overlay { scene, smoke } => {
                let scene = self.view(scene)?;
                let smoke = self.view(smoke)?;
                self.draw(
                    MaterialPass::Overlay,
                    &[
                        (5, wgpu::BindingResource::TextureView(&scene)),
                        (6, wgpu::BindingResource::TextureView(&smoke)),
                    ],
                    destination,
                )
            }
        }
    }

    fn dispatch_raymarch(
        &mut self,
        bindings: &KernelBindings<'_>,
        groups: WorkgroupCount,
    ) -> Result<(), VolmarchError> {
        let kernel = self.kernel.as_ref().ok_or(VolmarchError::KernelUnavailable)?;
        if bindings.params.len() != kernel.params_size {
            return Err(VolmarchError::Allocation(format!(
                "params block is {} bytes, kernel expects {}",
                bindings.params.len(),
                kernel.params_size
            )));
        }
        let buffer = |id: BufferId| {
            self.buffers
                .get(&id)
                .map(wgpu::Buffer::as_entire_binding)
                .ok_or(VolmarchError::UnknownBuffer(id))
        };
        let shapes = buffer(bindings.shapes)?;
        let voxels = buffer(bindings.voxels)?;
        let source = &self.target(bindings.source)?.view;
        let result = &self.target(bindings.result)?.view;
        let albedo_quarter = &self.target(bindings.albedo_quarter)?.view;
        let mask_quarter = &self.target(bindings.mask_quarter)?.view;
        let depth = &self.target(bindings.depth)?.view;

        self.context
            .queue
            .write_buffer(&kernel.params, 0, bindings.params);
        let bind_group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Raymarch Kernel Bind Group"),
                layout: &kernel.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: kernel.params.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: shapes,
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: voxels,
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(source),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(result),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::TextureView(albedo_quarter),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: wgpu::BindingResource::TextureView(mask_quarter),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: wgpu::BindingResource::TextureView(depth),
                    },
                ],
            });
        let pipeline = kernel.pipeline.clone();

        let mut pass = self.encoder().begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Raymarch"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups.x, groups.y, groups.z);
        Ok(())
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.context.submit(encoder);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_scope_keeps_the_resource() {
        assert_eq!(scoped_result("Raymarch Shapes", 7, None).unwrap(), 7);
    }

    #[test]
    fn out_of_memory_becomes_an_allocation_error() {
        let error = wgpu::Error::OutOfMemory {
            source: Box::new(std::io::Error::other("heap exhausted")),
        };
        match scoped_result("Smoke Main", (), Some(error)) {
            Err(VolmarchError::Allocation(msg)) => assert!(msg.starts_with("Smoke Main: ")),
            other => panic!("expected allocation error, got {other:?}"),
        }
    }
}
