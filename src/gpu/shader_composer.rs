use std::borrow::Cow;

use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, NagaModuleDescriptor, ShaderLanguage, ShaderType,
};

use crate::error::VolmarchError;

/// Pass-through copy material.
pub const BLIT_SHADER: &str = include_str!("../../assets/shaders/blit.wgsl");
/// Depth capture, upscale, and overlay material.
pub const COMPOSITE_SHADER: &str = include_str!("../../assets/shaders/composite.wgsl");

/// Wraps `naga_oil::compose::Composer` to provide shader composition with `#import` support.
///
/// Pre-loads the shared WGSL modules at construction time. Consuming shaders use
/// `#import volmarch::module_name` to pull in shared code. The composer produces
/// `naga::Module` IR directly, skipping WGSL re-parse at runtime.
pub struct ShaderComposer {
    composer: Composer,
}

/// Shared module definition.
struct ModuleDef {
    source: &'static str,
    file_path: &'static str,
}

const MODULES: &[ModuleDef] = &[ModuleDef {
    source: include_str!("../../assets/shaders/modules/fullscreen.wgsl"),
    file_path: "modules/fullscreen.wgsl",
}];

impl ShaderComposer {
    /// Composer with every shared module registered.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::ShaderCompose`] if a shared module is invalid.
    pub fn new() -> Result<Self, VolmarchError> {
        let mut composer = Composer::default();
        for m in MODULES {
            let _ = composer
                .add_composable_module(ComposableModuleDescriptor {
                    source: m.source,
                    file_path: m.file_path,
                    language: ShaderLanguage::Wgsl,
                    ..Default::default()
                })
                .map_err(|e| {
                    VolmarchError::ShaderCompose(format!(
                        "failed to register shader module '{}': {e}",
                        m.file_path
                    ))
                })?;
        }
        Ok(Self { composer })
    }

    /// Compose a shader source string (which may contain `#import` directives)
    /// into a `wgpu::ShaderModule` ready for pipeline creation.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::ShaderCompose`] if composition fails.
    pub fn compose(
        &mut self,
        device: &wgpu::Device,
        label: &str,
        source: &str,
        file_path: &str,
    ) -> Result<wgpu::ShaderModule, VolmarchError> {
        let naga_module = self.compose_naga(source, file_path)?;
        Ok(create_module(device, label, naga_module))
    }

    /// Compose a shader source into a `naga::Module` without creating a wgpu shader module.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::ShaderCompose`] if composition fails.
    pub fn compose_naga(
        &mut self,
        source: &str,
        file_path: &str,
    ) -> Result<naga::Module, VolmarchError> {
        self.composer
            .make_naga_module(NagaModuleDescriptor {
                source,
                file_path,
                shader_type: ShaderType::Wgsl,
                ..Default::default()
            })
            .map_err(|e| {
                VolmarchError::ShaderCompose(format!("failed to compose shader '{file_path}': {e}"))
            })
    }
}

/// Wrap naga IR in a wgpu shader module.
pub fn create_module(
    device: &wgpu::Device,
    label: &str,
    module: naga::Module,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Naga(Cow::Owned(module)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raymarch::contract::BUILTIN_KERNEL;

    fn all_shader_sources() -> Vec<(&'static str, &'static str)> {
        vec![
            (BLIT_SHADER, "blit.wgsl"),
            (COMPOSITE_SHADER, "composite.wgsl"),
            (BUILTIN_KERNEL, "raymarch.wgsl"),
        ]
    }

    #[test]
    fn test_all_shaders_compose() {
        let mut composer = ShaderComposer::new().unwrap();
        for (source, file_path) in all_shader_sources() {
            let module = composer
                .compose_naga(source, file_path)
                .unwrap_or_else(|e| panic!("Shader '{file_path}' failed to compose: {e}"));
            let _ = naga::valid::Validator::new(
                naga::valid::ValidationFlags::all(),
                naga::valid::Capabilities::all(),
            )
            .validate(&module)
            .unwrap_or_else(|e| panic!("Shader '{file_path}' failed validation: {e:?}"));
        }
    }

    #[test]
    fn composite_exposes_every_pass() {
        let mut composer = ShaderComposer::new().unwrap();
        let module = composer
            .compose_naga(COMPOSITE_SHADER, "composite.wgsl")
            .unwrap();
        let names: Vec<_> = module.entry_points.iter().map(|ep| ep.name.as_str()).collect();
        for entry in ["vs_main", "fs_depth", "fs_upscale", "fs_overlay"] {
            assert!(names.contains(&entry), "missing entry point {entry}");
        }
    }
}
