//! Crate-level error types.

use std::fmt;

use crate::gpu::backend::{BufferId, TextureId};
use crate::gpu::render_context::RenderContextError;

/// Errors produced by the volmarch crate.
#[derive(Debug)]
pub enum VolmarchError {
    /// GPU context initialization failure.
    Gpu(RenderContextError),
    /// Generic I/O failure.
    Io(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
    /// TOML scene description parsing failure.
    SceneParse(String),
    /// WGSL composition or validation failure.
    ShaderCompose(String),
    /// A GPU resource could not be created.
    Allocation(String),
    /// The compute kernel failed to load and cannot be dispatched.
    KernelUnavailable,
    /// A texture handle that the backend does not know about.
    UnknownTexture(TextureId),
    /// A buffer handle that the backend does not know about.
    UnknownBuffer(BufferId),
    /// A uniform was written with a value of the wrong kind.
    UniformType {
        /// Kernel-side name of the uniform.
        name: &'static str,
        /// Declared kind.
        expected: &'static str,
        /// Kind of the value that was written.
        found: &'static str,
    },
    /// A uniform was not written this frame.
    UnboundUniform(&'static str),
}

impl fmt::Display for VolmarchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
            Self::SceneParse(msg) => write!(f, "scene parse error: {msg}"),
            Self::ShaderCompose(msg) => {
                write!(f, "shader composition failed: {msg}")
            }
            Self::Allocation(msg) => {
                write!(f, "GPU allocation failed: {msg}")
            }
            Self::KernelUnavailable => {
                write!(f, "raymarch compute kernel is not available")
            }
            Self::UnknownTexture(id) => write!(f, "unknown texture {id:?}"),
            Self::UnknownBuffer(id) => write!(f, "unknown buffer {id:?}"),
            Self::UniformType {
                name,
                expected,
                found,
            } => write!(
                f,
                "uniform '{name}' expects {expected}, got {found}"
            ),
            Self::UnboundUniform(name) => {
                write!(f, "uniform '{name}' was not bound this frame")
            }
        }
    }
}

impl std::error::Error for VolmarchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gpu(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RenderContextError> for VolmarchError {
    fn from(e: RenderContextError) -> Self {
        Self::Gpu(e)
    }
}

impl From<std::io::Error> for VolmarchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
