use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What the packer does with a destroyed shape slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NullShapePolicy {
    /// Keep the slot as a zero-valued descriptor so indices stay aligned
    /// with the host's shape list.
    #[default]
    ZeroFill,
    /// Drop the slot; later shapes shift down and the count shrinks.
    Compact,
}

/// Pass sequencing and kernel selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Pipeline", inline)]
#[serde(default)]
pub struct PipelineOptions {
    /// Raymarch at quarter resolution, then upscale and composite.
    #[schemars(title = "Quarter Resolution")]
    pub quarter_resolution: bool,
    /// Empty-slot handling, fixed when the pipeline is created.
    #[schemars(skip)]
    pub null_shape_policy: NullShapePolicy,
    /// WGSL file replacing the built-in raymarch kernel.
    #[schemars(skip)]
    pub kernel_path: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            quarter_resolution: true,
            null_shape_policy: NullShapePolicy::ZeroFill,
            kernel_path: None,
        }
    }
}
