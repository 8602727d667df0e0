use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Volumetric tuning scalars, bound to the kernel individually every frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Raymarch", inline)]
#[serde(default)]
pub struct RaymarchOptions {
    /// Multiplier on every density sample.
    #[schemars(title = "Global Density", range(min = 0.0, max = 4.0), extend("step" = 0.05))]
    pub global_density: f32,
    /// Absorption added to every shape's own coefficient.
    #[schemars(title = "Absorption", range(min = 0.0, max = 2.0), extend("step" = 0.01))]
    pub sigma_absorption: f32,
    /// Scattering added to every shape's own coefficient.
    #[schemars(title = "Scattering", range(min = 0.0, max = 2.0), extend("step" = 0.01))]
    pub sigma_scatter: f32,
    /// Henyey-Greenstein asymmetry offset.
    #[schemars(title = "Phase Asymmetry", range(min = -0.5, max = 0.5), extend("step" = 0.01))]
    pub phase_g: f32,
    /// Maximum march steps per ray.
    #[schemars(title = "Steps", range(min = 8, max = 512))]
    pub step_count: u32,
    /// World-space distance between samples.
    #[schemars(title = "Step Size", range(min = 0.005, max = 1.0), extend("step" = 0.005))]
    pub step_size: f32,
    /// Exponent of the falloff toward a shape's boundary.
    #[schemars(title = "Density Falloff", range(min = 0.0, max = 8.0), extend("step" = 0.05))]
    pub density_falloff: f32,
    /// Opacity at which a ray stops marching.
    #[schemars(title = "Alpha Threshold", range(min = 0.0, max = 1.0), extend("step" = 0.01))]
    pub alpha_threshold: f32,
    /// Scale on in-scattered light.
    #[schemars(
        title = "Scattering Coefficient",
        range(min = 0.0, max = 4.0),
        extend("step" = 0.05)
    )]
    pub scattering_coefficient: f32,
    /// Depth edge sharpness of the quarter-resolution upscale.
    #[schemars(title = "Upscale Sharpness", range(min = 0.0, max = 64.0), extend("step" = 0.5))]
    pub sharpness: f32,
}

impl Default for RaymarchOptions {
    fn default() -> Self {
        Self {
            global_density: 1.0,
            sigma_absorption: 0.0,
            sigma_scatter: 0.0,
            phase_g: 0.0,
            step_count: 128,
            step_size: 0.05,
            density_falloff: 1.0,
            alpha_threshold: 0.99,
            scattering_coefficient: 1.0,
            sharpness: 16.0,
        }
    }
}
