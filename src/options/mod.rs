//! Raymarch tuning and pipeline options with TOML preset support.
//!
//! Options serialize to/from TOML so tuning presets can live next to a
//! scene. Every section uses `#[serde(default)]`, so a preset only needs
//! the values it overrides.

mod pipeline;
mod raymarch;

use std::path::Path;

pub use pipeline::{NullShapePolicy, PipelineOptions};
pub use raymarch::RaymarchOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::VolmarchError;

/// Top-level options container.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct Options {
    /// Volumetric tuning scalars bound to the kernel every frame.
    pub raymarch: RaymarchOptions,
    /// Pass sequencing and shape packing behavior.
    pub pipeline: PipelineOptions,
}

impl Options {
    /// Generate JSON Schema describing the UI-exposed options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Options)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::Io`] if the file cannot be read or
    /// [`VolmarchError::OptionsParse`] if it is not valid TOML options.
    pub fn load(path: &Path) -> Result<Self, VolmarchError> {
        let content = std::fs::read_to_string(path).map_err(VolmarchError::Io)?;
        toml::from_str(&content)
            .map_err(|e| VolmarchError::OptionsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// Returns [`VolmarchError::OptionsParse`] if serialization fails or
    /// [`VolmarchError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), VolmarchError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VolmarchError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(VolmarchError::Io)?;
        }
        std::fs::write(path, content).map_err(VolmarchError::Io)
    }

    /// List available preset names (TOML file stems) in a directory.
    #[must_use]
    pub fn list_presets(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) =
                        path.file_stem().and_then(|s| s.to_str())
                    {
                        names.push(stem.to_owned());
                    }
                }
            }
        }
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = Options::default();
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed: Options = toml::from_str(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[raymarch]
step_count = 64

[pipeline]
null_shape_policy = "compact"
"#;
        let opts: Options = toml::from_str(toml_str).unwrap();
        assert_eq!(opts.raymarch.step_count, 64);
        assert_eq!(opts.pipeline.null_shape_policy, NullShapePolicy::Compact);
        // Everything else should be default
        assert_eq!(opts.raymarch.sharpness, 16.0);
        assert!(opts.pipeline.quarter_resolution);
    }

    #[test]
    fn save_load_and_list_presets() {
        let dir = std::env::temp_dir()
            .join(format!("volmarch-presets-{}", std::process::id()));
        let mut opts = Options::default();
        opts.raymarch.global_density = 2.5;
        opts.save(&dir.join("thick.toml")).unwrap();
        Options::default().save(&dir.join("default.toml")).unwrap();

        assert_eq!(Options::list_presets(&dir), vec!["default", "thick"]);
        let loaded = Options::load(&dir.join("thick.toml")).unwrap();
        assert_eq!(loaded.raymarch.global_density, 2.5);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn bundled_preset_parses() {
        let opts: Options =
            toml::from_str(include_str!("../../assets/presets/dense.toml")).unwrap();
        assert_eq!(opts.raymarch.step_count, 192);
        assert_eq!(opts.pipeline.null_shape_policy, NullShapePolicy::ZeroFill);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = std::env::temp_dir()
            .join(format!("volmarch-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[raymarch]\nstep_count = \"many\"").unwrap();
        assert!(matches!(
            Options::load(&path),
            Err(VolmarchError::OptionsParse(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn schema_has_expected_properties() {
        let schema_value =
            serde_json::to_value(Options::json_schema()).unwrap();
        let props = schema_value["properties"].as_object().unwrap();
        assert!(props.contains_key("raymarch"));
        assert!(props.contains_key("pipeline"));

        let raymarch = &props["raymarch"]["properties"];
        assert!(raymarch.get("step_count").is_some());
        assert!(raymarch.get("sharpness").is_some());

        let pipeline = &props["pipeline"]["properties"];
        assert!(pipeline.get("quarter_resolution").is_some());
        assert!(pipeline.get("kernel_path").is_none());
        assert!(pipeline.get("null_shape_policy").is_none());
    }
}
