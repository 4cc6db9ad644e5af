//! Crate options with TOML file support.
//!
//! Upload and diagnostic policy live here. Options serialize to/from TOML so a
//! host application can ship them next to its other configuration.

mod debug;
mod upload;

use std::path::Path;

pub use debug::DebugOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
pub use upload::UploadOptions;

use crate::error::AllocationError;

/// Top-level options container. All sub-structs use `#[serde(default)]` so
/// partial TOML files (e.g. only overriding `[upload]`) work correctly.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema,
)]
#[serde(default)]
pub struct Options {
    /// GPU upload policy.
    pub upload: UploadOptions,
    /// Diagnostic toggles.
    pub debug: DebugOptions,
}

impl Options {
    /// Generate JSON Schema describing the options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Options)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Io`] if the file cannot be read and
    /// [`AllocationError::OptionsParse`] if it is not valid TOML.
    pub fn load(path: &Path) -> Result<Self, AllocationError> {
        let content =
            std::fs::read_to_string(path).map_err(AllocationError::Io)?;
        toml::from_str(&content)
            .map_err(|e| AllocationError::OptionsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::OptionsParse`] if serialization fails and
    /// [`AllocationError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), AllocationError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AllocationError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(AllocationError::Io)?;
        }
        std::fs::write(path, content).map_err(AllocationError::Io)
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
        let toml_str = r"
[upload]
retry_failed_uploads = false
";
        let opts: Options = toml::from_str(toml_str).unwrap();
        assert!(!opts.upload.retry_failed_uploads);
        // Everything else should be default
        assert!(opts.upload.generate_mipmaps);
        assert!(opts.debug.dump_on_upload_failure);
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join("mipmem-options-test");
        let path = dir.join("options.toml");
        let mut opts = Options::default();
        opts.debug.log_type_on_size_mismatch = false;
        opts.save(&path).unwrap();
        let loaded = Options::load(&path).unwrap();
        assert_eq!(opts, loaded);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn schema_has_expected_properties() {
        let schema_value =
            serde_json::to_value(Options::json_schema()).unwrap();
        let props = schema_value["properties"].as_object().unwrap();
        assert!(props.contains_key("upload"));
        assert!(props.contains_key("debug"));

        let upload = &props["upload"]["properties"];
        assert!(upload.get("generate_mipmaps").is_some());
        assert!(upload.get("retry_failed_uploads").is_some());
    }
}
