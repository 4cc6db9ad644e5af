use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Diagnostic output toggles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Debug", inline)]
#[serde(default)]
pub struct DebugOptions {
    /// Dump context and allocation state when a GPU upload fails.
    #[schemars(title = "Dump On Upload Failure")]
    pub dump_on_upload_failure: bool,
    /// Log the type layout when a range write is rejected for its size.
    #[schemars(title = "Log Type On Size Mismatch")]
    pub log_type_on_size_mismatch: bool,
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self {
            dump_on_upload_failure: true,
            log_type_on_size_mismatch: true,
        }
    }
}
