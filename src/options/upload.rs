use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Policy applied when pending allocations are pushed to the GPU.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Upload", inline)]
#[serde(default)]
pub struct UploadOptions {
    /// Build the mip chain on the CPU when an upload asks for generated
    /// mipmaps. When off, only the base level is uploaded.
    #[schemars(title = "Generate Mipmaps")]
    pub generate_mipmaps: bool,
    /// Keep the pending flag set when a GPU object cannot be created, so the
    /// next sync tries again.
    #[schemars(title = "Retry Failed Uploads")]
    pub retry_failed_uploads: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            generate_mipmaps: true,
            retry_failed_uploads: true,
        }
    }
}
