//! Usage flags and mip control for an allocation.

bitflags::bitflags! {
    /// Where an allocation's contents are consumed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Usage: u32 {
        /// Read and written by scripts on the CPU.
        const SCRIPT = 1;
        /// Sampled as a texture.
        const GRAPHICS_TEXTURE = 1 << 1;
        /// Bound as vertex data.
        const GRAPHICS_VERTEX = 1 << 2;
        /// Bound as shader constants.
        const GRAPHICS_CONSTANTS = 1 << 3;
    }
}

impl Default for Usage {
    fn default() -> Self {
        Self::SCRIPT
    }
}

/// Whether the mip chain is maintained on the CPU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MipmapControl {
    /// Only level 0 carries meaningful data.
    #[default]
    None,
    /// Every level is generated from level 0 on the CPU.
    Full,
}
