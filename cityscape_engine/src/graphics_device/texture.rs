/// Texture trait, sampler state and texture descriptor

/// Pixel format of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    R8_UNORM,
}

impl TextureFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8G8B8A8_UNORM | TextureFormat::R8G8B8A8_SRGB => 4,
            TextureFormat::R8_UNORM => 1,
        }
    }
}

/// Texel filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

/// Sampling parameters attached to a texture at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub filter: Filter,
    pub wrap: WrapMode,
    /// Generate a full mip chain
    pub mipmaps: bool,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            filter: Filter::Linear,
            wrap: WrapMode::Repeat,
            mipmaps: true,
        }
    }
}

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    /// Debug label (the source path for file textures)
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Pixel data, tightly packed; None leaves the texture zeroed
    pub data: Option<Vec<u8>>,
    pub sampler: SamplerDesc,
}

/// Texture properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub mip_levels: u32,
    pub sampler: SamplerDesc,
}

/// Texture resource trait
pub trait Texture: Send + Sync {
    /// Debug label
    fn label(&self) -> &str;

    /// Texture properties
    fn info(&self) -> &TextureInfo;
}

/// Number of mip levels for a full chain down to 1x1
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}
