/// Shader program trait and descriptor

/// Descriptor for creating a shader program
///
/// Sources are opaque to the core; the backend compiles and links them.
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    /// Program name (debug label)
    pub name: String,
    pub vertex_source: String,
    pub fragment_source: String,
    /// Uniform block names, bound to binding points in declaration order
    pub uniform_blocks: Vec<String>,
}

/// Linked shader program
pub trait Shader: Send + Sync {
    /// Program name
    fn name(&self) -> &str;

    /// Binding point of a named uniform block
    fn uniform_block_binding(&self, block: &str) -> Option<u32>;
}
