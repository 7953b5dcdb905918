/// Canonical interleaved vertex formats and the Vertex trait.
///
/// Every recognized format interleaves 32-bit floats in a fixed order:
/// position (3), color (4), normal (3), uv (2), second uv (2). A format is a
/// plain value carried by meshes and batches; it is never inferred from a
/// Rust type at draw time.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

// ===== ATTRIBUTE KIND =====

/// Semantic of one attribute in a canonical format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Position,
    Color,
    Normal,
    Uv,
}

impl AttributeKind {
    /// Number of f32 components
    pub fn components(&self) -> u32 {
        match self {
            AttributeKind::Position => 3,
            AttributeKind::Color => 4,
            AttributeKind::Normal => 3,
            AttributeKind::Uv => 2,
        }
    }

    /// Size in bytes
    pub fn size_bytes(&self) -> u32 {
        self.components() * 4
    }
}

// ===== VERTEX FORMAT =====

/// Vertex layout tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Position,
    PositionColor,
    PositionColorNormal,
    PositionColorNormalUv,
    PositionColorNormalUv2,
    PositionColorUv,
    PositionNormal,
    PositionNormalUv,
    PositionUv,
    /// Any other layout; must be declared with a VertexLayoutBuilder
    Custom { stride: u32 },
}

impl VertexFormat {
    /// All recognized (non-custom) formats
    pub const RECOGNIZED: [VertexFormat; 9] = [
        VertexFormat::Position,
        VertexFormat::PositionColor,
        VertexFormat::PositionColorNormal,
        VertexFormat::PositionColorNormalUv,
        VertexFormat::PositionColorNormalUv2,
        VertexFormat::PositionColorUv,
        VertexFormat::PositionNormal,
        VertexFormat::PositionNormalUv,
        VertexFormat::PositionUv,
    ];

    /// Attribute order (empty for Custom)
    pub fn attributes(&self) -> &'static [AttributeKind] {
        use AttributeKind::*;
        match self {
            VertexFormat::Position => &[Position],
            VertexFormat::PositionColor => &[Position, Color],
            VertexFormat::PositionColorNormal => &[Position, Color, Normal],
            VertexFormat::PositionColorNormalUv => &[Position, Color, Normal, Uv],
            VertexFormat::PositionColorNormalUv2 => &[Position, Color, Normal, Uv, Uv],
            VertexFormat::PositionColorUv => &[Position, Color, Uv],
            VertexFormat::PositionNormal => &[Position, Normal],
            VertexFormat::PositionNormalUv => &[Position, Normal, Uv],
            VertexFormat::PositionUv => &[Position, Uv],
            VertexFormat::Custom { .. } => &[],
        }
    }

    /// Byte offset of every attribute
    pub fn offsets(&self) -> Vec<u32> {
        self.attributes()
            .iter()
            .scan(0u32, |offset, kind| {
                let current = *offset;
                *offset += kind.size_bytes();
                Some(current)
            })
            .collect()
    }

    /// Size of one vertex in bytes
    pub fn stride(&self) -> u32 {
        match self {
            VertexFormat::Custom { stride } => *stride,
            _ => self.attributes().iter().map(|a| a.size_bytes()).sum(),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, VertexFormat::Custom { .. })
    }
}

// ===== VERTEX TRAIT =====

/// A vertex type with a known layout
///
/// Implemented by the canonical vertex structs below. Types with any other
/// layout report `VertexFormat::Custom`.
pub trait Vertex: Pod + Send + Sync + 'static {
    const FORMAT: VertexFormat;
}

// ===== CANONICAL VERTEX STRUCTS =====

macro_rules! canonical_vertex {
    ($name:ident, $format:ident, { $($field:ident : $ty:ty = $glam:ty),* $(,)? }) => {
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl $name {
            pub fn new($($field: $glam),*) -> Self {
                Self { $($field: $field.into(),)* }
            }
        }

        impl Vertex for $name {
            const FORMAT: VertexFormat = VertexFormat::$format;
        }
    };
}

canonical_vertex!(VertexPosition, Position, {
    position: [f32; 3] = Vec3,
});

canonical_vertex!(VertexPositionColor, PositionColor, {
    position: [f32; 3] = Vec3,
    color: [f32; 4] = Vec4,
});

canonical_vertex!(VertexPositionColorNormal, PositionColorNormal, {
    position: [f32; 3] = Vec3,
    color: [f32; 4] = Vec4,
    normal: [f32; 3] = Vec3,
});

canonical_vertex!(VertexPositionColorNormalUv, PositionColorNormalUv, {
    position: [f32; 3] = Vec3,
    color: [f32; 4] = Vec4,
    normal: [f32; 3] = Vec3,
    uv: [f32; 2] = Vec2,
});

canonical_vertex!(VertexPositionColorNormalUv2, PositionColorNormalUv2, {
    position: [f32; 3] = Vec3,
    color: [f32; 4] = Vec4,
    normal: [f32; 3] = Vec3,
    uv: [f32; 2] = Vec2,
    uv2: [f32; 2] = Vec2,
});

canonical_vertex!(VertexPositionColorUv, PositionColorUv, {
    position: [f32; 3] = Vec3,
    color: [f32; 4] = Vec4,
    uv: [f32; 2] = Vec2,
});

canonical_vertex!(VertexPositionNormal, PositionNormal, {
    position: [f32; 3] = Vec3,
    normal: [f32; 3] = Vec3,
});

canonical_vertex!(VertexPositionNormalUv, PositionNormalUv, {
    position: [f32; 3] = Vec3,
    normal: [f32; 3] = Vec3,
    uv: [f32; 2] = Vec2,
});

canonical_vertex!(VertexPositionUv, PositionUv, {
    position: [f32; 3] = Vec3,
    uv: [f32; 2] = Vec2,
});

// ===== INSTANCE DATA =====

/// Per-instance record streamed into the shared instance buffers
///
/// Consumed as five vec4 attributes: four model-matrix columns and a color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    /// Model matrix, column-major
    pub model: [[f32; 4]; 4],
    /// Color multiplier
    pub color: [f32; 4],
}

impl InstanceData {
    pub fn new(model: Mat4, color: Vec4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: color.into(),
        }
    }

    /// Translated instance with a white color
    pub fn at(position: Vec3) -> Self {
        Self::new(Mat4::from_translation(position), Vec4::ONE)
    }
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
