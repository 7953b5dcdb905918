//! Vertex formats and layout bindings

pub mod format;
pub mod layout;

pub use format::{
    AttributeKind, InstanceData, Vertex, VertexFormat,
    VertexPosition, VertexPositionColor, VertexPositionColorNormal, VertexPositionColorNormalUv,
    VertexPositionColorNormalUv2, VertexPositionColorUv, VertexPositionNormal,
    VertexPositionNormalUv, VertexPositionUv,
};
pub use layout::{InstanceLayout, VertexLayoutBinding, VertexLayoutBuilder, INSTANCE_BINDING, VERTEX_BINDING};
