/// Vertex layout bindings.
///
/// A `VertexLayoutBinding` ties the byte layout of a vertex buffer (and an
/// optional per-instance buffer) to the input-assembly stage. It is built
/// either from a canonical [`VertexFormat`] or declared attribute by attribute
/// with a [`VertexLayoutBuilder`], and is immutable afterwards.

use std::sync::{Arc, Mutex};
use crate::error::{CityscapeError, CityscapeResult};
use crate::engine_bail;
use crate::graphics_device::{
    Buffer, GraphicsDevice, ScalarType, VertexAttribute, VertexBinding, VertexInput,
    VertexInputDesc, VertexStepMode, lock_device,
};
use crate::vertex::VertexFormat;

/// Binding slot of per-vertex data
pub const VERTEX_BINDING: u32 = 0;
/// Binding slot of per-instance data
pub const INSTANCE_BINDING: u32 = 1;

// ===== ATTRIBUTE LIST =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AttributeSpec {
    components: u32,
    scalar: ScalarType,
    normalized: bool,
    offset: u32,
}

/// Attributes laid out at a running offset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct AttributeList {
    specs: Vec<AttributeSpec>,
    offset: u32,
}

impl AttributeList {
    fn push(&mut self, components: u32, scalar: ScalarType, normalized: bool) {
        self.specs.push(AttributeSpec { components, scalar, normalized, offset: self.offset });
        self.offset += components * scalar.size_bytes();
    }
}

// ===== INSTANCE LAYOUT =====

/// Layout of one per-instance record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceLayout {
    list: AttributeList,
}

impl InstanceLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout of [`InstanceData`](crate::vertex::InstanceData): five vec4
    pub fn instance_data() -> Self {
        (0..5).fold(Self::new(), |layout, _| layout.add(4, ScalarType::F32))
    }

    /// Append an attribute at the running offset
    pub fn add(mut self, components: u32, scalar: ScalarType) -> Self {
        self.list.push(components, scalar, false);
        self
    }

    /// Size of one instance record in bytes
    pub fn stride(&self) -> u32 {
        self.list.offset
    }

    pub fn attribute_count(&self) -> usize {
        self.list.specs.len()
    }
}

// ===== BUILDER =====

/// Declares a vertex layout attribute by attribute
///
/// # Example
///
/// ```
/// use cityscape_engine::cityscape::graphics_device::ScalarType;
/// use cityscape_engine::cityscape::vertex::VertexLayoutBuilder;
///
/// let builder = VertexLayoutBuilder::new()
///     .add(3, ScalarType::F32)
///     .add_normalized(4, ScalarType::U8);
/// assert_eq!(builder.offset(), 16);
/// ```
#[derive(Clone, Default)]
pub struct VertexLayoutBuilder {
    list: AttributeList,
    stride: Option<u32>,
    format: Option<VertexFormat>,
    instances: Option<(InstanceLayout, Arc<dyn Buffer>)>,
}

impl VertexLayoutBuilder {
    /// Empty layout for manual declaration
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout of a canonical format
    ///
    /// `VertexFormat::Custom` has no known attributes and is rejected.
    pub fn from_format(format: VertexFormat) -> CityscapeResult<Self> {
        if format.is_custom() {
            return Err(CityscapeError::UnsupportedVertexFormat(format!(
                "{:?} needs a manually declared layout", format)));
        }
        let mut builder = Self::new();
        for kind in format.attributes() {
            builder.list.push(kind.components(), ScalarType::F32, false);
        }
        builder.format = Some(format);
        Ok(builder)
    }

    /// Append an attribute at the running offset
    pub fn add(mut self, components: u32, scalar: ScalarType) -> Self {
        self.list.push(components, scalar, false);
        self
    }

    /// Append a normalized integer attribute at the running offset
    pub fn add_normalized(mut self, components: u32, scalar: ScalarType) -> Self {
        self.list.push(components, scalar, true);
        self
    }

    /// Override the stride (defaults to the running offset)
    pub fn stride(mut self, stride: u32) -> Self {
        self.stride = Some(stride);
        self
    }

    /// Append per-instance attributes read from `buffer`
    pub fn with_instances(mut self, layout: InstanceLayout, buffer: Arc<dyn Buffer>) -> Self {
        self.instances = Some((layout, buffer));
        self
    }

    /// Running byte offset (where the next attribute would start)
    pub fn offset(&self) -> u32 {
        self.list.offset
    }

    /// Create the input-assembly state on `device`
    pub fn build(
        self,
        device: &Arc<Mutex<dyn GraphicsDevice>>,
        vertex_buffer: Arc<dyn Buffer>,
        index_buffer: Option<Arc<dyn Buffer>>,
    ) -> CityscapeResult<VertexLayoutBinding> {
        if self.list.specs.is_empty() {
            engine_bail!(InvalidResource => "cityscape::VertexLayout", "Vertex layout has no attributes");
        }
        let stride = self.stride.unwrap_or(self.list.offset);
        if stride < self.list.offset {
            engine_bail!(InvalidResource => "cityscape::VertexLayout",
                "Stride {} is smaller than the attribute footprint {}", stride, self.list.offset);
        }

        let mut bindings = vec![VertexBinding {
            binding: VERTEX_BINDING,
            stride,
            step: VertexStepMode::Vertex,
            buffer: vertex_buffer,
        }];
        let mut attributes: Vec<VertexAttribute> = self.list.specs.iter()
            .enumerate()
            .map(|(location, spec)| to_attribute(location as u32, VERTEX_BINDING, spec))
            .collect();

        let instance_stride = match self.instances {
            Some((layout, buffer)) => {
                if layout.list.specs.is_empty() {
                    engine_bail!(InvalidResource => "cityscape::VertexLayout", "Instance layout has no attributes");
                }
                let first = attributes.len() as u32;
                attributes.extend(layout.list.specs.iter()
                    .enumerate()
                    .map(|(i, spec)| to_attribute(first + i as u32, INSTANCE_BINDING, spec)));
                bindings.push(VertexBinding {
                    binding: INSTANCE_BINDING,
                    stride: layout.stride(),
                    step: VertexStepMode::Instance,
                    buffer,
                });
                Some(layout.stride())
            }
            None => None,
        };

        let indexed = index_buffer.is_some();
        let input = lock_device(device)?.create_vertex_input(VertexInputDesc {
            bindings,
            attributes: attributes.clone(),
            index_buffer,
        })?;

        Ok(VertexLayoutBinding {
            device: device.clone(),
            input,
            format: self.format,
            attributes,
            stride,
            instance_stride,
            indexed,
        })
    }
}

fn to_attribute(location: u32, binding: u32, spec: &AttributeSpec) -> VertexAttribute {
    VertexAttribute {
        location,
        binding,
        components: spec.components,
        scalar: spec.scalar,
        normalized: spec.normalized,
        offset: spec.offset,
    }
}

// ===== VERTEX LAYOUT BINDING =====

/// Immutable input-assembly state bound to its buffers
pub struct VertexLayoutBinding {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    input: Arc<dyn VertexInput>,
    format: Option<VertexFormat>,
    attributes: Vec<VertexAttribute>,
    stride: u32,
    instance_stride: Option<u32>,
    indexed: bool,
}

impl VertexLayoutBinding {
    /// Bind a canonical format against `vertex_buffer` (and `index_buffer`)
    pub fn new(
        device: &Arc<Mutex<dyn GraphicsDevice>>,
        format: VertexFormat,
        vertex_buffer: Arc<dyn Buffer>,
        index_buffer: Option<Arc<dyn Buffer>>,
    ) -> CityscapeResult<Self> {
        VertexLayoutBuilder::from_format(format)?.build(device, vertex_buffer, index_buffer)
    }

    /// Activate this layout and its buffers for subsequent draws
    pub fn bind(&self) -> CityscapeResult<()> {
        lock_device(&self.device)?.bind_vertex_input(&self.input)
    }

    /// Canonical format, if built from one
    pub fn format(&self) -> Option<VertexFormat> {
        self.format
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Per-vertex stride in bytes
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Per-instance stride, when instance attributes are present
    pub fn instance_stride(&self) -> Option<u32> {
        self.instance_stride
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn input(&self) -> &Arc<dyn VertexInput> {
        &self.input
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
