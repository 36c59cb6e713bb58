//! Vertex layout descriptions
//!
//! A [`VertexDescriptor`] is the single source of truth for the byte layout of
//! a vertex record. The geometry assembler reads it to know where each
//! semantic attribute goes, and pipelines read it to build the vertex input
//! state.

use ash::vk;
use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Set of semantic attributes a vertex format carries
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttributeSet: u8 {
        /// Object-space position
        const POSITION = 1;
        /// Normal vector
        const NORMAL = 1 << 1;
        /// Texture coordinates
        const UV = 1 << 2;
        /// Vertex color
        const COLOR = 1 << 3;
        /// Tangent vector with handedness
        const TANGENT = 1 << 4;
    }
}

/// What an attribute means to the geometry assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeUsage {
    /// Object-space position
    Position,
    /// Normal vector
    Normal,
    /// Texture coordinates
    Uv,
    /// Vertex color
    Color,
    /// Tangent vector
    Tangent,
    /// Shader-specific data the assembler never fills
    Other,
}

impl AttributeUsage {
    /// Corresponding flag, empty for [`AttributeUsage::Other`]
    pub fn flag(self) -> AttributeSet {
        match self {
            Self::Position => AttributeSet::POSITION,
            Self::Normal => AttributeSet::NORMAL,
            Self::Uv => AttributeSet::UV,
            Self::Color => AttributeSet::COLOR,
            Self::Tangent => AttributeSet::TANGENT,
            Self::Other => AttributeSet::empty(),
        }
    }
}

/// One vertex buffer binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    /// Binding index
    pub binding: u32,
    /// Bytes between consecutive records
    pub stride: u32,
    /// Per-vertex or per-instance stepping
    pub input_rate: vk::VertexInputRate,
}

impl VertexBinding {
    /// Per-vertex binding
    pub fn per_vertex(binding: u32, stride: u32) -> Self {
        Self { binding, stride, input_rate: vk::VertexInputRate::VERTEX }
    }
}

/// One attribute inside a binding's record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Binding the attribute is read from
    pub binding: u32,
    /// Shader input location
    pub location: u32,
    /// Data format
    pub format: vk::Format,
    /// Byte offset inside the record
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
    /// Semantic meaning
    pub usage: AttributeUsage,
}

impl VertexAttribute {
    /// Attribute on binding 0 whose size is derived from `format`
    pub fn new(location: u32, format: vk::Format, offset: u32, usage: AttributeUsage) -> Self {
        Self {
            binding: 0,
            location,
            format,
            offset,
            size: format_size(format).unwrap_or(0),
            usage,
        }
    }

    fn end(&self) -> u32 {
        self.offset + self.size
    }
}

/// Layout validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VertexLayoutError {
    /// No bindings were given
    #[error("vertex layout has no bindings")]
    NoBindings,

    /// Two bindings share an index
    #[error("binding {0} declared twice")]
    DuplicateBinding(u32),

    /// Attribute refers to a binding that does not exist
    #[error("attribute at location {location} uses undeclared binding {binding}")]
    UnknownBinding {
        /// Attribute location
        location: u32,
        /// Missing binding
        binding: u32,
    },

    /// Two attributes share a location
    #[error("location {0} declared twice")]
    DuplicateLocation(u32),

    /// A semantic attribute appears twice
    #[error("{0:?} declared twice")]
    DuplicateUsage(AttributeUsage),

    /// Attribute size does not match its format
    #[error("attribute at location {location} is {size} bytes but its format needs {expected}")]
    SizeMismatch {
        /// Attribute location
        location: u32,
        /// Declared size
        size: u32,
        /// Size implied by the format
        expected: u32,
    },

    /// Attribute extends past the binding stride
    #[error("attribute at location {location} ends at byte {end}, past stride {stride}")]
    OutsideStride {
        /// Attribute location
        location: u32,
        /// First byte after the attribute
        end: u32,
        /// Binding stride
        stride: u32,
    },

    /// Two attributes share bytes
    #[error("attributes at locations {first} and {second} overlap")]
    Overlap {
        /// Earlier attribute
        first: u32,
        /// Later attribute
        second: u32,
    },
}

/// Byte size of the vertex formats this renderer uses
pub fn format_size(format: vk::Format) -> Option<u32> {
    match format {
        vk::Format::R32_SFLOAT | vk::Format::R32_UINT | vk::Format::R32_SINT => Some(4),
        vk::Format::R8G8B8A8_UNORM | vk::Format::R8G8B8A8_SNORM => Some(4),
        vk::Format::R32G32_SFLOAT | vk::Format::R32G32_UINT => Some(8),
        vk::Format::R32G32B32_SFLOAT | vk::Format::R32G32B32_UINT => Some(12),
        vk::Format::R32G32B32A32_SFLOAT | vk::Format::R32G32B32A32_UINT => Some(16),
        _ => None,
    }
}

/// Number of 32-bit float components in `format`, if it is a float format
pub fn float_components(format: vk::Format) -> Option<usize> {
    match format {
        vk::Format::R32_SFLOAT => Some(1),
        vk::Format::R32G32_SFLOAT => Some(2),
        vk::Format::R32G32B32_SFLOAT => Some(3),
        vk::Format::R32G32B32A32_SFLOAT => Some(4),
        _ => None,
    }
}

/// Validated, immutable vertex layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexDescriptor {
    bindings: Vec<VertexBinding>,
    attributes: Vec<VertexAttribute>,
    present: AttributeSet,
}

impl VertexDescriptor {
    /// Validate and store a layout
    pub fn new(
        bindings: Vec<VertexBinding>,
        attributes: Vec<VertexAttribute>,
    ) -> Result<Self, VertexLayoutError> {
        if bindings.is_empty() {
            return Err(VertexLayoutError::NoBindings);
        }
        for (i, b) in bindings.iter().enumerate() {
            if bindings[..i].iter().any(|other| other.binding == b.binding) {
                return Err(VertexLayoutError::DuplicateBinding(b.binding));
            }
        }

        let mut present = AttributeSet::empty();
        for (i, attr) in attributes.iter().enumerate() {
            let binding = bindings
                .iter()
                .find(|b| b.binding == attr.binding)
                .ok_or(VertexLayoutError::UnknownBinding {
                    location: attr.location,
                    binding: attr.binding,
                })?;

            if let Some(expected) = format_size(attr.format) {
                if expected != attr.size {
                    return Err(VertexLayoutError::SizeMismatch {
                        location: attr.location,
                        size: attr.size,
                        expected,
                    });
                }
            }
            if attr.end() > binding.stride {
                return Err(VertexLayoutError::OutsideStride {
                    location: attr.location,
                    end: attr.end(),
                    stride: binding.stride,
                });
            }

            for earlier in &attributes[..i] {
                if earlier.location == attr.location {
                    return Err(VertexLayoutError::DuplicateLocation(attr.location));
                }
                if earlier.binding == attr.binding
                    && attr.offset < earlier.end()
                    && earlier.offset < attr.end()
                {
                    return Err(VertexLayoutError::Overlap {
                        first: earlier.location,
                        second: attr.location,
                    });
                }
            }

            let flag = attr.usage.flag();
            if present.intersects(flag) {
                return Err(VertexLayoutError::DuplicateUsage(attr.usage));
            }
            present |= flag;
        }

        Ok(Self { bindings, attributes, present })
    }

    /// Single per-vertex binding with the given attributes
    pub fn single_binding(
        stride: u32,
        attributes: Vec<VertexAttribute>,
    ) -> Result<Self, VertexLayoutError> {
        Self::new(vec![VertexBinding::per_vertex(0, stride)], attributes)
    }

    /// Bindings in declaration order
    pub fn bindings(&self) -> &[VertexBinding] {
        &self.bindings
    }

    /// Attributes in declaration order
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Semantic attributes this layout carries
    pub fn present(&self) -> AttributeSet {
        self.present
    }

    /// Attribute with the given semantic meaning
    pub fn attribute(&self, usage: AttributeUsage) -> Option<&VertexAttribute> {
        if usage == AttributeUsage::Other {
            return None;
        }
        self.attributes.iter().find(|a| a.usage == usage)
    }

    /// Byte offset of a semantic attribute, if present
    pub fn offset_of(&self, usage: AttributeUsage) -> Option<u32> {
        self.attribute(usage).map(|a| a.offset)
    }

    /// Stride of a binding
    pub fn stride(&self, binding: u32) -> Option<u32> {
        self.bindings.iter().find(|b| b.binding == binding).map(|b| b.stride)
    }

    /// Vulkan binding descriptions
    pub fn binding_descriptions(&self) -> Vec<vk::VertexInputBindingDescription> {
        self.bindings
            .iter()
            .map(|b| vk::VertexInputBindingDescription {
                binding: b.binding,
                stride: b.stride,
                input_rate: b.input_rate,
            })
            .collect()
    }

    /// Vulkan attribute descriptions
    pub fn attribute_descriptions(&self) -> Vec<vk::VertexInputAttributeDescription> {
        self.attributes
            .iter()
            .map(|a| vk::VertexInputAttributeDescription {
                location: a.location,
                binding: a.binding,
                format: a.format,
                offset: a.offset,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_layout() -> Result<VertexDescriptor, VertexLayoutError> {
        VertexDescriptor::single_binding(
            32,
            vec![
                VertexAttribute::new(0, vk::Format::R32G32B32_SFLOAT, 0, AttributeUsage::Position),
                VertexAttribute::new(1, vk::Format::R32G32B32_SFLOAT, 12, AttributeUsage::Normal),
                VertexAttribute::new(2, vk::Format::R32G32_SFLOAT, 24, AttributeUsage::Uv),
            ],
        )
    }

    #[test]
    fn test_mesh_layout_offsets() {
        let layout = mesh_layout().unwrap();

        assert_eq!(
            layout.present(),
            AttributeSet::POSITION | AttributeSet::NORMAL | AttributeSet::UV
        );
        assert_eq!(layout.offset_of(AttributeUsage::Normal), Some(12));
        assert_eq!(layout.offset_of(AttributeUsage::Uv), Some(24));
        assert_eq!(layout.offset_of(AttributeUsage::Color), None);
        assert_eq!(layout.stride(0), Some(32));
    }

    #[test]
    fn test_vulkan_descriptions() {
        let layout = mesh_layout().unwrap();
        let bindings = layout.binding_descriptions();
        let attributes = layout.attribute_descriptions();

        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].stride, 32);
        assert_eq!(bindings[0].input_rate, vk::VertexInputRate::VERTEX);
        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[2].location, 2);
        assert_eq!(attributes[2].format, vk::Format::R32G32_SFLOAT);
        assert_eq!(attributes[2].offset, 24);
    }

    #[test]
    fn test_overlap_is_rejected() {
        let result = VertexDescriptor::single_binding(
            24,
            vec![
                VertexAttribute::new(0, vk::Format::R32G32B32_SFLOAT, 0, AttributeUsage::Position),
                VertexAttribute::new(1, vk::Format::R32G32_SFLOAT, 8, AttributeUsage::Uv),
            ],
        );

        assert_eq!(result, Err(VertexLayoutError::Overlap { first: 0, second: 1 }));
    }

    #[test]
    fn test_attribute_past_stride_is_rejected() {
        let result = VertexDescriptor::single_binding(
            16,
            vec![VertexAttribute::new(
                0,
                vk::Format::R32G32B32A32_SFLOAT,
                4,
                AttributeUsage::Color,
            )],
        );

        assert!(matches!(result, Err(VertexLayoutError::OutsideStride { end: 20, .. })));
    }

    #[test]
    fn test_unknown_binding_is_rejected() {
        let mut attribute =
            VertexAttribute::new(0, vk::Format::R32G32_SFLOAT, 0, AttributeUsage::Uv);
        attribute.binding = 3;

        let result = VertexDescriptor::single_binding(8, vec![attribute]);
        assert_eq!(result, Err(VertexLayoutError::UnknownBinding { location: 0, binding: 3 }));
    }

    #[test]
    fn test_duplicate_usage_and_location_are_rejected() {
        let twice_uv = VertexDescriptor::single_binding(
            16,
            vec![
                VertexAttribute::new(0, vk::Format::R32G32_SFLOAT, 0, AttributeUsage::Uv),
                VertexAttribute::new(1, vk::Format::R32G32_SFLOAT, 8, AttributeUsage::Uv),
            ],
        );
        assert_eq!(twice_uv, Err(VertexLayoutError::DuplicateUsage(AttributeUsage::Uv)));

        let same_location = VertexDescriptor::single_binding(
            16,
            vec![
                VertexAttribute::new(0, vk::Format::R32G32_SFLOAT, 0, AttributeUsage::Uv),
                VertexAttribute::new(0, vk::Format::R32G32_SFLOAT, 8, AttributeUsage::Other),
            ],
        );
        assert_eq!(same_location, Err(VertexLayoutError::DuplicateLocation(0)));
    }

    #[test]
    fn test_other_attributes_may_repeat() {
        let layout = VertexDescriptor::single_binding(
            8,
            vec![
                VertexAttribute::new(0, vk::Format::R32_SFLOAT, 0, AttributeUsage::Other),
                VertexAttribute::new(1, vk::Format::R32_SFLOAT, 4, AttributeUsage::Other),
            ],
        )
        .unwrap();

        assert!(layout.present().is_empty());
        assert!(layout.attribute(AttributeUsage::Other).is_none());
    }

    #[test]
    fn test_size_must_match_format() {
        let mut attribute =
            VertexAttribute::new(0, vk::Format::R32G32B32_SFLOAT, 0, AttributeUsage::Position);
        attribute.size = 16;

        let result = VertexDescriptor::single_binding(16, vec![attribute]);
        assert!(matches!(result, Err(VertexLayoutError::SizeMismatch { expected: 12, .. })));
    }

    #[test]
    fn test_empty_bindings_rejected() {
        assert_eq!(VertexDescriptor::new(vec![], vec![]), Err(VertexLayoutError::NoBindings));
    }
}
