//! Format-agnostic geometry assembly
//!
//! File loaders (OBJ, glTF) produce a [`GeometrySource`] of plain attribute
//! streams. [`assemble`] packs them into vertex records following a
//! [`VertexDescriptor`]:
//!
//! - every semantic attribute the layout declares is written at its offset;
//! - attributes the layout does not declare are ignored;
//! - attributes the layout declares but the source lacks are left zeroed and
//!   reported with a warning.

use bytemuck::Pod;

use super::AssetError;
use crate::render::vulkan::vertex_descriptor::{float_components, AttributeUsage, VertexDescriptor};

/// Raw attribute streams; an empty stream means the source lacks it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometrySource {
    /// Positions
    pub positions: Vec<[f32; 3]>,
    /// Normals
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinates
    pub uvs: Vec<[f32; 2]>,
    /// Vertex colors
    pub colors: Vec<[f32; 4]>,
    /// Tangents with handedness in `w`
    pub tangents: Vec<[f32; 4]>,
    /// Triangle list indices
    pub indices: Vec<u32>,
}

impl GeometrySource {
    fn has(&self, usage: AttributeUsage) -> bool {
        self.stream_lengths()
            .iter()
            .any(|&(u, len)| u == usage && len > 0)
    }

    fn component(&self, usage: AttributeUsage, index: usize) -> &[f32] {
        match usage {
            AttributeUsage::Position => &self.positions[index],
            AttributeUsage::Normal => &self.normals[index],
            AttributeUsage::Uv => &self.uvs[index],
            AttributeUsage::Color => &self.colors[index],
            AttributeUsage::Tangent => &self.tangents[index],
            AttributeUsage::Other => &[],
        }
    }

    fn stream_lengths(&self) -> [(AttributeUsage, usize); 5] {
        [
            (AttributeUsage::Position, self.positions.len()),
            (AttributeUsage::Normal, self.normals.len()),
            (AttributeUsage::Uv, self.uvs.len()),
            (AttributeUsage::Color, self.colors.len()),
            (AttributeUsage::Tangent, self.tangents.len()),
        ]
    }

    /// Number of vertices, checking that every non-empty stream agrees
    pub fn vertex_count(&self) -> Result<usize, AssetError> {
        let mut count = None;
        for (usage, len) in self.stream_lengths() {
            if len == 0 {
                continue;
            }
            match count {
                None => count = Some(len),
                Some(expected) if expected != len => {
                    return Err(AssetError::AttributeCountMismatch { usage, expected, actual: len });
                }
                Some(_) => {}
            }
        }
        Ok(count.unwrap_or(0))
    }
}

/// Packed vertices and 32-bit indices ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry<V> {
    /// Vertex records
    pub vertices: Vec<V>,
    /// Triangle list indices
    pub indices: Vec<u32>,
}

/// Pack `source` into records of type `V` laid out by `descriptor`'s binding 0
pub fn assemble<V: Pod>(
    descriptor: &VertexDescriptor,
    source: &GeometrySource,
) -> Result<Geometry<V>, AssetError> {
    let stride = descriptor.stride(0).ok_or(AssetError::StrideMismatch {
        expected: 0,
        actual: std::mem::size_of::<V>(),
    })? as usize;
    if stride != std::mem::size_of::<V>() {
        return Err(AssetError::StrideMismatch {
            expected: stride,
            actual: std::mem::size_of::<V>(),
        });
    }

    let count = source.vertex_count()?;
    let mut vertices = vec![V::zeroed(); count];
    let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut vertices);

    for attribute in descriptor.attributes().iter().filter(|a| a.binding == 0) {
        if attribute.usage == AttributeUsage::Other {
            continue;
        }
        if !source.has(attribute.usage) {
            log::warn!(
                "Vertex layout has {:?} at location {}, but the source has none; leaving it zeroed",
                attribute.usage,
                attribute.location
            );
            continue;
        }
        let components = float_components(attribute.format).ok_or_else(|| {
            AssetError::UnsupportedAttributeFormat {
                usage: attribute.usage,
                format: format!("{:?}", attribute.format),
            }
        })?;

        let offset = attribute.offset as usize;
        for i in 0..count {
            let values = source.component(attribute.usage, i);
            let record = &mut bytes[i * stride + offset..];
            for (c, value) in values.iter().take(components).enumerate() {
                record[c * 4..c * 4 + 4].copy_from_slice(&value.to_ne_bytes());
            }
        }
    }

    if let Some(&index) = source.indices.iter().find(|&&i| i as usize >= count) {
        return Err(AssetError::IndexOutOfRange { index, vertex_count: count });
    }

    Ok(Geometry { vertices, indices: source.indices.clone() })
}

/// Convert little-endian index data of `width` bytes per index to 32-bit indices
pub fn widen_indices(width: u32, data: &[u8]) -> Result<Vec<u32>, AssetError> {
    match width {
        2 | 4 if data.len() % width as usize != 0 => {
            Err(AssetError::MalformedIndexData { len: data.len(), width })
        }
        2 => Ok(data
            .chunks_exact(2)
            .map(|c| u32::from(u16::from_le_bytes([c[0], c[1]])))
            .collect()),
        4 => Ok(data
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()),
        other => Err(AssetError::UnsupportedIndexWidth(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::vulkan::vertex_descriptor::VertexAttribute;
    use ash::vk;
    use bytemuck::Zeroable;

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    struct MeshVertex {
        pos: [f32; 3],
        norm: [f32; 3],
        uv: [f32; 2],
    }

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    struct SparseVertex {
        uv: [f32; 2],
        padding: [f32; 2],
        pos: [f32; 3],
    }

    fn mesh_layout() -> VertexDescriptor {
        VertexDescriptor::single_binding(
            32,
            vec![
                VertexAttribute::new(0, vk::Format::R32G32B32_SFLOAT, 0, AttributeUsage::Position),
                VertexAttribute::new(1, vk::Format::R32G32B32_SFLOAT, 12, AttributeUsage::Normal),
                VertexAttribute::new(2, vk::Format::R32G32_SFLOAT, 24, AttributeUsage::Uv),
            ],
        )
        .unwrap()
    }

    fn triangle() -> GeometrySource {
        GeometrySource {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            colors: vec![[1.0, 0.0, 0.0, 1.0]; 3],
            tangents: Vec::new(),
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn test_attributes_land_at_declared_offsets() {
        let geometry: Geometry<MeshVertex> = assemble(&mesh_layout(), &triangle()).unwrap();

        assert_eq!(geometry.vertices.len(), 3);
        assert_eq!(geometry.vertices[1].pos, [1.0, 0.0, 0.0]);
        assert_eq!(geometry.vertices[1].norm, [0.0, 0.0, 1.0]);
        assert_eq!(geometry.vertices[2].uv, [0.0, 1.0]);
        assert_eq!(geometry.indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_declared_but_missing_attribute_is_zeroed() {
        let mut source = triangle();
        source.normals.clear();

        let geometry: Geometry<MeshVertex> = assemble(&mesh_layout(), &source).unwrap();

        assert!(geometry.vertices.iter().all(|v| v.norm == [0.0; 3]));
        assert_eq!(geometry.vertices[1].pos, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_undeclared_attributes_are_skipped() {
        let layout = VertexDescriptor::single_binding(
            28,
            vec![
                VertexAttribute::new(0, vk::Format::R32G32_SFLOAT, 0, AttributeUsage::Uv),
                VertexAttribute::new(1, vk::Format::R32G32B32_SFLOAT, 16, AttributeUsage::Position),
            ],
        )
        .unwrap();

        let geometry: Geometry<SparseVertex> = assemble(&layout, &triangle()).unwrap();

        assert_eq!(geometry.vertices[1].uv, [1.0, 0.0]);
        assert_eq!(geometry.vertices[1].pos, [1.0, 0.0, 0.0]);
        assert_eq!(geometry.vertices[1].padding, [0.0, 0.0]);
    }

    #[test]
    fn test_stride_must_match_vertex_type() {
        let result: Result<Geometry<SparseVertex>, _> = assemble(&mesh_layout(), &triangle());
        assert!(matches!(result, Err(AssetError::StrideMismatch { expected: 32, actual: 28 })));
    }

    #[test]
    fn test_mismatched_stream_lengths() {
        let mut source = triangle();
        source.uvs.pop();

        let result: Result<Geometry<MeshVertex>, _> = assemble(&mesh_layout(), &source);
        assert!(matches!(
            result,
            Err(AssetError::AttributeCountMismatch {
                usage: AttributeUsage::Uv,
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_out_of_range_index() {
        let mut source = triangle();
        source.indices.push(3);

        let result: Result<Geometry<MeshVertex>, _> = assemble(&mesh_layout(), &source);
        assert!(matches!(result, Err(AssetError::IndexOutOfRange { index: 3, vertex_count: 3 })));
    }

    #[test]
    fn test_widen_sixteen_bit_indices() {
        let data = [1u8, 0, 2, 0, 0xff, 0xff];
        assert_eq!(widen_indices(2, &data).unwrap(), vec![1, 2, 65535]);
    }

    #[test]
    fn test_widen_thirty_two_bit_indices() {
        let data = 70_000u32.to_le_bytes();
        assert_eq!(widen_indices(4, &data).unwrap(), vec![70_000]);
    }

    #[test]
    fn test_unsupported_index_width() {
        assert!(matches!(widen_indices(1, &[0, 1, 2]), Err(AssetError::UnsupportedIndexWidth(1))));
        assert!(matches!(
            widen_indices(4, &[0, 1, 2]),
            Err(AssetError::MalformedIndexData { len: 3, width: 4 })
        ));
    }
}
