//! Indexed meshes in device-local memory

use std::marker::PhantomData;

use ash::vk;
use bytemuck::Pod;

use super::buffer::Buffer;
use super::commands::CommandRecorder;
use super::vertex_descriptor::VertexDescriptor;
use super::{VulkanContext, VulkanError, VulkanResult};
use crate::assets::Geometry;

/// Something that can bind its geometry and issue a draw
pub trait Drawable {
    /// Bind vertex and index buffers
    fn bind(&self, recorder: &mut CommandRecorder);

    /// Number of indices to draw
    fn index_count(&self) -> u32;

    /// Bind and draw every index
    fn draw(&self, recorder: &mut CommandRecorder) {
        self.bind(recorder);
        recorder.draw_indexed(self.index_count());
    }
}

/// Vertex and index buffers built from `V` records and 32-bit indices
///
/// The model owns both buffers; command buffers only reference them.
pub struct Model<V> {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    vertex_count: u32,
    index_count: u32,
    _vertex: PhantomData<V>,
}

impl<V: Pod> Model<V> {
    /// Upload `geometry` through a staging buffer
    pub fn new(
        context: &VulkanContext,
        descriptor: &VertexDescriptor,
        geometry: &Geometry<V>,
    ) -> VulkanResult<Self> {
        check_stride::<V>(descriptor)?;
        let (vertex_buffer, index_buffer) = upload(context, geometry)?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: geometry.vertices.len() as u32,
            index_count: geometry.indices.len() as u32,
            _vertex: PhantomData,
        })
    }

    /// Replace both buffers with new geometry
    ///
    /// The caller must ensure no submitted frame still reads the old buffers,
    /// e.g. by waiting for the device to go idle.
    pub fn reload(&mut self, context: &VulkanContext, geometry: &Geometry<V>) -> VulkanResult<()> {
        let (vertex_buffer, index_buffer) = upload(context, geometry)?;
        self.vertex_buffer = vertex_buffer;
        self.index_buffer = index_buffer;
        self.vertex_count = geometry.vertices.len() as u32;
        self.index_count = geometry.indices.len() as u32;
        log::debug!("Reloaded model: {} vertices, {} indices", self.vertex_count, self.index_count);
        Ok(())
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

impl<V: Pod> Drawable for Model<V> {
    fn bind(&self, recorder: &mut CommandRecorder) {
        recorder.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        recorder.bind_index_buffer(self.index_buffer.handle());
    }

    fn index_count(&self) -> u32 {
        self.index_count
    }
}

fn check_stride<V>(descriptor: &VertexDescriptor) -> VulkanResult<()> {
    let stride = descriptor.stride(0).unwrap_or(0) as usize;
    if stride == std::mem::size_of::<V>() {
        Ok(())
    } else {
        Err(VulkanError::InvalidOperation {
            reason: format!(
                "Vertex type is {} bytes but the layout stride is {}",
                std::mem::size_of::<V>(),
                stride
            ),
        })
    }
}

fn upload<V: Pod>(
    context: &VulkanContext,
    geometry: &Geometry<V>,
) -> VulkanResult<(Buffer, Buffer)> {
    if geometry.vertices.is_empty() || geometry.indices.is_empty() {
        return Err(VulkanError::InvalidOperation {
            reason: "Model needs at least one vertex and one index".to_string(),
        });
    }

    let vertex_buffer = Buffer::device_local(
        context,
        vk::BufferUsageFlags::VERTEX_BUFFER,
        bytemuck::cast_slice(&geometry.vertices),
    )?;
    let index_buffer = Buffer::device_local(
        context,
        vk::BufferUsageFlags::INDEX_BUFFER,
        bytemuck::cast_slice(&geometry.indices),
    )?;
    Ok((vertex_buffer, index_buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::vulkan::vertex_descriptor::{AttributeUsage, VertexAttribute};

    #[test]
    fn test_stride_must_match_vertex_size() {
        let descriptor = VertexDescriptor::single_binding(
            12,
            vec![VertexAttribute::new(
                0,
                vk::Format::R32G32B32_SFLOAT,
                0,
                AttributeUsage::Position,
            )],
        )
        .unwrap();

        assert!(check_stride::<[f32; 3]>(&descriptor).is_ok());
        assert!(matches!(
            check_stride::<[f32; 4]>(&descriptor),
            Err(VulkanError::InvalidOperation { .. })
        ));
    }
}
