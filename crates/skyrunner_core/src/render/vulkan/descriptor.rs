//! Descriptor set layouts, pools and per-frame descriptor sets
//!
//! A [`DescriptorSetLayout`] records its binding schema so a
//! [`DescriptorSet`] can be built from it: uniform bindings get one buffer per
//! frame in flight, texture bindings reference a shared [`Texture`].

use ash::{vk, Device};
use bytemuck::Pod;

use super::buffer::{Buffer, UniformWrite, HOST_COHERENT};
use super::commands::CommandRecorder;
use super::pipeline::Pipeline;
use super::texture::Texture;
use super::{VulkanContext, VulkanError, VulkanResult};
use crate::core::config::DescriptorPoolConfig;
use crate::render::frame::{FrameError, MAX_FRAMES_IN_FLIGHT};

/// Resource type held by a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Uniform buffer, duplicated per frame in flight
    Uniform,
    /// Combined image sampler, shared by every frame
    Texture,
}

impl BindingKind {
    fn descriptor_type(self) -> vk::DescriptorType {
        match self {
            Self::Uniform => vk::DescriptorType::UNIFORM_BUFFER,
            Self::Texture => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }
}

/// One binding of a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSlot {
    /// Binding number in the shader
    pub binding: u32,
    /// Resource type
    pub kind: BindingKind,
    /// Stages that read it
    pub stages: vk::ShaderStageFlags,
}

/// Builder for [`DescriptorSetLayout`]
#[derive(Debug, Clone, Default)]
pub struct DescriptorSetLayoutBuilder {
    slots: Vec<BindingSlot>,
}

impl DescriptorSetLayoutBuilder {
    /// Empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(mut self, binding: u32, stages: vk::ShaderStageFlags) -> Self {
        self.slots.push(BindingSlot { binding, kind: BindingKind::Uniform, stages });
        self
    }

    /// Add a combined image sampler binding
    pub fn add_texture(mut self, binding: u32, stages: vk::ShaderStageFlags) -> Self {
        self.slots.push(BindingSlot { binding, kind: BindingKind::Texture, stages });
        self
    }

    /// Bindings added so far
    pub fn slots(&self) -> &[BindingSlot] {
        &self.slots
    }

    /// Create the layout
    pub fn build(self, context: &VulkanContext) -> VulkanResult<DescriptorSetLayout> {
        let mut seen = std::collections::HashSet::new();
        if let Some(slot) = self.slots.iter().find(|s| !seen.insert(s.binding)) {
            return Err(VulkanError::InvalidOperation {
                reason: format!("Descriptor binding {} declared twice", slot.binding),
            });
        }

        let bindings: Vec<vk::DescriptorSetLayoutBinding> = self
            .slots
            .iter()
            .map(|slot| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(slot.binding)
                    .descriptor_type(slot.kind.descriptor_type())
                    .descriptor_count(1)
                    .stage_flags(slot.stages)
                    .build()
            })
            .collect();

        let device = context.device().clone();
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None)? };

        Ok(DescriptorSetLayout {
            layout,
            device,
            slots: self.slots,
        })
    }
}

/// Immutable binding schema shared by pipelines and descriptor sets
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
    slots: Vec<BindingSlot>,
}

impl DescriptorSetLayout {
    /// Layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Binding schema in declaration order
    pub fn slots(&self) -> &[BindingSlot] {
        &self.slots
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe { self.device.destroy_descriptor_set_layout(self.layout, None) };
    }
}

/// Pool sizes and set count for `config`, scaled by `frames` in flight
pub fn pool_sizes(
    config: &DescriptorPoolConfig,
    frames: u32,
) -> (Vec<vk::DescriptorPoolSize>, u32) {
    let sizes = vec![
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: config.uniform_blocks * frames,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: config.textures * frames,
        },
    ];
    (sizes, config.sets * frames)
}

/// Descriptor pool sized once at startup
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create a pool holding `config` worth of descriptors for every frame in flight
    pub fn new(context: &VulkanContext, config: &DescriptorPoolConfig) -> VulkanResult<Self> {
        let (sizes, max_sets) = pool_sizes(config, MAX_FRAMES_IN_FLIGHT as u32);
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(&sizes);

        let device = context.device().clone();
        let pool = unsafe { device.create_descriptor_pool(&pool_info, None)? };
        log::info!(
            "Descriptor pool: {} sets, {} uniform blocks, {} textures",
            max_sets,
            sizes[0].descriptor_count,
            sizes[1].descriptor_count
        );

        Ok(Self { pool, device })
    }

    fn allocate(
        &self,
        layout: &DescriptorSetLayout,
        count: usize,
    ) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout.handle(); count];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        Ok(unsafe { self.device.allocate_descriptor_sets(&alloc_info)? })
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe { self.device.destroy_descriptor_pool(self.pool, None) };
    }
}

/// Per-frame uniform destinations keyed by binding
///
/// Frame `i` only ever touches the destinations created for frame `i`.
pub struct FrameUniforms<B> {
    frames: Vec<Vec<(u32, B)>>,
}

impl<B: UniformWrite> FrameUniforms<B> {
    /// Wrap one `(binding, destination)` list per frame
    pub fn new(frames: Vec<Vec<(u32, B)>>) -> Self {
        Self { frames }
    }

    /// Number of frame copies
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Destination for `binding` in `frame`
    pub fn get(&self, frame: usize, binding: u32) -> Option<&B> {
        self.frames
            .get(frame)?
            .iter()
            .find(|(b, _)| *b == binding)
            .map(|(_, dest)| dest)
    }

    /// Copy `bytes` into the `binding` destination of `frame`
    pub fn write(&mut self, frame: usize, binding: u32, bytes: &[u8]) -> VulkanResult<()> {
        let frame_count = self.frames.len();
        let dest = self
            .frames
            .get_mut(frame)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("Frame index {frame} out of range for {frame_count} frames"),
            })?
            .iter_mut()
            .find(|(b, _)| *b == binding)
            .map(|(_, dest)| dest)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("Binding {binding} is not a uniform binding"),
            })?;

        let requested = bytes.len() as u64;
        if requested > dest.capacity() {
            return Err(VulkanError::UniformOverflow {
                binding,
                capacity: dest.capacity(),
                requested,
            });
        }
        dest.write_prefix(bytes)
    }
}

/// Resource supplied for one binding of a layout
pub enum DescriptorElement<'a> {
    /// Uniform buffer of `size` bytes per frame
    Uniform {
        /// Capacity in bytes
        size: u64,
    },
    /// Texture shared by every frame
    Texture(&'a Texture),
}

/// Descriptor sets for every frame in flight plus their uniform buffers
pub struct DescriptorSet {
    sets: Vec<vk::DescriptorSet>,
    uniforms: FrameUniforms<Buffer>,
}

impl DescriptorSet {
    /// Allocate and write sets for `layout`, one element per slot in order
    pub fn new(
        context: &VulkanContext,
        pool: &DescriptorPool,
        layout: &DescriptorSetLayout,
        elements: &[DescriptorElement<'_>],
    ) -> VulkanResult<Self> {
        if elements.len() != layout.slots().len() {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Layout has {} bindings but {} elements were supplied",
                    layout.slots().len(),
                    elements.len()
                ),
            });
        }
        for (slot, element) in layout.slots().iter().zip(elements) {
            let kind = match element {
                DescriptorElement::Uniform { .. } => BindingKind::Uniform,
                DescriptorElement::Texture(_) => BindingKind::Texture,
            };
            if kind != slot.kind {
                return Err(VulkanError::InvalidOperation {
                    reason: format!(
                        "Binding {} expects {:?}, got {:?}",
                        slot.binding, slot.kind, kind
                    ),
                });
            }
        }

        let sets = pool.allocate(layout, MAX_FRAMES_IN_FLIGHT)?;

        let mut frames = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let mut buffers = Vec::new();
            for (slot, element) in layout.slots().iter().zip(elements) {
                if let DescriptorElement::Uniform { size } = element {
                    let usage = vk::BufferUsageFlags::UNIFORM_BUFFER;
                    let buffer = Buffer::new(context, *size, usage, HOST_COHERENT)?;
                    buffers.push((slot.binding, buffer));
                }
            }
            frames.push(buffers);
        }

        for (frame, &set) in sets.iter().enumerate() {
            let mut buffer_infos = Vec::new();
            let mut image_infos = Vec::new();
            for (slot, element) in layout.slots().iter().zip(elements) {
                match element {
                    DescriptorElement::Uniform { size } => {
                        let buffer = frames[frame]
                            .iter()
                            .find(|(b, _)| *b == slot.binding)
                            .map(|(_, buffer)| buffer.handle())
                            .unwrap_or_default();
                        buffer_infos.push((slot.binding, [vk::DescriptorBufferInfo {
                            buffer,
                            offset: 0,
                            range: *size,
                        }]));
                    }
                    DescriptorElement::Texture(texture) => {
                        image_infos.push((slot.binding, [texture.descriptor_info()]));
                    }
                }
            }

            let writes: Vec<vk::WriteDescriptorSet> = buffer_infos
                .iter()
                .map(|(binding, info)| {
                    vk::WriteDescriptorSet::builder()
                        .dst_set(set)
                        .dst_binding(*binding)
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(info)
                        .build()
                })
                .chain(image_infos.iter().map(|(binding, info)| {
                    vk::WriteDescriptorSet::builder()
                        .dst_set(set)
                        .dst_binding(*binding)
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(info)
                        .build()
                }))
                .collect();

            unsafe { context.device().update_descriptor_sets(&writes, &[]) };
        }

        Ok(Self {
            sets,
            uniforms: FrameUniforms::new(frames),
        })
    }

    /// Copy `data` into the uniform buffer of `binding` owned by `frame`
    ///
    /// Data larger than the buffer is rejected with
    /// [`VulkanError::UniformOverflow`].
    pub fn map(&mut self, frame: usize, data: &[u8], binding: u32) -> VulkanResult<()> {
        self.uniforms.write(frame, binding, data)
    }

    /// [`map`](Self::map) for a plain-old-data value
    pub fn map_value<T: Pod>(&mut self, frame: usize, value: &T, binding: u32) -> VulkanResult<()> {
        self.map(frame, bytemuck::bytes_of(value), binding)
    }

    /// Bind the copy belonging to `frame` at set index `set_index`
    pub fn bind(
        &self,
        recorder: &mut CommandRecorder,
        pipeline: &Pipeline,
        set_index: u32,
        frame: usize,
    ) -> Result<(), FrameError> {
        let set = frame_copy(&self.sets, frame)?;
        recorder.bind_descriptor_sets(pipeline.layout(), set_index, &[set]);
        Ok(())
    }
}

/// The copy of a per-frame handle that belongs to `frame`
pub fn frame_copy<T: Copy>(copies: &[T], frame: usize) -> Result<T, FrameError> {
    copies.get(frame).copied().ok_or(FrameError::InvalidSlot { slot: frame })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_uniforms(sizes: &[(u32, usize)]) -> FrameUniforms<Vec<u8>> {
        FrameUniforms::new(
            (0..MAX_FRAMES_IN_FLIGHT)
                .map(|_| sizes.iter().map(|&(binding, size)| (binding, vec![0u8; size])).collect())
                .collect(),
        )
    }

    #[test]
    fn test_frame_copy_rejects_out_of_range_frame() {
        let sets = [vk::DescriptorSet::null(); MAX_FRAMES_IN_FLIGHT];
        assert!(frame_copy(&sets, MAX_FRAMES_IN_FLIGHT - 1).is_ok());
        assert!(matches!(
            frame_copy(&sets, MAX_FRAMES_IN_FLIGHT),
            Err(FrameError::InvalidSlot { slot: MAX_FRAMES_IN_FLIGHT })
        ));
        assert!(matches!(frame_copy::<u32>(&[], 0), Err(FrameError::InvalidSlot { slot: 0 })));
    }

    #[test]
    fn test_each_frame_reads_back_its_own_data() {
        let mut uniforms = host_uniforms(&[(0, 64), (2, 16)]);

        for frame in 0..MAX_FRAMES_IN_FLIGHT {
            let block = [frame as u8 + 1; 64];
            let small = [frame as u8 + 10; 16];
            uniforms.write(frame, 0, &block).unwrap();
            uniforms.write(frame, 2, &small).unwrap();
        }

        for frame in 0..MAX_FRAMES_IN_FLIGHT {
            assert_eq!(uniforms.get(frame, 0).unwrap().as_slice(), &[frame as u8 + 1; 64]);
            assert_eq!(uniforms.get(frame, 2).unwrap().as_slice(), &[frame as u8 + 10; 16]);
        }
    }

    #[test]
    fn test_partial_write_keeps_tail() {
        let mut uniforms = host_uniforms(&[(0, 8)]);
        uniforms.write(0, 0, &[7; 8]).unwrap();
        uniforms.write(0, 0, &[1, 2]).unwrap();
        assert_eq!(uniforms.get(0, 0).unwrap().as_slice(), &[1, 2, 7, 7, 7, 7, 7, 7]);
    }

    #[test]
    fn test_oversized_write_is_rejected() {
        let mut uniforms = host_uniforms(&[(1, 16)]);

        let result = uniforms.write(0, 1, &[0xff; 17]);
        assert!(matches!(
            result,
            Err(VulkanError::UniformOverflow { binding: 1, capacity: 16, requested: 17 })
        ));
        assert!(uniforms.get(0, 1).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_unknown_frame_or_binding() {
        let mut uniforms = host_uniforms(&[(0, 4)]);
        assert!(matches!(
            uniforms.write(MAX_FRAMES_IN_FLIGHT, 0, &[0]),
            Err(VulkanError::InvalidOperation { .. })
        ));
        assert!(matches!(uniforms.write(0, 3, &[0]), Err(VulkanError::InvalidOperation { .. })));
    }

    #[test]
    fn test_pool_sizes_scale_with_frames() {
        let config = DescriptorPoolConfig { uniform_blocks: 64, textures: 32, sets: 64 };
        let (sizes, max_sets) = pool_sizes(&config, 2);

        assert_eq!(max_sets, 128);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 128);
        assert_eq!(sizes[1].descriptor_count, 64);
    }

    #[test]
    fn test_layout_builder_records_schema() {
        let builder = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .add_texture(1, vk::ShaderStageFlags::FRAGMENT);

        assert_eq!(builder.slots().len(), 2);
        assert_eq!(builder.slots()[1].kind, BindingKind::Texture);
        assert_eq!(builder.slots()[0].stages, vk::ShaderStageFlags::VERTEX);
    }
}
