//! GPU images
//!
//! [`Image`] covers every image the renderer allocates itself: sampled
//! textures (optionally cube-compatible with six layers), multisampled color
//! targets and depth buffers. Swapchain images are owned by the swapchain.

use std::sync::Arc;

use ash::{vk, Device};

use super::commands::CommandRecorder;
use super::memory::{allocation_error, AllocationKind, AllocationLedger};
use super::{VulkanContext, VulkanError, VulkanResult};

/// Creation parameters for [`Image::new`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    /// Size of mip level 0
    pub extent: vk::Extent2D,
    /// Texel format
    pub format: vk::Format,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
    /// Color, depth or both
    pub aspect: vk::ImageAspectFlags,
    /// Mip chain length
    pub mip_levels: u32,
    /// Array layers; 6 for a cubemap
    pub array_layers: u32,
    /// Samples per texel
    pub samples: vk::SampleCountFlags,
    /// Create as cube compatible and view as a cube
    pub cube: bool,
}

impl ImageDesc {
    /// Single-sampled 2D image with one mip level and one layer
    pub fn new_2d(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            extent,
            format,
            usage,
            aspect: vk::ImageAspectFlags::COLOR,
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            cube: false,
        }
    }

    /// Set the mip chain length
    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels.max(1);
        self
    }

    /// Set the sample count
    pub fn with_samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.samples = samples;
        self
    }

    /// Set the aspect mask
    pub fn with_aspect(mut self, aspect: vk::ImageAspectFlags) -> Self {
        self.aspect = aspect;
        self
    }

    /// Turn into a six-layer cube-compatible image
    pub fn cube(mut self) -> Self {
        self.array_layers = 6;
        self.cube = true;
        self
    }

    fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect,
            base_mip_level: 0,
            level_count: self.mip_levels,
            base_array_layer: 0,
            layer_count: self.array_layers,
        }
    }
}

/// Image, its memory and a view over all mips and layers
pub struct Image {
    device: Device,
    ledger: Arc<AllocationLedger>,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    allocation_size: vk::DeviceSize,
    desc: ImageDesc,
}

impl Image {
    /// Allocate device-local memory for `desc` and create its view
    pub fn new(context: &VulkanContext, desc: ImageDesc) -> VulkanResult<Self> {
        let device = context.device().clone();

        let flags = if desc.cube {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };
        let image_info = vk::ImageCreateInfo::builder()
            .flags(flags)
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_layers)
            .format(desc.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(desc.usage)
            .samples(desc.samples)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe { device.create_image(&image_info, None)? };
        let requirements = unsafe { device.get_image_memory_requirements(image) };

        let memory = context
            .find_memory_type(requirements.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)
            .and_then(|memory_type_index| {
                let alloc_info = vk::MemoryAllocateInfo::builder()
                    .allocation_size(requirements.size)
                    .memory_type_index(memory_type_index);
                unsafe { device.allocate_memory(&alloc_info, None) }
                    .map_err(|e| allocation_error(e, requirements.size))
            });
        let memory = match memory {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        // From here on Drop frees the image, its memory and the view once set
        let ledger = Arc::clone(context.ledger());
        ledger.register(AllocationKind::Image, requirements.size);
        let mut image = Self {
            device,
            ledger,
            image,
            memory,
            view: vk::ImageView::null(),
            allocation_size: requirements.size,
            desc,
        };

        unsafe { image.device.bind_image_memory(image.image, image.memory, 0)? };
        let view_type = if desc.cube {
            vk::ImageViewType::CUBE
        } else {
            vk::ImageViewType::TYPE_2D
        };
        image.view = create_view(
            &image.device,
            image.image,
            desc.format,
            view_type,
            desc.subresource_range(),
        )?;
        Ok(image)
    }

    /// Image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// View over every mip and layer
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Creation parameters
    pub fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    /// Record a layout transition of every mip and layer
    pub fn transition(
        &self,
        recorder: &mut CommandRecorder,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> VulkanResult<()> {
        let masks =
            transition_masks(old_layout, new_layout).ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("Unsupported layout transition {old_layout:?} -> {new_layout:?}"),
            })?;
        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(self.desc.subresource_range())
            .src_access_mask(masks.src_access)
            .dst_access_mask(masks.dst_access)
            .build();

        recorder.image_barriers(masks.src_stage, masks.dst_stage, &[barrier]);
        Ok(())
    }

    /// Record a copy of tightly packed layers from `buffer` into mip 0
    ///
    /// The image must be in `TRANSFER_DST_OPTIMAL`.
    pub fn copy_from_buffer(
        &self,
        recorder: &mut CommandRecorder,
        buffer: vk::Buffer,
        layer_bytes: vk::DeviceSize,
    ) {
        let regions: Vec<vk::BufferImageCopy> = (0..self.desc.array_layers)
            .map(|layer| vk::BufferImageCopy {
                buffer_offset: layer_bytes * vk::DeviceSize::from(layer),
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: self.desc.aspect,
                    mip_level: 0,
                    base_array_layer: layer,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
                image_extent: vk::Extent3D {
                    width: self.desc.extent.width,
                    height: self.desc.extent.height,
                    depth: 1,
                },
            })
            .collect();

        recorder.copy_buffer_to_image(buffer, self.image, &regions);
    }

    /// Record mip generation by successive linear blits
    ///
    /// Every level must be in `TRANSFER_DST_OPTIMAL` with level 0 filled.
    /// Leaves the whole image in `SHADER_READ_ONLY_OPTIMAL`.
    pub fn generate_mipmaps(&self, recorder: &mut CommandRecorder) {
        let chain = mip_chain(self.desc.extent, self.desc.mip_levels);
        let layers = self.desc.array_layers;

        let level_barrier = |level: u32,
                             old: vk::ImageLayout,
                             new: vk::ImageLayout,
                             src_access: vk::AccessFlags,
                             dst_access: vk::AccessFlags| {
            vk::ImageMemoryBarrier::builder()
                .old_layout(old)
                .new_layout(new)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(self.image)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: level,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: layers,
                })
                .src_access_mask(src_access)
                .dst_access_mask(dst_access)
                .build()
        };

        for level in 1..self.desc.mip_levels {
            let (src_w, src_h) = chain[level as usize - 1];
            let (dst_w, dst_h) = chain[level as usize];

            recorder.image_barriers(
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER,
                &[level_barrier(
                    level - 1,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    vk::AccessFlags::TRANSFER_WRITE,
                    vk::AccessFlags::TRANSFER_READ,
                )],
            );

            let blit = vk::ImageBlit {
                src_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level - 1,
                    base_array_layer: 0,
                    layer_count: layers,
                },
                src_offsets: [
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D { x: src_w, y: src_h, z: 1 },
                ],
                dst_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level,
                    base_array_layer: 0,
                    layer_count: layers,
                },
                dst_offsets: [
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D { x: dst_w, y: dst_h, z: 1 },
                ],
            };
            recorder.blit_image(self.image, blit);

            recorder.image_barriers(
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                &[level_barrier(
                    level - 1,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    vk::AccessFlags::TRANSFER_READ,
                    vk::AccessFlags::SHADER_READ,
                )],
            );
        }

        recorder.image_barriers(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            &[level_barrier(
                self.desc.mip_levels - 1,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
            )],
        );
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
        self.ledger.release(AllocationKind::Image, self.allocation_size);
    }
}

/// Create a view over `range` of `image`
pub fn create_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    view_type: vk::ImageViewType,
    range: vk::ImageSubresourceRange,
) -> VulkanResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(view_type)
        .format(format)
        .subresource_range(range);

    Ok(unsafe { device.create_image_view(&view_info, None)? })
}

/// Access masks and stages for a supported layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    /// Accesses to make available
    pub src_access: vk::AccessFlags,
    /// Accesses that wait
    pub dst_access: vk::AccessFlags,
    /// Stage that produced the data
    pub src_stage: vk::PipelineStageFlags,
    /// Stage that consumes it
    pub dst_stage: vk::PipelineStageFlags,
}

/// Barrier parameters for the transitions texture uploads need
pub fn transition_masks(old: vk::ImageLayout, new: vk::ImageLayout) -> Option<TransitionMasks> {
    use vk::ImageLayout as L;
    match (old, new) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => Some(TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => Some(TransitionMasks {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        }),
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => Some(TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        }),
        _ => None,
    }
}

/// Extent of each mip level as blit offsets, halving down to 1
pub fn mip_chain(extent: vk::Extent2D, levels: u32) -> Vec<(i32, i32)> {
    let mut width = extent.width.max(1) as i32;
    let mut height = extent.height.max(1) as i32;
    let mut chain = Vec::with_capacity(levels as usize);
    for _ in 0..levels.max(1) {
        chain.push((width, height));
        width = (width / 2).max(1);
        height = (height / 2).max(1);
    }
    chain
}
