//! Sampled textures
//!
//! A [`Texture`] is an [`Image`] plus a sampler. 2D textures get a full mip
//! chain when the format supports linear blits; cubemaps are six layers of
//! one cube-compatible image.

use ash::{vk, Device};

use super::buffer::Buffer;
use super::image::{Image, ImageDesc};
use super::{VulkanContext, VulkanResult};
use crate::assets::{CubemapPixels, TexturePixels};

/// Sampler configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerSettings {
    /// Magnification and minification filter
    pub filter: vk::Filter,
    /// Addressing for u, v and w
    pub address_mode: vk::SamplerAddressMode,
    /// Maximum anisotropy, if the device supports it
    pub max_anisotropy: Option<f32>,
    /// Build and sample a mip chain
    pub mipmaps: bool,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            filter: vk::Filter::LINEAR,
            address_mode: vk::SamplerAddressMode::REPEAT,
            max_anisotropy: Some(16.0),
            mipmaps: true,
        }
    }
}

impl SamplerSettings {
    /// Clamped, unfiltered mips; suitable for skyboxes
    pub fn skybox() -> Self {
        Self {
            address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            mipmaps: false,
            ..Self::default()
        }
    }
}

/// Image, view and sampler
pub struct Texture {
    sampler: vk::Sampler,
    image: Image,
    device: Device,
}

impl Texture {
    /// Upload a 2D texture
    pub fn new_2d(
        context: &VulkanContext,
        pixels: &TexturePixels,
        format: vk::Format,
        settings: SamplerSettings,
    ) -> VulkanResult<Self> {
        let blit_ok =
            context.supports_optimal(format, vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR);
        let mip_levels = if settings.mipmaps && blit_ok {
            pixels.mip_levels()
        } else {
            if settings.mipmaps {
                log::warn!("{:?} does not support linear blits; skipping mipmaps", format);
            }
            1
        };

        let extent = vk::Extent2D {
            width: pixels.width(),
            height: pixels.height(),
        };
        let desc =
            ImageDesc::new_2d(extent, format, upload_usage(mip_levels)).with_mip_levels(mip_levels);

        Self::upload(context, desc, pixels.data(), pixels.size_bytes() as u64, settings)
    }

    /// Upload a six-face cubemap
    pub fn new_cubemap(
        context: &VulkanContext,
        pixels: &CubemapPixels,
        format: vk::Format,
        settings: SamplerSettings,
    ) -> VulkanResult<Self> {
        let extent = vk::Extent2D {
            width: pixels.size(),
            height: pixels.size(),
        };
        let desc = ImageDesc::new_2d(extent, format, upload_usage(1)).cube();
        let settings = SamplerSettings { mipmaps: false, ..settings };

        Self::upload(context, desc, &pixels.packed(), pixels.face_bytes() as u64, settings)
    }

    fn upload(
        context: &VulkanContext,
        desc: ImageDesc,
        data: &[u8],
        layer_bytes: u64,
        settings: SamplerSettings,
    ) -> VulkanResult<Self> {
        let staging = Buffer::with_data(context, vk::BufferUsageFlags::TRANSFER_SRC, data)?;
        let image = Image::new(context, desc)?;

        context.command_pool().one_shot(context.graphics_queue(), |recorder| {
            image.transition(
                recorder,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            )?;
            image.copy_from_buffer(recorder, staging.handle(), layer_bytes);
            if desc.mip_levels > 1 {
                image.generate_mipmaps(recorder);
                Ok(())
            } else {
                image.transition(
                    recorder,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                )
            }
        })?;

        let anisotropy = settings
            .max_anisotropy
            .filter(|_| context.physical_device().sampler_anisotropy)
            .map(|max| max.min(context.physical_device().properties.limits.max_sampler_anisotropy));

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(settings.filter)
            .min_filter(settings.filter)
            .address_mode_u(settings.address_mode)
            .address_mode_v(settings.address_mode)
            .address_mode_w(settings.address_mode)
            .anisotropy_enable(anisotropy.is_some())
            .max_anisotropy(anisotropy.unwrap_or(1.0))
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(desc.mip_levels as f32);

        let device = context.device().clone();
        let sampler = unsafe { device.create_sampler(&sampler_info, None)? };

        log::debug!(
            "Uploaded {}x{} texture ({} layers, {} mips)",
            desc.extent.width,
            desc.extent.height,
            desc.array_layers,
            desc.mip_levels
        );

        Ok(Self { sampler, image, device })
    }

    /// View covering every mip and layer
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Sampler
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Whether this is a cubemap
    pub fn is_cubemap(&self) -> bool {
        self.image.desc().cube
    }

    /// Descriptor info for a combined image sampler write
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: self.image.view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe { self.device.destroy_sampler(self.sampler, None) };
    }
}

fn upload_usage(mip_levels: u32) -> vk::ImageUsageFlags {
    let usage = vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED;
    if mip_levels > 1 {
        usage | vk::ImageUsageFlags::TRANSFER_SRC
    } else {
        usage
    }
}
