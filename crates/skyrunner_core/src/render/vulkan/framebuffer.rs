//! Framebuffers and the images they render into

use ash::{vk, Device};

use super::image::{Image, ImageDesc};
use super::render_pass::RenderPass;
use super::swapchain::Swapchain;
use super::{VulkanContext, VulkanResult};

/// Framebuffer wrapper
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer over `attachments`, ordered as in the render pass
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.create_framebuffer(&create_info, None)? };
        Ok(Self { device, framebuffer })
    }

    /// Framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe { self.device.destroy_framebuffer(self.framebuffer, None) };
    }
}

/// Attachment views in render-pass order
///
/// With an MSAA color target the swapchain view becomes the resolve
/// attachment; otherwise it is the color attachment itself.
pub fn attachment_views(
    msaa_color: Option<vk::ImageView>,
    depth: vk::ImageView,
    swapchain_view: vk::ImageView,
) -> Vec<vk::ImageView> {
    match msaa_color {
        Some(color) => vec![color, depth, swapchain_view],
        None => vec![swapchain_view, depth],
    }
}

/// Everything that is sized to the swapchain: depth, MSAA color and one
/// framebuffer per swapchain image
pub struct FrameTargets {
    framebuffers: Vec<Framebuffer>,
    msaa_color: Option<Image>,
    depth: Image,
}

impl FrameTargets {
    /// Build targets for every image of `swapchain`
    pub fn new(
        context: &VulkanContext,
        swapchain: &Swapchain,
        render_pass: &RenderPass,
        depth_format: vk::Format,
    ) -> VulkanResult<Self> {
        let extent = swapchain.extent();
        let samples = render_pass.samples();

        let depth = Image::new(
            context,
            ImageDesc::new_2d(extent, depth_format, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
                .with_aspect(vk::ImageAspectFlags::DEPTH)
                .with_samples(samples),
        )?;

        let msaa_color = if render_pass.is_multisampled() {
            let usage =
                vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT;
            Some(Image::new(
                context,
                ImageDesc::new_2d(extent, swapchain.format(), usage).with_samples(samples),
            )?)
        } else {
            None
        };

        let framebuffers = swapchain
            .views()
            .iter()
            .map(|&view| {
                let attachments =
                    attachment_views(msaa_color.as_ref().map(Image::view), depth.view(), view);
                Framebuffer::new(
                    context.device().clone(),
                    render_pass.handle(),
                    &attachments,
                    extent,
                )
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        log::debug!(
            "Created {} framebuffers at {}x{}",
            framebuffers.len(),
            extent.width,
            extent.height
        );

        Ok(Self {
            framebuffers,
            msaa_color,
            depth,
        })
    }

    /// Framebuffer for swapchain image `image_index`
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).map(Framebuffer::handle)
    }

    /// Number of framebuffers
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    /// Whether there are no framebuffers
    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_attachment_order() {
        let color = vk::ImageView::from_raw(1);
        let depth = vk::ImageView::from_raw(2);
        let swap = vk::ImageView::from_raw(3);

        assert_eq!(attachment_views(Some(color), depth, swap), vec![color, depth, swap]);
        assert_eq!(attachment_views(None, depth, swap), vec![swap, depth]);
    }
}
