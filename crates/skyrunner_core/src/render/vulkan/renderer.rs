//! Swapchain-dependent renderer state
//!
//! [`VulkanRenderer`] owns the swapchain, the render pass, the frame targets
//! and the per-slot command buffers and synchronization objects. The frame
//! driver sequences it through [`FrameBackend`].

use ash::{vk, Device};

use super::commands::CommandRecorder;
use super::descriptor::DescriptorSet;
use super::framebuffer::FrameTargets;
use super::model::Drawable;
use super::pipeline::Pipeline;
use super::render_pass::RenderPass;
use super::swapchain::Swapchain;
use super::sync::{Fence, FrameSync};
use super::{VulkanContext, VulkanError, VulkanResult};
use crate::core::config::RendererConfig;
use crate::render::frame::{
    AcquireOutcome, DrawPass, FrameBackend, FrameError, PresentOutcome, RenderQueue,
    MAX_FRAMES_IN_FLIGHT,
};

/// Nanoseconds to wait for a presentable image
pub const ACQUIRE_TIMEOUT_NS: u64 = 1_000_000_000;

/// Nanoseconds per fence wait before logging and waiting again
pub const FENCE_TIMEOUT_NS: u64 = 1_000_000_000;

/// One draw: pipeline, descriptor sets in set-index order, and geometry
pub struct DrawItem<'a> {
    /// Pipeline to bind
    pub pipeline: &'a Pipeline,
    /// Set `i` is bound at set index `i`
    pub descriptor_sets: Vec<&'a DescriptorSet>,
    /// Geometry to draw
    pub drawable: &'a dyn Drawable,
}

impl<'a> DrawItem<'a> {
    /// Draw item with no descriptor sets
    pub fn new(pipeline: &'a Pipeline, drawable: &'a dyn Drawable) -> Self {
        Self {
            pipeline,
            descriptor_sets: Vec::new(),
            drawable,
        }
    }

    /// Append a descriptor set at the next set index
    pub fn with_set(mut self, set: &'a DescriptorSet) -> Self {
        self.descriptor_sets.push(set);
        self
    }

    /// Opaque or transparent, from the pipeline
    pub fn pass(&self) -> DrawPass {
        DrawPass::from_transparent(self.pipeline.is_transparent())
    }

    /// Bind everything and draw, selecting `frame`'s descriptor copies
    pub fn record(&self, recorder: &mut CommandRecorder, frame: usize) -> Result<(), FrameError> {
        recorder.bind_pipeline(self.pipeline.handle());
        for (index, set) in self.descriptor_sets.iter().enumerate() {
            set.bind(recorder, self.pipeline, index as u32, frame)?;
        }
        self.drawable.draw(recorder);
        Ok(())
    }
}

/// Record a queue of draws in submission order
///
/// Stops at the first item whose descriptor sets have no copy for `frame`.
pub fn record_queue(
    recorder: &mut CommandRecorder,
    queue: &RenderQueue<DrawItem<'_>>,
    frame: usize,
) -> Result<(), FrameError> {
    for item in queue.iter() {
        item.record(recorder, frame)?;
    }
    Ok(())
}

/// Renderer for one window surface
pub struct VulkanRenderer<'ctx> {
    context: &'ctx VulkanContext,
    device: Device,
    frame_sync: Vec<FrameSync>,
    command_buffers: Vec<vk::CommandBuffer>,
    targets: FrameTargets,
    render_pass: RenderPass,
    swapchain: Swapchain,
    depth_format: vk::Format,
    clear_values: [vk::ClearValue; 2],
}

impl<'ctx> VulkanRenderer<'ctx> {
    /// Build the swapchain and everything sized to it for a window of
    /// `window` size
    pub fn new(
        context: &'ctx VulkanContext,
        config: &RendererConfig,
        window: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let depth_format = context.find_depth_format()?;
        let swapchain = Swapchain::new(context, window, vk::SwapchainKHR::null())?;
        let render_pass = RenderPass::new_forward(context, swapchain.format(), depth_format)?;
        let targets = FrameTargets::new(context, &swapchain, &render_pass, depth_format)?;
        let frame_sync = create_frame_sync(context.device())?;
        let command_buffers = context.command_pool().allocate(MAX_FRAMES_IN_FLIGHT as u32)?;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: config.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];

        log::info!(
            "Renderer ready: {} swapchain images, {} frames in flight, depth {:?}",
            swapchain.image_count(),
            MAX_FRAMES_IN_FLIGHT,
            depth_format
        );

        Ok(Self {
            context,
            device: context.device().clone(),
            frame_sync,
            command_buffers,
            targets,
            render_pass,
            swapchain,
            depth_format,
            clear_values,
        })
    }

    /// Render pass that pipelines must be created against
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// Sample count pipelines must rasterize with
    pub fn samples(&self) -> vk::SampleCountFlags {
        self.render_pass.samples()
    }

    /// Build `pipeline` for the current render pass and extent
    pub fn create_pipeline(&self, pipeline: &mut Pipeline) -> VulkanResult<()> {
        pipeline.create(
            self.render_pass.handle(),
            self.swapchain.extent(),
            self.render_pass.samples(),
        )
    }

    fn sync(&self, slot: usize) -> Result<&FrameSync, FrameError> {
        self.frame_sync.get(slot).ok_or(FrameError::InvalidSlot { slot })
    }

    fn rebuild(&mut self, window: vk::Extent2D) -> VulkanResult<vk::Extent2D> {
        self.context.wait_idle()?;

        let swapchain = Swapchain::new(self.context, window, self.swapchain.handle())?;
        let retired = std::mem::replace(&mut self.swapchain, swapchain);

        if retired.format() != self.swapchain.format() {
            log::info!("Surface format changed to {:?}", self.swapchain.format());
            self.render_pass =
                RenderPass::new_forward(self.context, self.swapchain.format(), self.depth_format)?;
        }
        self.targets =
            FrameTargets::new(self.context, &self.swapchain, &self.render_pass, self.depth_format)?;
        drop(retired);

        // Semaphores may be left signaled by a frame that was never presented
        self.frame_sync = create_frame_sync(&self.device)?;

        Ok(self.swapchain.extent())
    }
}

impl FrameBackend for VulkanRenderer<'_> {
    type Recorder = CommandRecorder;

    fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    fn wait_for_slot(&mut self, slot: usize) -> Result<(), FrameError> {
        let fence = &self.sync(slot)?.in_flight;
        loop {
            match fence.wait(FENCE_TIMEOUT_NS) {
                Ok(()) => return Ok(()),
                Err(VulkanError::Api(vk::Result::TIMEOUT)) => {
                    log::warn!(
                        "Frame slot {} still busy after {} ms",
                        slot,
                        FENCE_TIMEOUT_NS / 1_000_000
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome, FrameError> {
        let semaphore = self.sync(slot)?.image_available.handle();
        match self.swapchain.acquire_next_image(ACQUIRE_TIMEOUT_NS, semaphore) {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => {
                log::warn!("No swapchain image within {} ms", ACQUIRE_TIMEOUT_NS / 1_000_000);
                Ok(AcquireOutcome::NotReady)
            }
            Err(e) => Err(VulkanError::from(e).into()),
        }
    }

    fn record<E, F>(&mut self, slot: usize, image_index: u32, draw: F) -> Result<(), E>
    where
        E: From<FrameError>,
        F: FnOnce(&mut Self::Recorder) -> Result<(), E>,
    {
        let command_buffer = *self
            .command_buffers
            .get(slot)
            .ok_or(FrameError::InvalidSlot { slot })?;
        let framebuffer = self
            .targets
            .framebuffer(image_index)
            .ok_or(FrameError::InvalidImage { index: image_index })?;

        let mut recorder = CommandRecorder::new(self.device.clone(), command_buffer);
        recorder
            .begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
            .map_err(FrameError::from)?;
        recorder.begin_render_pass(
            self.render_pass.handle(),
            framebuffer,
            self.swapchain.extent(),
            &self.clear_values,
        );

        let drawn = draw(&mut recorder);

        recorder.end_render_pass();
        recorder.end().map_err(FrameError::from)?;
        drawn
    }

    fn submit(&mut self, slot: usize) -> Result<(), FrameError> {
        let sync = self.sync(slot)?;
        let command_buffer = *self
            .command_buffers
            .get(slot)
            .ok_or(FrameError::InvalidSlot { slot })?;

        sync.in_flight.reset()?;

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [sync.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        let submitted = unsafe {
            self.device.queue_submit(
                self.context.graphics_queue(),
                &[submit_info],
                sync.in_flight.handle(),
            )
        };
        if let Err(e) = submitted {
            // The fence was reset above and nothing will signal it now
            if let Some(sync) = self.frame_sync.get_mut(slot) {
                sync.in_flight = Fence::new(self.device.clone(), true)?;
            }
            return Err(VulkanError::from(e).into());
        }
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome, FrameError> {
        let wait = self.sync(slot)?.render_finished.handle();
        match self.swapchain.present(self.context.present_queue(), image_index, wait) {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(VulkanError::from(e).into()),
        }
    }

    fn wait_idle(&mut self) -> Result<(), FrameError> {
        self.context.wait_idle()?;
        Ok(())
    }

    fn recreate_swapchain(&mut self, window: vk::Extent2D) -> Result<vk::Extent2D, FrameError> {
        Ok(self.rebuild(window)?)
    }
}

impl Drop for VulkanRenderer<'_> {
    fn drop(&mut self) {
        let _ = self.context.wait_idle();
        self.context.command_pool().free(&self.command_buffers);
    }
}

fn create_frame_sync(device: &Device) -> VulkanResult<Vec<FrameSync>> {
    (0..MAX_FRAMES_IN_FLIGHT).map(|_| FrameSync::new(device)).collect()
}
