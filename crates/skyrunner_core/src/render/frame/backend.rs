//! The seam between the frame driver and a graphics device

use ash::vk;
use thiserror::Error;

use crate::render::vulkan::VulkanError;

/// Frame loop errors
#[derive(Error, Debug)]
pub enum FrameError {
    /// Device call failed
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// Slot index outside the frame-in-flight range
    #[error("Frame slot {slot} out of range")]
    InvalidSlot {
        /// Offending slot
        slot: usize,
    },

    /// Image index outside the swapchain
    #[error("Swapchain image {index} out of range")]
    InvalidImage {
        /// Offending image index
        index: u32,
    },
}

/// Result of asking for the next presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image ready to render into
    Ready {
        /// Swapchain image index
        image_index: u32,
        /// Usable but no longer matches the surface exactly
        suboptimal: bool,
    },
    /// No image within the timeout; try again next iteration
    NotReady,
    /// The swapchain must be rebuilt before acquiring again
    OutOfDate,
}

/// Result of queueing an image for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Queued
    Presented,
    /// Queued, but the swapchain should be rebuilt
    Suboptimal,
    /// Not queued; the swapchain must be rebuilt
    OutOfDate,
}

/// Device operations the frame driver sequences
///
/// Slots are indices in `0..MAX_FRAMES_IN_FLIGHT`. Each slot owns a fence,
/// an "image acquired" semaphore, a "rendering finished" semaphore and a
/// command buffer.
pub trait FrameBackend {
    /// Command recording interface handed to draw code
    type Recorder;

    /// Number of swapchain images
    fn image_count(&self) -> usize;

    /// Current swapchain extent
    fn extent(&self) -> vk::Extent2D;

    /// Block until `slot`'s last submission has finished
    fn wait_for_slot(&mut self, slot: usize) -> Result<(), FrameError>;

    /// Acquire the next image, signaling `slot`'s acquire semaphore
    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome, FrameError>;

    /// Record `slot`'s command buffer for `image_index`; `draw` fills in the
    /// render pass
    fn record<E, F>(&mut self, slot: usize, image_index: u32, draw: F) -> Result<(), E>
    where
        E: From<FrameError>,
        F: FnOnce(&mut Self::Recorder) -> Result<(), E>;

    /// Submit `slot`'s commands: wait on image acquired, signal rendering
    /// finished and the slot's fence
    fn submit(&mut self, slot: usize) -> Result<(), FrameError>;

    /// Present `image_index` once `slot`'s rendering finishes
    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome, FrameError>;

    /// Block until all submitted work has finished
    fn wait_idle(&mut self) -> Result<(), FrameError>;

    /// Rebuild every swapchain-sized resource for a window of `window` size;
    /// returns the extent actually used
    fn recreate_swapchain(&mut self, window: vk::Extent2D) -> Result<vk::Extent2D, FrameError>;
}
