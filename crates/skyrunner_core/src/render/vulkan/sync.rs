//! Semaphores, fences and the per-slot synchronization bundle

use ash::{vk, Device};

use super::VulkanResult;

/// Binary semaphore for GPU-GPU ordering
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create an unsignaled semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.create_semaphore(&info, None)? };
        Ok(Self { device, semaphore })
    }

    /// Semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.destroy_semaphore(self.semaphore, None) };
    }
}

/// Fence for CPU-GPU synchronization
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.create_fence(&info, None)? };
        Ok(Self { device, fence })
    }

    /// Block until signaled or `timeout` nanoseconds pass
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, timeout)? };
        Ok(())
    }

    /// Return to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence])? };
        Ok(())
    }

    /// Whether the fence is signaled right now
    pub fn is_signaled(&self) -> VulkanResult<bool> {
        Ok(unsafe { self.device.get_fence_status(self.fence)? })
    }

    /// Fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.destroy_fence(self.fence, None) };
    }
}

/// Synchronization owned by one frame-in-flight slot
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready to be written
    pub image_available: Semaphore,
    /// Signaled when the slot's rendering finishes; presentation waits on it
    pub render_finished: Semaphore,
    /// Signaled when the slot's last submission completes
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the bundle; the fence starts unsignaled and is only waited on
    /// after the slot has been submitted
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device.clone(), false)?,
        })
    }
}
