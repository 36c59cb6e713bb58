//! GPU buffers
//!
//! [`Buffer`] owns a `vk::Buffer` and its dedicated memory. Host-visible
//! buffers accept writes directly; device-local buffers are filled through a
//! temporary staging buffer.

use std::sync::Arc;

use ash::{vk, Device};

use super::memory::{allocation_error, AllocationKind, AllocationLedger};
use super::{VulkanContext, VulkanError, VulkanResult};

/// Memory flags for CPU-written buffers
pub const HOST_COHERENT: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw()
        | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Buffer with its own memory allocation
pub struct Buffer {
    device: Device,
    ledger: Arc<AllocationLedger>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    allocation_size: vk::DeviceSize,
    properties: vk::MemoryPropertyFlags,
}

impl Buffer {
    /// Allocate a buffer of `size` bytes whose memory has `properties`
    pub fn new(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "Cannot create a zero-sized buffer".to_string(),
            });
        }

        let device = context.device().clone();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory = context
            .find_memory_type(requirements.memory_type_bits, properties)
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
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        // From here on Drop frees the buffer and its memory
        let ledger = Arc::clone(context.ledger());
        ledger.register(AllocationKind::Buffer, requirements.size);
        let buffer = Self {
            device,
            ledger,
            buffer,
            memory,
            size,
            allocation_size: requirements.size,
            properties,
        };

        unsafe { buffer.device.bind_buffer_memory(buffer.buffer, buffer.memory, 0)? };
        Ok(buffer)
    }

    /// Host-visible, coherent buffer holding a copy of `bytes`
    pub fn with_data(
        context: &VulkanContext,
        usage: vk::BufferUsageFlags,
        bytes: &[u8],
    ) -> VulkanResult<Self> {
        let buffer = Self::new(context, bytes.len() as vk::DeviceSize, usage, HOST_COHERENT)?;
        buffer.write_bytes(0, bytes)?;
        Ok(buffer)
    }

    /// Device-local buffer filled from `bytes` through a staging copy
    pub fn device_local(
        context: &VulkanContext,
        usage: vk::BufferUsageFlags,
        bytes: &[u8],
    ) -> VulkanResult<Self> {
        let staging = Self::with_data(context, vk::BufferUsageFlags::TRANSFER_SRC, bytes)?;
        let buffer = Self::new(
            context,
            staging.size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        context
            .command_pool()
            .one_shot(context.graphics_queue(), |recorder| {
                recorder.copy_buffer(staging.handle(), buffer.handle(), staging.size);
                Ok(())
            })?;

        Ok(buffer)
    }

    /// Copy `bytes` into the buffer at `offset`
    pub fn write_bytes(&self, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()> {
        if !self.properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
            return Err(VulkanError::InvalidOperation {
                reason: "Buffer memory is not host visible".to_string(),
            });
        }
        let end = offset + bytes.len() as vk::DeviceSize;
        if end > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Write of {} bytes at {} overruns {}-byte buffer",
                    bytes.len(),
                    offset,
                    self.size
                ),
            });
        }
        if bytes.is_empty() {
            return Ok(());
        }

        unsafe {
            let ptr = self.device.map_memory(
                self.memory,
                offset,
                bytes.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Requested size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
        self.ledger.release(AllocationKind::Buffer, self.allocation_size);
    }
}

/// Destination of a bounds-checked uniform write
///
/// Implemented by GPU uniform buffers and by plain byte vectors, so the
/// per-frame bookkeeping can be exercised without a device.
pub trait UniformWrite {
    /// Bytes the destination holds
    fn capacity(&self) -> u64;

    /// Overwrite the start of the destination with `bytes`
    ///
    /// Callers guarantee `bytes.len() <= capacity()`.
    fn write_prefix(&mut self, bytes: &[u8]) -> VulkanResult<()>;
}

impl UniformWrite for Buffer {
    fn capacity(&self) -> u64 {
        self.size
    }

    fn write_prefix(&mut self, bytes: &[u8]) -> VulkanResult<()> {
        self.write_bytes(0, bytes)
    }
}

impl UniformWrite for Vec<u8> {
    fn capacity(&self) -> u64 {
        self.len() as u64
    }

    fn write_prefix(&mut self, bytes: &[u8]) -> VulkanResult<()> {
        self[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
