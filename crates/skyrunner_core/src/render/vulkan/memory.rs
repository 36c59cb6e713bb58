//! Device memory bookkeeping
//!
//! Memory type selection is a pure function over the physical device's
//! memory properties. Every buffer and image allocation is recorded in an
//! [`AllocationLedger`] so shutdown can report anything still alive.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use ash::vk;

use super::{VulkanError, VulkanResult};

/// Find a memory type allowed by `type_filter` that has all of `properties`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    memory_properties.memory_types[..memory_properties.memory_type_count as usize]
        .iter()
        .enumerate()
        .find(|(i, memory_type)| {
            type_filter & (1 << i) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(i, _)| i as u32)
        .ok_or(VulkanError::NoSuitableMemoryType)
}

/// Map a failed `vkAllocateMemory` to an error carrying the requested size
///
/// Out-of-memory results keep the size; anything else is passed through.
pub fn allocation_error(result: vk::Result, requested: vk::DeviceSize) -> VulkanError {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            VulkanError::OutOfMemory { requested }
        }
        other => VulkanError::Api(other),
    }
}

/// Kind of GPU object holding an allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationKind {
    /// `vk::Buffer`
    Buffer,
    /// `vk::Image`
    Image,
}

/// Live allocation counters shared by every resource created from a context
#[derive(Debug, Default)]
pub struct AllocationLedger {
    buffers: AtomicUsize,
    images: AtomicUsize,
    bytes: AtomicU64,
}

/// Snapshot of an [`AllocationLedger`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocationStats {
    /// Live buffers
    pub buffers: usize,
    /// Live images
    pub images: usize,
    /// Bytes of device memory held by them
    pub bytes: u64,
}

impl AllocationStats {
    /// Whether nothing is allocated
    pub fn is_empty(&self) -> bool {
        self.buffers == 0 && self.images == 0
    }
}

impl AllocationLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new allocation of `bytes`
    pub fn register(&self, kind: AllocationKind, bytes: u64) {
        self.counter(kind).fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record that an allocation of `bytes` was freed
    pub fn release(&self, kind: AllocationKind, bytes: u64) {
        self.counter(kind).fetch_sub(1, Ordering::Relaxed);
        self.bytes.fetch_sub(bytes, Ordering::Relaxed);
    }

    fn counter(&self, kind: AllocationKind) -> &AtomicUsize {
        match kind {
            AllocationKind::Buffer => &self.buffers,
            AllocationKind::Image => &self.images,
        }
    }

    /// Current counts
    pub fn stats(&self) -> AllocationStats {
        AllocationStats {
            buffers: self.buffers.load(Ordering::Relaxed),
            images: self.images.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }

    /// Log any allocation still alive; returns the snapshot
    pub fn report_leaks(&self) -> AllocationStats {
        let stats = self.stats();
        if stats.is_empty() {
            log::debug!("All GPU allocations released");
        } else {
            log::warn!(
                "Leaked GPU allocations at shutdown: {} buffers, {} images, {} bytes",
                stats.buffers,
                stats.images,
                stats.bytes
            );
        }
        stats
    }
}
