//! Vulkan rendering backend
//!
//! Every wrapper here takes the [`VulkanContext`] at construction and keeps
//! its own clone of the device handle; nothing reaches back into the context
//! afterwards. Resources are released by `Drop` in field order.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor;
pub mod framebuffer;
pub mod image;
pub mod memory;
pub mod model;
pub mod pipeline;
pub mod render_pass;
pub mod renderer;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod vertex_descriptor;
pub mod window;

pub use buffer::{Buffer, UniformWrite};
pub use commands::{CommandPool, CommandRecorder};
pub use context::{PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanResult};
pub use descriptor::{
    DescriptorElement, DescriptorPool, DescriptorSet, DescriptorSetLayout,
    DescriptorSetLayoutBuilder,
};
pub use image::{Image, ImageDesc};
pub use memory::{AllocationLedger, AllocationStats};
pub use model::{Drawable, Model};
pub use pipeline::{FixedFunctionState, Pipeline, ShaderModule};
pub use renderer::{record_queue, DrawItem, VulkanRenderer};
pub use swapchain::Swapchain;
pub use texture::{SamplerSettings, Texture};
pub use vertex_descriptor::{
    AttributeSet, AttributeUsage, VertexAttribute, VertexDescriptor, VertexLayoutError,
};
pub use window::{Window, WindowError, WindowSignal};
