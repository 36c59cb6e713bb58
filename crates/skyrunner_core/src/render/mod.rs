//! # Rendering
//!
//! - [`frame`]: the device-independent frame protocol and its driver
//! - [`vulkan`]: device context, GPU resources and the renderer backend

pub mod frame;
pub mod vulkan;
