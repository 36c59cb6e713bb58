//! Core configuration types

pub mod config;

pub use config::{ApplicationConfig, DescriptorPoolConfig, RendererConfig, WindowConfig};
