//! # Skyrunner Core
//!
//! Frame orchestration, GPU resource wrappers and flight simulation for a
//! Vulkan space racer.
//!
//! ## Features
//!
//! - **Frame Protocol**: two frames in flight, fence-guarded uniform copies,
//!   swapchain rebuilds on resize or out-of-date results
//! - **GPU Resources**: buffers, images, textures and cubemaps, descriptor
//!   sets, pipelines and models, all tied to one device context
//! - **Flight Simulation**: damped speed and camera, quaternion rotation,
//!   boost and bounce, as a pure state-threading step
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skyrunner_core::prelude::*;
//!
//! struct Race {
//!     world: OpenSpace,
//! }
//!
//! impl Application for Race {
//!     fn init(&mut self, _: &VulkanContext, _: &VulkanRenderer<'_>) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn world(&self) -> &dyn WorldProbe {
//!         &self.world
//!     }
//!
//!     fn update(&mut self, _frame: usize, _transforms: &FrameTransforms) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn record(&self, _recorder: &mut CommandRecorder, _frame: usize) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn resize(&mut self, _: &VulkanContext, _: &VulkanRenderer<'_>) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn teardown(&mut self) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     skyrunner_core::foundation::logging::init();
//!     let mut race = Race { world: OpenSpace };
//!     Engine::run(ApplicationConfig::default(), &mut race)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

pub mod assets;
pub mod config;
pub mod core;
pub mod foundation;
pub mod input;
pub mod render;
pub mod simulation;

mod application;
mod engine;

pub use application::{AppError, Application, Lifecycle, LifecycleStage};
pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{AssetError, CubemapPixels, Geometry, GeometrySource, TexturePixels},
        config::Config,
        core::config::{ApplicationConfig, RendererConfig, WindowConfig},
        foundation::math::{Mat4, Quat, Vec3},
        input::ControlInput,
        render::frame::{DrawPass, RenderQueue, MAX_FRAMES_IN_FLIGHT},
        render::vulkan::{
            record_queue, CommandRecorder, DescriptorElement, DescriptorPool, DescriptorSet,
            DescriptorSetLayoutBuilder, DrawItem, Drawable, Model, Pipeline, SamplerSettings,
            ShaderModule, Texture, VertexDescriptor, VulkanContext, VulkanError, VulkanRenderer,
        },
        simulation::{
            FlightTuning, FrameTransforms, OpenSpace, SimulationState, SphereField, WorldProbe,
        },
        AppError, Application, Engine, EngineError,
    };
}
