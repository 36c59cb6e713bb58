//! Application trait and lifecycle management

use thiserror::Error;

use crate::assets::AssetError;
use crate::config::ConfigError;
use crate::render::frame::FrameError;
use crate::render::vulkan::{CommandRecorder, VulkanContext, VulkanError, VulkanRenderer};
use crate::simulation::{FrameTransforms, WorldProbe};

/// Game content driven by the engine
///
/// The engine calls these in a fixed order: `init` once, then per frame
/// `update` followed by `record`, `resize` whenever the swapchain was
/// rebuilt, `reload` when the user asks for fresh assets, and `teardown`
/// once after the GPU has gone idle.
pub trait Application {
    /// Create GPU resources and build pipelines against `renderer`
    fn init(
        &mut self,
        context: &VulkanContext,
        renderer: &VulkanRenderer<'_>,
    ) -> Result<(), AppError>;

    /// World the flight simulation probes
    fn world(&self) -> &dyn WorldProbe;

    /// Write uniforms for frame slot `frame`
    ///
    /// The slot's previous submission has finished when this is called.
    fn update(&mut self, frame: usize, transforms: &FrameTransforms) -> Result<(), AppError>;

    /// Record draws into the open render pass, using `frame`'s descriptor copies
    fn record(&self, recorder: &mut CommandRecorder, frame: usize) -> Result<(), AppError>;

    /// Rebuild pipelines for the new render pass and extent
    fn resize(
        &mut self,
        context: &VulkanContext,
        renderer: &VulkanRenderer<'_>,
    ) -> Result<(), AppError>;

    /// Re-read assets from disk; no submitted frame is still in flight
    fn reload(&mut self, _context: &VulkanContext) -> Result<(), AppError> {
        Ok(())
    }

    /// Release GPU resources; the device is idle
    fn teardown(&mut self);
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// GPU call failed
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// Frame protocol failed
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Asset could not be loaded
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Configuration could not be loaded or is invalid
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Lifecycle callback invoked out of order
    #[error("Cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current stage
        from: LifecycleStage,
        /// Requested stage
        to: LifecycleStage,
    },

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),
}

/// Where an application is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    /// Constructed, no GPU resources yet
    Created,
    /// `init` succeeded
    Initialized,
    /// Inside the frame loop
    Running,
    /// `teardown` ran
    TornDown,
}

/// Guards the order of lifecycle callbacks
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    stage: LifecycleStage,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Start in [`LifecycleStage::Created`]
    pub fn new() -> Self {
        Self {
            stage: LifecycleStage::Created,
        }
    }

    /// Current stage
    pub fn stage(&self) -> LifecycleStage {
        self.stage
    }

    /// Move to `next` if the transition is allowed
    ///
    /// Teardown is reachable from every stage so partially initialized
    /// content can still release what it created.
    pub fn advance(&mut self, next: LifecycleStage) -> Result<(), AppError> {
        use LifecycleStage::*;
        let allowed = matches!(
            (self.stage, next),
            (Created, Initialized)
                | (Initialized, Running)
                | (Created | Initialized | Running, TornDown)
        );
        if !allowed {
            return Err(AppError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        log::debug!("Application lifecycle: {:?} -> {:?}", self.stage, next);
        self.stage = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_happy_path() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(LifecycleStage::Initialized).unwrap();
        lifecycle.advance(LifecycleStage::Running).unwrap();
        lifecycle.advance(LifecycleStage::TornDown).unwrap();
        assert_eq!(lifecycle.stage(), LifecycleStage::TornDown);
    }

    #[test]
    fn test_lifecycle_rejects_out_of_order() {
        let mut lifecycle = Lifecycle::new();
        assert!(matches!(
            lifecycle.advance(LifecycleStage::Running),
            Err(AppError::InvalidTransition {
                from: LifecycleStage::Created,
                to: LifecycleStage::Running
            })
        ));

        lifecycle.advance(LifecycleStage::TornDown).unwrap();
        assert!(lifecycle.advance(LifecycleStage::Initialized).is_err());
        assert!(lifecycle.advance(LifecycleStage::TornDown).is_err());
    }
}
