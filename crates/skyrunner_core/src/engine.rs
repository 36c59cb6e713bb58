//! Core engine implementation
//!
//! Startup order is window, device context, renderer, application. Shutdown
//! drains in-flight frames, tears the application down and then releases
//! the renderer, context and window in reverse order of creation.

use ash::vk;
use thiserror::Error;

use crate::application::{AppError, Application, Lifecycle, LifecycleStage};
use crate::config::ConfigError;
use crate::core::config::ApplicationConfig;
use crate::foundation::time::Timer;
use crate::render::frame::{FrameHooks, FrameInput, FrameLoop, FrameStatus};
use crate::render::vulkan::{
    CommandRecorder, VulkanContext, VulkanError, VulkanRenderer, Window, WindowError,
};
use crate::simulation::{FlightModel, FrameTransforms, WorldProbe};

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration rejected before startup
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Window creation failed
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Device or renderer creation failed
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// Application callback failed
    #[error("Application error: {0}")]
    Application(#[from] AppError),
}

/// Runs an [`Application`] to completion
pub struct Engine;

impl Engine {
    /// Bring everything up, run until the window closes, tear down
    pub fn run<A: Application>(config: ApplicationConfig, app: &mut A) -> Result<(), EngineError> {
        config.validate()?;
        log::info!("Starting '{}'", config.window.title);

        let mut window = Window::new(&config.window)?;
        let context = VulkanContext::new(&mut window, &config.renderer)?;
        let mut renderer =
            VulkanRenderer::new(&context, &config.renderer, framebuffer_extent(&window))?;

        let mut lifecycle = Lifecycle::new();
        let result = Self::init_and_loop(
            &config,
            &mut window,
            &context,
            &mut renderer,
            app,
            &mut lifecycle,
        );

        if let Err(e) = context.wait_idle() {
            log::error!("Device did not go idle before teardown: {e}");
        }
        lifecycle.advance(LifecycleStage::TornDown)?;
        app.teardown();

        drop(renderer);
        drop(context);
        drop(window);

        match &result {
            Ok(()) => log::info!("Engine shutdown complete"),
            Err(e) => log::error!("Engine stopped: {e}"),
        }
        result
    }

    fn init_and_loop<A: Application>(
        config: &ApplicationConfig,
        window: &mut Window,
        context: &VulkanContext,
        renderer: &mut VulkanRenderer<'_>,
        app: &mut A,
        lifecycle: &mut Lifecycle,
    ) -> Result<(), EngineError> {
        app.init(context, renderer)?;
        lifecycle.advance(LifecycleStage::Initialized)?;

        let mut driver = FrameLoop::new(FlightModel::new(config.flight.clone()), &*renderer);
        let mut hooks = ContentHooks { app, context };
        let mut timer = Timer::new();

        lifecycle.advance(LifecycleStage::Running)?;
        log::info!("Starting main loop...");

        while !window.should_close() {
            window.poll_events();
            timer.update();

            let input = FrameInput {
                controls: window.sample_controls(),
                dt: timer.delta_time(),
                window: framebuffer_extent(window),
                resized: window.take_resized(),
            };

            if window.take_reload_requested() {
                driver.drain(renderer).map_err(AppError::from)?;
                hooks.app.reload(context)?;
            }

            if driver.run_frame(renderer, &mut hooks, &input)? == FrameStatus::Minimized {
                window.wait_events();
                timer.resume();
            }
        }

        driver.drain(renderer).map_err(AppError::from)?;
        log::info!(
            "Presented {} frames, {:.1} fps average",
            driver.frames_presented(),
            timer.average_fps()
        );
        Ok(())
    }
}

fn framebuffer_extent(window: &Window) -> vk::Extent2D {
    let (width, height) = window.framebuffer_size();
    vk::Extent2D { width, height }
}

/// Adapts an [`Application`] to the frame driver's callbacks
struct ContentHooks<'a, A> {
    app: &'a mut A,
    context: &'a VulkanContext,
}

impl<'ctx, A: Application> FrameHooks<VulkanRenderer<'ctx>> for ContentHooks<'_, A> {
    type Error = AppError;

    fn world(&self) -> &dyn WorldProbe {
        self.app.world()
    }

    fn update(&mut self, slot: usize, transforms: &FrameTransforms) -> Result<(), AppError> {
        self.app.update(slot, transforms)
    }

    fn record(&mut self, recorder: &mut CommandRecorder, slot: usize) -> Result<(), AppError> {
        self.app.record(recorder, slot)
    }

    fn resized(
        &mut self,
        backend: &VulkanRenderer<'ctx>,
        _extent: vk::Extent2D,
    ) -> Result<(), AppError> {
        self.app.resize(self.context, backend)
    }
}
