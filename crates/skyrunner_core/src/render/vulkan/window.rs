//! Window management using GLFW
//!
//! Owns the GLFW handle and window, records framebuffer resizes for the
//! frame loop and samples the keyboard into a [`ControlInput`].

use ash::vk;
use thiserror::Error;

use crate::core::config::WindowConfig;
use crate::input::{ControlInput, ControlKey};

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The OS refused to create the window
    #[error("Window creation failed")]
    CreationFailed,

    /// Other GLFW failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper
pub struct Window {
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    glfw: glfw::Glfw,
    resized: bool,
    reload_requested: bool,
}

/// What a window event means to the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSignal {
    /// Framebuffer changed size
    Resized,
    /// Escape was pressed
    Close,
    /// F5 was pressed; assets should be reloaded
    Reload,
}

impl WindowSignal {
    /// Classify a GLFW event; `None` for events the loop ignores
    pub fn from_event(event: &glfw::WindowEvent) -> Option<Self> {
        match event {
            glfw::WindowEvent::FramebufferSize(..) => Some(Self::Resized),
            glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                Some(Self::Close)
            }
            glfw::WindowEvent::Key(glfw::Key::F5, _, glfw::Action::Press, _) => Some(Self::Reload),
            _ => None,
        }
    }
}

impl Window {
    /// Create a window without a client API, ready for a Vulkan surface
    pub fn new(config: &WindowConfig) -> WindowResult<Self> {
        let mut glfw =
            glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::GlfwError("Vulkan is not supported by GLFW".to_string()));
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(config.resizable));

        let (mut window, events) = glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!("Created {}x{} window '{}'", config.width, config.height, config.title);

        Ok(Self {
            window,
            events,
            glfw,
            resized: false,
            reload_requested: false,
        })
    }

    /// Whether the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Pump the event queue, noting framebuffer resizes, Escape and F5
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        self.drain_events();
    }

    /// Block until at least one event arrives; used while minimized
    pub fn wait_events(&mut self) {
        self.glfw.wait_events();
        self.drain_events();
    }

    fn drain_events(&mut self) {
        for (_, event) in glfw::flush_messages(&self.events) {
            match WindowSignal::from_event(&event) {
                Some(WindowSignal::Resized) => {
                    log::debug!("Framebuffer resized: {:?}", event);
                    self.resized = true;
                }
                Some(WindowSignal::Close) => self.window.set_should_close(true),
                Some(WindowSignal::Reload) => {
                    log::info!("Asset reload requested");
                    self.reload_requested = true;
                }
                None => {}
            }
        }
    }

    /// Return and clear the resize flag
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    /// Return and clear the reload request
    pub fn take_reload_requested(&mut self) -> bool {
        std::mem::take(&mut self.reload_requested)
    }

    /// Current framebuffer size in pixels; zero while minimized
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    /// Sample the keyboard and mouse into control axes
    pub fn sample_controls(&self) -> ControlInput {
        ControlInput::from_pressed(|control| self.is_pressed(control))
    }

    fn is_pressed(&self, control: ControlKey) -> bool {
        let key_down = |key| self.window.get_key(key) != glfw::Action::Release;
        match control {
            ControlKey::StrafeLeft => key_down(glfw::Key::A),
            ControlKey::StrafeRight => key_down(glfw::Key::D),
            ControlKey::Rise => key_down(glfw::Key::R),
            ControlKey::Sink => key_down(glfw::Key::F),
            ControlKey::Forward => key_down(glfw::Key::W),
            ControlKey::Reverse => key_down(glfw::Key::S),
            ControlKey::PitchUp => key_down(glfw::Key::Down),
            ControlKey::PitchDown => key_down(glfw::Key::Up),
            ControlKey::YawLeft => key_down(glfw::Key::Left),
            ControlKey::YawRight => key_down(glfw::Key::Right),
            ControlKey::RollLeft => key_down(glfw::Key::Q),
            ControlKey::RollRight => key_down(glfw::Key::E),
            ControlKey::Fire => {
                key_down(glfw::Key::Space)
                    || self.window.get_mouse_button(glfw::MouseButtonLeft) != glfw::Action::Release
            }
        }
    }

    /// Instance extensions GLFW needs for surface creation
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Failed to get required extensions".to_string()))
    }

    /// Create a Vulkan surface for this window
    pub fn create_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!("Failed to create Vulkan surface: {result:?}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: glfw::Key, action: glfw::Action) -> glfw::WindowEvent {
        glfw::WindowEvent::Key(key, 0, action, glfw::Modifiers::empty())
    }

    #[test]
    fn test_event_signals() {
        assert_eq!(
            WindowSignal::from_event(&glfw::WindowEvent::FramebufferSize(640, 480)),
            Some(WindowSignal::Resized)
        );
        assert_eq!(
            WindowSignal::from_event(&key(glfw::Key::Escape, glfw::Action::Press)),
            Some(WindowSignal::Close)
        );
        assert_eq!(
            WindowSignal::from_event(&key(glfw::Key::F5, glfw::Action::Press)),
            Some(WindowSignal::Reload)
        );
    }

    #[test]
    fn test_reload_fires_on_press_only() {
        assert_eq!(WindowSignal::from_event(&key(glfw::Key::F5, glfw::Action::Release)), None);
        assert_eq!(WindowSignal::from_event(&key(glfw::Key::F5, glfw::Action::Repeat)), None);
        assert_eq!(WindowSignal::from_event(&key(glfw::Key::W, glfw::Action::Press)), None);
    }
}
