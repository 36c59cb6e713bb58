//! # Application Configuration
//!
//! Everything supplied once at startup and immutable afterwards: the window,
//! the renderer's fixed resources and the flight tuning constants.
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//! resizable = true
//! title = "Skyrunner"
//!
//! [renderer.descriptor_pool]
//! uniform_blocks = 64
//! textures = 32
//! sets = 64
//! ```

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};
use crate::simulation::FlightTuning;

/// Window creation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial framebuffer width in pixels
    pub width: u32,
    /// Initial framebuffer height in pixels
    pub height: u32,
    /// Whether the user may resize the window
    pub resizable: bool,
    /// Title bar text
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            resizable: true,
            title: "Skyrunner".to_string(),
        }
    }
}

impl WindowConfig {
    /// Set the initial size
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set whether the window is resizable
    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    /// Aspect ratio of the initial size
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Descriptor pool capacity, multiplied by the number of frames in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorPoolConfig {
    /// Uniform buffer descriptors per frame
    pub uniform_blocks: u32,
    /// Combined image sampler descriptors per frame
    pub textures: u32,
    /// Descriptor sets per frame
    pub sets: u32,
}

impl Default for DescriptorPoolConfig {
    fn default() -> Self {
        Self {
            uniform_blocks: 64,
            textures: 32,
            sets: 64,
        }
    }
}

/// Vulkan renderer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Validation layers; `None` follows the build profile
    pub enable_validation: Option<bool>,
    /// Background clear color (linear RGBA)
    pub clear_color: [f32; 4],
    /// Multisampled color and depth attachments
    pub msaa: bool,
    /// Upper bound for the sample count when MSAA is on
    pub max_msaa_samples: u32,
    /// Directory holding the compiled SPIR-V blobs
    pub shader_dir: String,
    /// Descriptor pool sizing
    pub descriptor_pool: DescriptorPoolConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Skyrunner".to_string(),
            enable_validation: None,
            clear_color: [0.01, 0.01, 0.03, 1.0],
            msaa: true,
            max_msaa_samples: 4,
            shader_dir: "target/shaders".to_string(),
            descriptor_pool: DescriptorPoolConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Set the clear color
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Set descriptor pool sizing
    pub fn with_descriptor_pool(mut self, pool: DescriptorPoolConfig) -> Self {
        self.descriptor_pool = pool;
        self
    }

    /// Enable or disable multisampling
    pub fn with_msaa(mut self, enabled: bool) -> Self {
        self.msaa = enabled;
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Resolve a shader file name inside `shader_dir`
    pub fn shader_path(&self, file_name: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.shader_dir).join(file_name)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Window parameters
    pub window: WindowConfig,
    /// Renderer parameters
    pub renderer: RendererConfig,
    /// Flight model constants
    pub flight: FlightTuning,
}

impl Config for ApplicationConfig {}

impl ApplicationConfig {
    /// Set window config
    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    /// Set renderer config
    pub fn with_renderer(mut self, renderer: RendererConfig) -> Self {
        self.renderer = renderer;
        self
    }

    /// Set flight tuning
    pub fn with_flight(mut self, flight: FlightTuning) -> Self {
        self.flight = flight;
        self
    }

    /// Reject values the renderer or simulation cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid {
                field: "window",
                reason: format!("size {}x{} has zero area", self.window.width, self.window.height),
            });
        }

        let color = &self.renderer.clear_color;
        if color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ConfigError::Invalid {
                field: "renderer.clear_color",
                reason: format!("{color:?} is outside [0, 1]"),
            });
        }

        let pool = &self.renderer.descriptor_pool;
        if pool.uniform_blocks == 0 || pool.sets == 0 {
            return Err(ConfigError::Invalid {
                field: "renderer.descriptor_pool",
                reason: "uniform blocks and sets must be non-zero".to_string(),
            });
        }

        let samples = self.renderer.max_msaa_samples;
        if !samples.is_power_of_two() || samples > 64 {
            return Err(ConfigError::Invalid {
                field: "renderer.max_msaa_samples",
                reason: format!("{samples} is not a power of two up to 64"),
            });
        }

        self.flight.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ApplicationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let config = ApplicationConfig::default()
            .with_window(WindowConfig::default().with_size(0, 600));

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "window", .. })
        ));
    }

    #[test]
    fn test_clear_color_range_is_checked() {
        let config = ApplicationConfig::default()
            .with_renderer(RendererConfig::default().with_clear_color([1.5, 0.0, 0.0, 1.0]));

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        let pool = DescriptorPoolConfig { uniform_blocks: 0, textures: 4, sets: 4 };
        let config = ApplicationConfig::default()
            .with_renderer(RendererConfig::default().with_descriptor_pool(pool));

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let text = "[window]\nwidth = 1280\nheight = 720\n";
        let config: ApplicationConfig = ConfigFormat::Toml.parse(text).unwrap();

        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.title, "Skyrunner");
        assert_eq!(config.renderer, RendererConfig::default());
    }

    #[test]
    fn test_toml_and_ron_preserve_values() {
        let config = ApplicationConfig::default()
            .with_window(WindowConfig::default().with_title("Race").with_resizable(false));

        for format in [ConfigFormat::Toml, ConfigFormat::Ron] {
            let text = format.render(&config).unwrap();
            let parsed: ApplicationConfig = format.parse(&text).unwrap();
            assert_eq!(parsed, config);
        }
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = ConfigFormat::from_path(std::path::Path::new("settings.json"));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
