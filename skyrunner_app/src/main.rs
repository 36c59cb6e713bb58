//! Skyrunner
//!
//! Fly a ship through a seeded asteroid field, collecting crystals for boost.
//! Settings are read from `skyrunner.toml` in the working directory when it
//! exists; every table is optional.

mod course;
mod loaders;
mod race;
mod settings;
mod shapes;
mod vertex;

use skyrunner_core::config::{Config, ConfigError};
use skyrunner_core::core::config::ApplicationConfig;
use skyrunner_core::foundation::logging;
use skyrunner_core::render::vulkan::VertexLayoutError;
use skyrunner_core::{Engine, EngineError};
use thiserror::Error;

use crate::race::Race;
use crate::settings::GameSettings;
use crate::vertex::VertexLayouts;

const CONFIG_FILE: &str = "skyrunner.toml";

/// Everything that can stop the game before or while it runs
#[derive(Error, Debug)]
enum GameError {
    /// `skyrunner.toml` could not be read or holds bad values
    #[error("Settings error: {0}")]
    Settings(#[from] ConfigError),

    /// A vertex record does not describe a valid layout
    #[error("Vertex layout error: {0}")]
    Layout(#[from] VertexLayoutError),

    /// Startup or the frame loop failed
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

fn run() -> Result<(), GameError> {
    let config = ApplicationConfig::load_or_default(CONFIG_FILE)?;
    let settings = GameSettings::load_or_default(CONFIG_FILE)?;
    settings.validate()?;

    log::info!(
        "Window {}x{}, course seed {}",
        config.window.width,
        config.window.height,
        settings.course.seed
    );

    let mut race = Race::new(settings, config.renderer.clone(), VertexLayouts::new()?);
    Engine::run(config, &mut race)?;
    Ok(())
}

fn main() {
    logging::init();
    log::info!("Starting Skyrunner...");

    if let Err(e) = run() {
        log::error!("Skyrunner failed: {e}");
        std::process::exit(1);
    }
    log::info!("Skyrunner exited cleanly");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_errors_name_the_field() {
        let error = GameError::from(ConfigError::Invalid {
            field: "course.asteroid_radius",
            reason: "needs 0 < min <= max".to_string(),
        });
        assert!(matches!(error, GameError::Settings(_)));
        assert_eq!(
            error.to_string(),
            "Settings error: Invalid value for course.asteroid_radius: needs 0 < min <= max"
        );
    }

    #[test]
    fn test_engine_errors_keep_their_source() {
        let error = GameError::from(EngineError::from(ConfigError::Parse("bad toml".to_string())));
        assert_eq!(error.to_string(), "Engine error: Configuration error: Parse error: bad toml");
    }
}
