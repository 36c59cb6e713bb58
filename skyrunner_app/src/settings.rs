//! Game settings that live next to the engine settings in `skyrunner.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use skyrunner_core::config::{Config, ConfigError};

use crate::course::CourseConfig;

/// `[game]` and `[course]` tables; the engine tables in the same file are ignored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Asset locations
    pub game: GameConfig,
    /// Course layout
    pub course: CourseConfig,
}

impl Config for GameSettings {}

/// Where the game finds its art
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Root holding `models/` and `textures/`
    pub asset_dir: String,
    /// Ship model scale
    pub ship_scale: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            asset_dir: "skyrunner_app/resources".to_string(),
            ship_scale: 0.35,
        }
    }
}

impl GameConfig {
    /// `<asset_dir>/models/<name>`
    pub fn model_path(&self, name: &str) -> PathBuf {
        Path::new(&self.asset_dir).join("models").join(name)
    }

    /// `<asset_dir>/textures/<name>`
    pub fn texture_path(&self, name: &str) -> PathBuf {
        Path::new(&self.asset_dir).join("textures").join(name)
    }

    /// `<asset_dir>/textures`
    pub fn texture_dir(&self) -> PathBuf {
        Path::new(&self.asset_dir).join("textures")
    }
}

impl GameSettings {
    /// Reject values that would make the course or the ship degenerate
    pub fn validate(&self) -> Result<(), ConfigError> {
        let course = &self.course;
        let invalid = |field: &'static str, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        if self.game.ship_scale <= 0.0 {
            return invalid("game.ship_scale", "must be positive");
        }
        let (min_radius, max_radius) = course.asteroid_radius;
        if min_radius <= 0.0 || max_radius < min_radius {
            return invalid("course.asteroid_radius", "needs 0 < min <= max");
        }
        if course.crystal_radius <= 0.0 || course.ship_radius < 0.0 {
            return invalid("course.crystal_radius", "radii must be positive");
        }
        if course.start_clearance < 0.0 || course.field_radius <= 0.0 {
            return invalid("course.field_radius", "distances must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyrunner_core::config::ConfigFormat;

    #[test]
    fn test_tables_parse_beside_engine_settings() {
        let settings: GameSettings = ConfigFormat::Toml
            .parse(concat!(
                "[window]\nwidth = 1024\n\n",
                "[game]\nasset_dir = \"art\"\n\n",
                "[course]\nseed = 99\nasteroids = 3\n",
            ))
            .unwrap();
        assert_eq!(settings.course.seed, 99);
        assert_eq!(settings.course.asteroids, 3);
        assert_eq!(settings.course.crystals, CourseConfig::default().crystals);
        assert_eq!(settings.game.texture_path("boost.png"), Path::new("art/textures/boost.png"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_radii() {
        let mut settings = GameSettings::default();
        settings.course.asteroid_radius = (3.0, 1.0);
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field: "course.asteroid_radius", .. })
        ));

        let mut settings = GameSettings::default();
        settings.game.ship_scale = 0.0;
        assert!(settings.validate().is_err());
    }
}
