//! Race course layout: asteroids to dodge and crystals to collect
//!
//! The layout is generated from a seed so every run of the same settings
//! flies through the same field.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use skyrunner_core::foundation::math::{axis_rotation, Mat4, Vec3};
use skyrunner_core::simulation::world::Sphere;
use skyrunner_core::simulation::{SphereField, WorldProbe};

/// Course generation settings, read from the `[course]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseConfig {
    /// RNG seed for the layout
    pub seed: u64,
    /// Number of asteroids
    pub asteroids: usize,
    /// Number of power-up crystals
    pub crystals: usize,
    /// Asteroid radius range
    pub asteroid_radius: (f32, f32),
    /// Nothing spawns closer than this to the start
    pub start_clearance: f32,
    /// Asteroids spawn inside this distance from the origin
    pub field_radius: f32,
    /// Crystals sit on a ring of this radius around the start
    pub crystal_ring: f32,
    /// Crystal pickup radius
    pub crystal_radius: f32,
    /// Radius of the ship used for every overlap test
    pub ship_radius: f32,
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            asteroids: 15,
            crystals: 9,
            asteroid_radius: (1.5, 4.0),
            start_clearance: 8.0,
            field_radius: 55.0,
            crystal_ring: 20.0,
            crystal_radius: 0.8,
            ship_radius: 0.4,
        }
    }
}

/// A tumbling asteroid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Asteroid {
    pub body: Sphere,
    pub spin_axis: Vec3,
    /// Radians per second
    pub spin_rate: f32,
}

impl Asteroid {
    /// World matrix at simulation time `time`
    pub fn transform(&self, time: f32) -> Mat4 {
        Mat4::new_translation(&self.body.center)
            * axis_rotation(&self.spin_axis, self.spin_rate * time).to_homogeneous()
            * Mat4::new_scaling(self.body.radius)
    }
}

/// Generated course and the collision field built from it
#[derive(Debug, Clone)]
pub struct Course {
    asteroids: Vec<Asteroid>,
    field: SphereField,
}

impl Course {
    /// Lay out asteroids and crystals from `config`
    pub fn generate(config: &CourseConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let (min_radius, max_radius) = config.asteroid_radius;
        let max_radius = max_radius.max(min_radius);
        let outer = config.field_radius.max(config.start_clearance + max_radius + 1.0);
        let mut field = SphereField::new(config.ship_radius);

        let mut asteroids = Vec::with_capacity(config.asteroids);
        // Bounded rejection sampling
        let mut attempts = 0;
        while asteroids.len() < config.asteroids && attempts < config.asteroids * 100 {
            attempts += 1;
            let radius = rng.gen_range(min_radius..=max_radius);
            let center = random_direction(&mut rng) * rng.gen_range(0.0..outer);
            if center.norm() < config.start_clearance + radius {
                continue;
            }
            let body = Sphere::new(center, radius);
            asteroids.push(Asteroid {
                body,
                spin_axis: random_direction(&mut rng),
                spin_rate: rng.gen_range(0.1..0.6),
            });
            field = field.with_obstacle(body);
        }
        if asteroids.len() < config.asteroids {
            log::warn!("Placed {} of {} asteroids", asteroids.len(), config.asteroids);
        }

        for i in 0..config.crystals {
            let angle = i as f32 / config.crystals as f32 * std::f32::consts::TAU;
            let height = rng.gen_range(-3.0..3.0);
            let center = Vec3::new(
                config.crystal_ring * angle.sin(),
                height,
                -config.crystal_ring * angle.cos(),
            );
            let blocked = asteroids
                .iter()
                .any(|a| (a.body.center - center).norm() < a.body.radius + config.crystal_radius);
            if !blocked {
                field = field.with_power_up(Sphere::new(center, config.crystal_radius));
            }
        }

        log::info!(
            "Course {}: {} asteroids, {} crystals",
            config.seed,
            asteroids.len(),
            field.power_ups().len()
        );
        Self { asteroids, field }
    }

    /// Asteroids in spawn order; index `i` is obstacle `i` of the field
    pub fn asteroids(&self) -> &[Asteroid] {
        &self.asteroids
    }

    /// Crystal pickup spheres
    pub fn crystals(&self) -> &[Sphere] {
        self.field.power_ups()
    }
}

impl WorldProbe for Course {
    fn on_power_up(&self, position: &Vec3) -> bool {
        self.field.on_power_up(position)
    }

    fn collides(&self, position: &Vec3) -> bool {
        self.field.collides(position)
    }
}

fn random_direction(rng: &mut impl Rng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let length = v.norm();
        if length > 1e-3 && length <= 1.0 {
            return v / length;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_same_seed_same_course() {
        let config = CourseConfig::default();
        let a = Course::generate(&config);
        let b = Course::generate(&config);
        assert_eq!(a.asteroids(), b.asteroids());
        assert_eq!(a.crystals(), b.crystals());
        assert_eq!(a.asteroids().len(), config.asteroids);
    }

    #[test]
    fn test_start_is_clear() {
        let course = Course::generate(&CourseConfig::default());
        assert!(!course.collides(&Vec3::zeros()));
        assert!(!course.on_power_up(&Vec3::zeros()));
        for asteroid in course.asteroids() {
            assert!(course.collides(&asteroid.body.center));
        }
        for crystal in course.crystals() {
            assert!(course.on_power_up(&crystal.center));
        }
    }

    #[test]
    fn test_asteroid_transform_scales_by_radius() {
        let asteroid = Asteroid {
            body: Sphere::new(Vec3::new(1.0, 2.0, 3.0), 2.5),
            spin_axis: Vec3::y(),
            spin_rate: 0.5,
        };
        let m = asteroid.transform(0.0);
        assert_relative_eq!(m[(0, 0)], 2.5);
        assert_relative_eq!(m[(0, 3)], 1.0);
        assert_relative_eq!(m[(2, 3)], 3.0);
    }
}
