//! World queries consumed by the flight step

use crate::foundation::math::Vec3;

/// Game-state questions the flight model asks about a position
pub trait WorldProbe {
    /// Whether `position` overlaps a power-up crystal
    fn on_power_up(&self, position: &Vec3) -> bool;

    /// Whether `position` intersects an obstacle
    fn collides(&self, position: &Vec3) -> bool;

    /// Whether `position` is inside the active race checkpoint
    fn at_checkpoint(&self, _position: &Vec3) -> bool {
        false
    }
}

/// Flat, empty world with no obstacles and no power-ups
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSpace;

impl WorldProbe for OpenSpace {
    fn on_power_up(&self, _position: &Vec3) -> bool {
        false
    }

    fn collides(&self, _position: &Vec3) -> bool {
        false
    }
}

/// A sphere in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Center
    pub center: Vec3,
    /// Radius
    pub radius: f32,
}

impl Sphere {
    /// Create a sphere
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Whether `point` lies inside or on the surface
    pub fn contains(&self, point: &Vec3) -> bool {
        (point - self.center).norm_squared() <= self.radius * self.radius
    }
}

/// Obstacles and power-ups approximated by spheres
#[derive(Debug, Clone, Default)]
pub struct SphereField {
    obstacles: Vec<Sphere>,
    power_ups: Vec<Sphere>,
    /// Extra radius added around the controlled object
    pub clearance: f32,
}

impl SphereField {
    /// Empty field
    pub fn new(clearance: f32) -> Self {
        Self { clearance, ..Self::default() }
    }

    /// Add an obstacle
    pub fn with_obstacle(mut self, sphere: Sphere) -> Self {
        self.obstacles.push(sphere);
        self
    }

    /// Add a power-up
    pub fn with_power_up(mut self, sphere: Sphere) -> Self {
        self.power_ups.push(sphere);
        self
    }

    /// Obstacles in insertion order
    pub fn obstacles(&self) -> &[Sphere] {
        &self.obstacles
    }

    /// Power-ups in insertion order
    pub fn power_ups(&self) -> &[Sphere] {
        &self.power_ups
    }

    fn hits(&self, spheres: &[Sphere], position: &Vec3) -> bool {
        spheres
            .iter()
            .any(|s| Sphere::new(s.center, s.radius + self.clearance).contains(position))
    }
}

impl WorldProbe for SphereField {
    fn on_power_up(&self, position: &Vec3) -> bool {
        self.hits(&self.power_ups, position)
    }

    fn collides(&self, position: &Vec3) -> bool {
        self.hits(&self.obstacles, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_space_is_empty() {
        let p = Vec3::new(5.0, 0.0, -3.0);
        assert!(!OpenSpace.collides(&p));
        assert!(!OpenSpace.on_power_up(&p));
    }

    #[test]
    fn test_sphere_field_uses_clearance() {
        let field = SphereField::new(0.5)
            .with_obstacle(Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0))
            .with_power_up(Sphere::new(Vec3::new(3.0, 0.0, 0.0), 0.5));

        assert!(field.collides(&Vec3::new(0.0, 0.0, -8.6)));
        assert!(!field.collides(&Vec3::new(0.0, 0.0, -8.4)));
        assert!(field.on_power_up(&Vec3::new(2.1, 0.0, 0.0)));
        assert!(!field.on_power_up(&Vec3::zeros()));
    }
}
