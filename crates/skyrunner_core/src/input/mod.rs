//! Six-axis control input
//!
//! The window layer samples raw key state once per frame and turns it into a
//! [`ControlInput`]: a motion vector, a rotation vector and the fire button.

use crate::foundation::math::Vec3;

/// Logical controls the flight model reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKey {
    /// Strafe left (-x)
    StrafeLeft,
    /// Strafe right (+x)
    StrafeRight,
    /// Rise (+y)
    Rise,
    /// Sink (-y)
    Sink,
    /// Thrust forward (+z)
    Forward,
    /// Brake and reverse (-z)
    Reverse,
    /// Pitch up (+x rotation)
    PitchUp,
    /// Pitch down (-x rotation)
    PitchDown,
    /// Yaw left (-y rotation)
    YawLeft,
    /// Yaw right (+y rotation)
    YawRight,
    /// Roll left (+z rotation)
    RollLeft,
    /// Roll right (-z rotation)
    RollRight,
    /// Boost trigger
    Fire,
}

impl ControlKey {
    /// Every control, in a stable order
    pub const ALL: [Self; 13] = [
        Self::StrafeLeft,
        Self::StrafeRight,
        Self::Rise,
        Self::Sink,
        Self::Forward,
        Self::Reverse,
        Self::PitchUp,
        Self::PitchDown,
        Self::YawLeft,
        Self::YawRight,
        Self::RollLeft,
        Self::RollRight,
        Self::Fire,
    ];
}

/// Raw per-frame control state, every axis in `[-1, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlInput {
    /// Translation intent; `z > 0` is forward thrust
    pub motion: Vec3,
    /// Rotation intent around the ship's x, y and z axes
    pub rotation: Vec3,
    /// Fire / boost trigger
    pub fire: bool,
}

impl ControlInput {
    /// Build from axis values, clamping each component to `[-1, 1]`
    pub fn new(motion: Vec3, rotation: Vec3, fire: bool) -> Self {
        Self {
            motion: motion.map(|v| v.clamp(-1.0, 1.0)),
            rotation: rotation.map(|v| v.clamp(-1.0, 1.0)),
            fire,
        }
    }

    /// Constant forward thrust with no rotation
    pub fn forward() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 1.0), Vec3::zeros(), false)
    }

    /// Sample a set of logical controls.
    ///
    /// Opposing keys cancel out, so holding both strafe keys yields zero.
    pub fn from_pressed(pressed: impl Fn(ControlKey) -> bool) -> Self {
        let axis = |negative: ControlKey, positive: ControlKey| -> f32 {
            f32::from(u8::from(pressed(positive))) - f32::from(u8::from(pressed(negative)))
        };

        let motion = Vec3::new(
            axis(ControlKey::StrafeLeft, ControlKey::StrafeRight),
            axis(ControlKey::Sink, ControlKey::Rise),
            axis(ControlKey::Reverse, ControlKey::Forward),
        );
        let rotation = Vec3::new(
            axis(ControlKey::PitchDown, ControlKey::PitchUp),
            axis(ControlKey::YawLeft, ControlKey::YawRight),
            axis(ControlKey::RollRight, ControlKey::RollLeft),
        );

        Self::new(motion, rotation, pressed(ControlKey::Fire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_axes() {
        let input = ControlInput::new(Vec3::new(3.0, -2.0, 0.5), Vec3::new(-9.0, 0.0, 1.0), false);

        assert_eq!(input.motion, Vec3::new(1.0, -1.0, 0.5));
        assert_eq!(input.rotation, Vec3::new(-1.0, 0.0, 1.0));
    }

    #[test]
    fn test_from_pressed_maps_thrust_and_roll() {
        let input = ControlInput::from_pressed(|key| {
            matches!(key, ControlKey::Forward | ControlKey::RollLeft | ControlKey::Fire)
        });

        assert_eq!(input.motion, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(input.rotation, Vec3::new(0.0, 0.0, 1.0));
        assert!(input.fire);
    }

    #[test]
    fn test_opposing_keys_cancel() {
        let input = ControlInput::from_pressed(|key| {
            matches!(key, ControlKey::StrafeLeft | ControlKey::StrafeRight | ControlKey::YawLeft)
        });

        assert_eq!(input.motion.x, 0.0);
        assert_eq!(input.rotation.y, -1.0);
        assert!(!input.fire);
    }

    #[test]
    fn test_nothing_pressed_is_neutral() {
        assert_eq!(ControlInput::from_pressed(|_| false), ControlInput::default());
    }
}
