//! Ship and chase-camera integration
//!
//! One call to [`FlightModel::step`] per frame advances a [`SimulationState`]
//! by `dt` seconds and produces the matrices the renderer uploads. All state
//! that survives between frames (filter history, momentum, boost credit,
//! checkpoint countdown) lives in the state struct.

use serde::{Deserialize, Serialize};

use super::damping::Damped;
use super::world::WorldProbe;
use crate::config::ConfigError;
use crate::foundation::math::{
    axis_rotation, look_at, perspective_vk, rigid_transform, Mat4, Quat, Vec3,
};
use crate::input::ControlInput;

/// Flight model constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightTuning {
    /// Damping constant for move speed and field of view
    pub speed_damping: f32,
    /// Damping constant for the chase camera position
    pub camera_damping: f32,
    /// Near clip plane
    pub near_plane: f32,
    /// Far clip plane
    pub far_plane: f32,
    /// Camera offset along the ship's up axis
    pub camera_height: f32,
    /// Camera offset behind the ship
    pub camera_distance: f32,
    /// Angular speed at full stick deflection, degrees per second
    pub rotation_speed_deg: f32,
    /// Seconds of boost granted per power-up
    pub boost_credit: f32,
    /// Thrust acceleration without boost
    pub base_move_speed: f32,
    /// Thrust acceleration while boosting
    pub boost_move_speed: f32,
    /// Forward speed cap without boost
    pub cap_speed: f32,
    /// Added to the forward cap while boosting
    pub boost_extra_cap: f32,
    /// Field of view without boost, degrees
    pub base_fov_deg: f32,
    /// Field of view while boosting, degrees
    pub boost_fov_deg: f32,
    /// Distance from the origin past which the ship bounces back
    pub world_radius: f32,
    /// Reverse thrust relative to forward thrust
    pub reverse_factor: f32,
    /// Momentum multiplier applied on a bounce
    pub bounce_factor: f32,
    /// Seconds between touching a checkpoint and clearing it
    pub checkpoint_delay: f32,
}

impl Default for FlightTuning {
    fn default() -> Self {
        Self {
            speed_damping: 2.0,
            camera_damping: 8.0,
            near_plane: 0.1,
            far_plane: 200.0,
            camera_height: 0.26,
            camera_distance: 2.2,
            rotation_speed_deg: 120.0,
            boost_credit: 4.0,
            base_move_speed: 2.0,
            boost_move_speed: 8.0,
            cap_speed: 8.0,
            boost_extra_cap: 25.0,
            base_fov_deg: 45.0,
            boost_fov_deg: 100.0,
            world_radius: 68.0,
            reverse_factor: 3.0,
            bounce_factor: -3.0,
            checkpoint_delay: 2.0,
        }
    }
}

impl FlightTuning {
    /// Lowest momentum allowed: reversing is capped at a third of the forward cap
    pub fn min_momentum(&self) -> f32 {
        -self.cap_speed / 3.0
    }

    /// Highest momentum allowed given the current boost extra
    pub fn max_momentum(&self, extra: f32) -> f32 {
        self.cap_speed + extra
    }

    /// Check that the constants describe a usable flight model
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid { field, reason: reason.to_string() })
        };

        if self.speed_damping <= 0.0 || self.camera_damping <= 0.0 {
            return invalid("flight.damping", "damping constants must be positive");
        }
        if self.near_plane <= 0.0 || self.far_plane <= self.near_plane {
            return invalid("flight.near_plane", "clip planes need 0 < near < far");
        }
        if self.cap_speed <= 0.0 || self.world_radius <= 0.0 {
            return invalid("flight.cap_speed", "speed cap and world radius must be positive");
        }
        let fov_range = 1.0..179.0;
        if !fov_range.contains(&self.base_fov_deg) || !fov_range.contains(&self.boost_fov_deg) {
            return invalid("flight.fov", "field of view must be between 1 and 179 degrees");
        }
        Ok(())
    }
}

/// Everything that carries over from one frame to the next
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    /// Ship position
    pub position: Vec3,
    /// Ship orientation
    pub rotation: Quat,
    /// Signed forward speed
    pub momentum: f32,
    /// Remaining boost seconds
    pub boost_credit: f32,
    /// Whether the boost indicator is shown
    pub boost_visible: bool,
    /// Accumulated simulated time
    pub time: f32,
    was_on_power_up: bool,
    was_at_checkpoint: bool,
    checkpoint_countdown: f32,
    move_speed: Damped<f32>,
    fov: Damped<f32>,
    camera: Damped<Vec3>,
}

impl SimulationState {
    /// Ship at the origin facing -z
    pub fn new(tuning: &FlightTuning) -> Self {
        Self::at(Vec3::zeros(), Quat::identity(), tuning)
    }

    /// Ship at a given pose
    pub fn at(position: Vec3, rotation: Quat, tuning: &FlightTuning) -> Self {
        Self {
            position,
            rotation,
            momentum: 0.0,
            boost_credit: 0.0,
            boost_visible: false,
            time: 0.0,
            was_on_power_up: false,
            was_at_checkpoint: false,
            checkpoint_countdown: 0.0,
            move_speed: Damped::new(tuning.speed_damping),
            fov: Damped::new(tuning.speed_damping),
            camera: Damped::new(tuning.camera_damping),
        }
    }

    /// Current forward axis of the ship
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::new(0.0, 0.0, -1.0)
    }

    /// Current up axis of the ship
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::y()
    }

    /// Whether a checkpoint countdown is running
    pub fn checkpoint_pending(&self) -> bool {
        self.checkpoint_countdown > 0.0
    }
}

/// Per-frame output of the flight step
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTransforms {
    /// Projection (current FOV) times view
    pub view_projection: Mat4,
    /// Projection at the base FOV times view, for sky and HUD geometry
    pub fixed_view_projection: Mat4,
    /// World matrix of the ship
    pub world: Mat4,
    /// Damped camera position
    pub camera_position: Vec3,
    /// Vertical field of view in radians after damping
    pub fov_y: f32,
    /// Boost indicator visibility
    pub boost_visible: bool,
    /// Whether boost was applied this step
    pub boosting: bool,
    /// Whether this step bounced off an obstacle or the world edge
    pub collided: bool,
    /// Momentum after clamping, before any bounce
    pub clamped_momentum: f32,
    /// Whether a checkpoint countdown finished this step
    pub checkpoint_cleared: bool,
    /// Accumulated simulated time
    pub time: f32,
}

/// The integration rules, parameterized by [`FlightTuning`]
#[derive(Debug, Clone, Default)]
pub struct FlightModel {
    tuning: FlightTuning,
}

impl FlightModel {
    /// Model with the given constants
    pub fn new(tuning: FlightTuning) -> Self {
        Self { tuning }
    }

    /// Constants in use
    pub fn tuning(&self) -> &FlightTuning {
        &self.tuning
    }

    /// Fresh state at the origin
    pub fn initial_state(&self) -> SimulationState {
        SimulationState::new(&self.tuning)
    }

    /// Advance `state` by `dt` seconds and compute the frame's transforms
    pub fn step(
        &self,
        state: &mut SimulationState,
        world: &dyn WorldProbe,
        input: &ControlInput,
        dt: f32,
        aspect_ratio: f32,
    ) -> FrameTransforms {
        let t = &self.tuning;
        state.time += dt;

        let on_power_up = world.on_power_up(&state.position);
        if on_power_up && !state.was_on_power_up {
            state.boost_credit += t.boost_credit;
            log::debug!("Power up collected, boost credit {:.2}s", state.boost_credit);
        }
        state.was_on_power_up = on_power_up;

        let mut target_speed = t.base_move_speed;
        let mut extra = 0.0;
        let mut target_fov = t.base_fov_deg.to_radians();
        let mut rotation_input = input.rotation;

        let boosting = state.boost_credit > 0.0 && input.fire && input.motion.z > 0.0;
        if boosting {
            target_speed = t.boost_move_speed;
            extra = t.boost_extra_cap;
            target_fov = t.boost_fov_deg.to_radians();
            rotation_input.x *= 0.5;
            rotation_input.y *= 0.5;
            state.boost_credit = (state.boost_credit - dt).max(0.0);
        }
        state.boost_visible = state.boost_credit > 0.0;

        let angular = t.rotation_speed_deg.to_radians() * dt;
        let pitch = -angular * rotation_input.x;
        let yaw = -angular * rotation_input.y;
        let roll = angular * rotation_input.z;
        state.rotation = state.rotation
            * axis_rotation(&Vec3::x(), pitch)
            * axis_rotation(&Vec3::y(), yaw)
            * axis_rotation(&Vec3::z(), roll);
        state.rotation.renormalize();

        let up = state.up();
        let forward = state.forward();

        let move_speed = state.move_speed.update(target_speed, dt);
        let fov_y = state.fov.update(target_fov, dt);

        let thrust = input.motion.z;
        if thrust > 0.0 {
            state.momentum += move_speed * dt;
        } else if thrust < 0.0 {
            state.momentum -= t.reverse_factor * move_speed * dt;
        } else {
            state.momentum -= state.momentum * dt;
        }
        state.momentum = state.momentum.clamp(t.min_momentum(), t.max_momentum(extra));
        let clamped_momentum = state.momentum;

        let displacement = forward * (state.momentum * dt);
        state.position += displacement;

        let collided =
            world.collides(&state.position) || state.position.norm() > t.world_radius;
        if collided {
            state.position -= displacement * 2.0;
            state.momentum *= t.bounce_factor;
        }

        let target = state.position;
        let camera_position =
            state.camera.update(target + up * t.camera_height - forward * t.camera_distance, dt);

        let checkpoint_cleared = self.advance_checkpoint(state, world, dt);

        let view = look_at(&camera_position, &target, &up);
        let projection = perspective_vk(fov_y, aspect_ratio, t.near_plane, t.far_plane);
        let fixed_projection =
            perspective_vk(t.base_fov_deg.to_radians(), aspect_ratio, t.near_plane, t.far_plane);

        FrameTransforms {
            view_projection: projection * view,
            fixed_view_projection: fixed_projection * view,
            world: rigid_transform(&state.position, &state.rotation),
            camera_position,
            fov_y,
            boost_visible: state.boost_visible,
            boosting,
            collided,
            clamped_momentum,
            checkpoint_cleared,
            time: state.time,
        }
    }

    fn advance_checkpoint(
        &self,
        state: &mut SimulationState,
        world: &dyn WorldProbe,
        dt: f32,
    ) -> bool {
        let at_checkpoint = world.at_checkpoint(&state.position);
        if at_checkpoint && !state.was_at_checkpoint {
            state.checkpoint_countdown = self.tuning.checkpoint_delay;
        }
        state.was_at_checkpoint = at_checkpoint;

        if state.checkpoint_countdown > 0.0 {
            state.checkpoint_countdown -= dt;
            if state.checkpoint_countdown <= 0.0 {
                state.checkpoint_countdown = 0.0;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use crate::simulation::world::{OpenSpace, Sphere, SphereField};
    use approx::assert_relative_eq;
    use std::cell::Cell;

    const DT: f32 = 1.0 / 60.0;
    const ASPECT: f32 = 4.0 / 3.0;

    struct Scripted {
        power_up: Cell<bool>,
        collide: Cell<bool>,
        checkpoint: Cell<bool>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                power_up: Cell::new(false),
                collide: Cell::new(false),
                checkpoint: Cell::new(false),
            }
        }
    }

    impl WorldProbe for Scripted {
        fn on_power_up(&self, _position: &Vec3) -> bool {
            self.power_up.get()
        }

        fn collides(&self, _position: &Vec3) -> bool {
            self.collide.get()
        }

        fn at_checkpoint(&self, _position: &Vec3) -> bool {
            self.checkpoint.get()
        }
    }

    fn boost_input() -> ControlInput {
        ControlInput::new(Vec3::new(0.0, 0.0, 1.0), Vec3::zeros(), true)
    }

    #[test]
    fn test_forward_flight_in_open_space() {
        let model = FlightModel::default();
        let mut state = model.initial_state();
        let input = ControlInput::forward();

        for _ in 0..600 {
            let frame = model.step(&mut state, &OpenSpace, &input, DT, ASPECT);
            assert!(!frame.collided);
        }

        // Momentum ramps at 2/s until the cap of 8 (4 s), then cruises for 6 s.
        let ramp: f32 = (1..=240).map(|k| 2.0 * k as f32 * DT * DT).sum();
        let expected = ramp + 8.0 * 360.0 * DT;

        assert_relative_eq!(state.position.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(state.position.y, 0.0, epsilon = 1e-4);
        assert_relative_eq!(-state.position.z, expected, epsilon = 1e-2);
        assert_relative_eq!(state.momentum, 8.0, epsilon = 1e-4);
        assert_relative_eq!(state.time, 10.0, epsilon = 1e-3);
    }

    #[test]
    fn test_momentum_stays_within_caps() {
        let model = FlightModel::default();
        let tuning = model.tuning().clone();
        let mut state = model.initial_state();
        let pattern = [1.0, 1.0, 1.0, -1.0, 0.0, -1.0, -1.0, 1.0];

        for i in 0..900 {
            let thrust = pattern[(i / 40) % pattern.len()];
            let fire = i % 3 == 0;
            let input = ControlInput::new(Vec3::new(0.0, 0.0, thrust), Vec3::zeros(), fire);
            let frame = model.step(&mut state, &OpenSpace, &input, DT, ASPECT);

            let extra = if frame.boosting { tuning.boost_extra_cap } else { 0.0 };
            assert!(frame.clamped_momentum <= tuning.max_momentum(extra) + 1e-5);
            assert!(frame.clamped_momentum >= tuning.min_momentum() - 1e-5);
        }
    }

    #[test]
    fn test_reverse_is_capped_at_a_third() {
        let model = FlightModel::default();
        let mut state = model.initial_state();
        let input = ControlInput::new(Vec3::new(0.0, 0.0, -1.0), Vec3::zeros(), false);

        for _ in 0..300 {
            model.step(&mut state, &OpenSpace, &input, DT, ASPECT);
        }

        assert_relative_eq!(state.momentum, -8.0 / 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_coasting_decays_momentum() {
        let model = FlightModel::default();
        let mut state = model.initial_state();
        state.momentum = 4.0;

        model.step(&mut state, &OpenSpace, &ControlInput::default(), DT, ASPECT);

        assert_relative_eq!(state.momentum, 4.0 - 4.0 * DT, epsilon = 1e-6);
    }

    #[test]
    fn test_boost_appears_on_power_up_edge() {
        let model = FlightModel::default();
        let world = Scripted::new();
        let mut state = model.initial_state();

        let frame = model.step(&mut state, &world, &ControlInput::default(), DT, ASPECT);
        assert!(!frame.boost_visible);

        world.power_up.set(true);
        let frame = model.step(&mut state, &world, &ControlInput::default(), DT, ASPECT);
        assert!(frame.boost_visible);
        assert_relative_eq!(state.boost_credit, 4.0);

        // Staying on the crystal grants nothing more.
        model.step(&mut state, &world, &ControlInput::default(), DT, ASPECT);
        assert_relative_eq!(state.boost_credit, 4.0);

        world.power_up.set(false);
        model.step(&mut state, &world, &ControlInput::default(), DT, ASPECT);
        world.power_up.set(true);
        model.step(&mut state, &world, &ControlInput::default(), DT, ASPECT);
        assert_relative_eq!(state.boost_credit, 8.0);
    }

    #[test]
    fn test_boost_hides_exactly_when_credit_runs_out() {
        let model = FlightModel::default();
        let world = Scripted::new();
        let mut state = model.initial_state();
        world.power_up.set(true);
        model.step(&mut state, &world, &ControlInput::default(), DT, ASPECT);
        world.power_up.set(false);

        let mut boosted_steps = 0;
        loop {
            let frame = model.step(&mut state, &world, &boost_input(), 0.25, ASPECT);
            assert!(frame.boosting);
            boosted_steps += 1;
            if state.boost_credit > 0.0 {
                assert!(frame.boost_visible);
            } else {
                assert_eq!(state.boost_credit, 0.0);
                assert!(!frame.boost_visible);
                break;
            }
        }
        assert_eq!(boosted_steps, 16);

        let frame = model.step(&mut state, &world, &boost_input(), 0.25, ASPECT);
        assert!(!frame.boosting);
        assert!(!frame.boost_visible);
    }

    #[test]
    fn test_boost_needs_fire_and_thrust() {
        let model = FlightModel::default();
        let world = Scripted::new();
        let mut state = model.initial_state();
        world.power_up.set(true);

        let input = ControlInput::new(Vec3::zeros(), Vec3::zeros(), true);
        let frame = model.step(&mut state, &world, &input, DT, ASPECT);

        assert!(!frame.boosting);
        assert_relative_eq!(state.boost_credit, 4.0);
    }

    #[test]
    fn test_boost_widens_fov_over_time() {
        let model = FlightModel::default();
        let world = Scripted::new();
        let mut state = model.initial_state();
        world.power_up.set(true);

        let first = model.step(&mut state, &world, &ControlInput::forward(), DT, ASPECT);
        assert!(!first.boosting);
        let mut frame = first.clone();
        for _ in 0..60 {
            frame = model.step(&mut state, &world, &boost_input(), DT, ASPECT);
        }

        assert!(frame.fov_y > first.fov_y);
        assert!(frame.fov_y < 100f32.to_radians());
        assert!(frame.clamped_momentum > 0.0);
    }

    #[test]
    fn test_collision_bounces_and_rolls_back() {
        let model = FlightModel::default();
        let world = Scripted::new();
        let mut state = model.initial_state();
        state.momentum = 5.0;
        let before = state.position;

        world.collide.set(true);
        let frame = model.step(&mut state, &world, &ControlInput::forward(), DT, ASPECT);

        let clamped = 5.0 + 2.0 * DT;
        assert!(frame.collided);
        assert_relative_eq!(frame.clamped_momentum, clamped, epsilon = 1e-5);
        assert_relative_eq!(state.momentum, -3.0 * clamped, epsilon = 1e-5);
        assert!((state.position - before).norm() <= clamped * DT + 1e-5);
        assert_relative_eq!(state.position.z, before.z + clamped * DT, epsilon = 1e-5);
    }

    #[test]
    fn test_world_radius_bounces() {
        let model = FlightModel::default();
        let mut state =
            SimulationState::at(Vec3::new(0.0, 0.0, -67.99), Quat::identity(), model.tuning());
        state.momentum = 8.0;

        let frame = model.step(&mut state, &OpenSpace, &ControlInput::forward(), DT, ASPECT);

        assert!(frame.collided);
        assert!(state.position.norm() < 68.0);
        assert!(state.momentum < 0.0);
    }

    #[test]
    fn test_sphere_obstacle_bounces() {
        let model = FlightModel::default();
        let field =
            SphereField::new(0.0).with_obstacle(Sphere::new(Vec3::new(0.0, 0.0, -2.0), 1.0));
        let mut state =
            SimulationState::at(Vec3::new(0.0, 0.0, -0.95), Quat::identity(), model.tuning());
        state.momentum = 6.0;

        let frame = model.step(&mut state, &field, &ControlInput::forward(), DT, ASPECT);

        assert!(frame.collided);
        assert!(!field.collides(&state.position));
    }

    #[test]
    fn test_yaw_input_turns_forward_axis() {
        let model = FlightModel::default();
        let mut state = model.initial_state();
        let input = ControlInput::new(Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0), false);

        for _ in 0..45 {
            model.step(&mut state, &OpenSpace, &input, DT, ASPECT);
        }

        // 0.75 s at 120 deg/s is a 90 degree turn to the right.
        let forward = state.forward();
        assert_relative_eq!(forward, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-4);
        assert_relative_eq!(state.rotation.norm(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_camera_trails_behind_and_above() {
        let model = FlightModel::default();
        let mut state = model.initial_state();

        let frame = model.step(&mut state, &OpenSpace, &ControlInput::default(), DT, ASPECT);

        assert_relative_eq!(frame.camera_position, Vec3::new(0.0, 0.26, 2.2), epsilon = 1e-5);
    }

    #[test]
    fn test_view_projection_puts_ship_in_front() {
        let model = FlightModel::default();
        let mut state = model.initial_state();
        let frame = model.step(&mut state, &OpenSpace, &ControlInput::default(), DT, ASPECT);

        let clip = frame.view_projection * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.xyz() / clip.w;

        assert!(clip.w > 0.0);
        assert!(ndc.x.abs() < 1e-4);
        assert!(ndc.y.abs() < 1e-4);
        assert!((0.0..1.0).contains(&ndc.z));

        // Y points down in Vulkan clip space.
        let above = frame.view_projection * Vec4::new(0.0, 0.5, 0.0, 1.0);
        assert!(above.y / above.w < 0.0);
    }

    #[test]
    fn test_fixed_view_projection_ignores_boost() {
        let model = FlightModel::default();
        let world = Scripted::new();
        let mut state = model.initial_state();
        world.power_up.set(true);

        let mut frame = model.step(&mut state, &world, &boost_input(), DT, ASPECT);
        for _ in 0..30 {
            frame = model.step(&mut state, &world, &boost_input(), DT, ASPECT);
        }

        let view = look_at(&frame.camera_position, &state.position, &state.up());
        let fixed = perspective_vk(45f32.to_radians(), ASPECT, 0.1, 200.0) * view;
        assert_relative_eq!(frame.fixed_view_projection, fixed, epsilon = 1e-4);
        assert!(frame.view_projection != frame.fixed_view_projection);
    }

    #[test]
    fn test_checkpoint_clears_after_delay() {
        let model = FlightModel::default();
        let world = Scripted::new();
        let mut state = model.initial_state();
        world.checkpoint.set(true);

        let mut cleared_at = None;
        for i in 0..200 {
            let frame = model.step(&mut state, &world, &ControlInput::default(), 0.05, ASPECT);
            if frame.checkpoint_cleared {
                cleared_at = Some(i);
                break;
            }
        }

        // Touched on step 0, countdown of 2 s at 0.05 s per step.
        assert!(matches!(cleared_at, Some(39) | Some(40)));
        assert!(!state.checkpoint_pending());
    }

    #[test]
    fn test_invalid_tuning_is_rejected() {
        let tuning = FlightTuning { near_plane: 5.0, far_plane: 1.0, ..FlightTuning::default() };
        assert!(tuning.validate().is_err());
        assert!(FlightTuning::default().validate().is_ok());
    }
}
