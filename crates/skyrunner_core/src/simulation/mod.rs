//! Per-frame flight simulation
//!
//! Pure CPU code: no GPU handles cross this boundary, so everything here is
//! unit tested directly.

pub mod damping;
pub mod flight;
pub mod world;

pub use damping::{damp, Damped};
pub use flight::{FlightModel, FlightTuning, FrameTransforms, SimulationState};
pub use world::{OpenSpace, Sphere, SphereField, WorldProbe};
