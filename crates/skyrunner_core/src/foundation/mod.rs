//! Foundation module - math, timing and logging shared by every layer

pub mod logging;
pub mod math;
pub mod time;
