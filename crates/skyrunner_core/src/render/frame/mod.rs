//! # Frame Protocol
//!
//! Device-independent half of the frame loop. Frame-in-flight bookkeeping,
//! resize detection, the per-iteration driver and draw ordering live here;
//! the Vulkan renderer plugs in through [`FrameBackend`].
//!
//! ## Frame Order
//!
//! 1. Simulation step with the elapsed time and the sampled controls
//! 2. Swapchain recreation if a resize or out-of-date result is pending
//! 3. Wait on the slot's fence if it was submitted
//! 4. Acquire an image, waiting on any other slot still using it
//! 5. Uniform update, recording, submit and present
//! 6. Advance to the next slot

pub mod backend;
pub mod driver;
pub mod render_queue;
pub mod resize;
pub mod slots;

pub use backend::{AcquireOutcome, FrameBackend, FrameError, PresentOutcome};
pub use driver::{FrameHooks, FrameInput, FrameLoop, FrameStatus};
pub use render_queue::{DrawPass, RenderQueue};
pub use resize::ResizeTracker;
pub use slots::{FrameSlots, SlotState};

/// Number of frames the CPU may prepare ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
