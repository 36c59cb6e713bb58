//! Per-iteration frame driver
//!
//! [`FrameLoop`] owns the sequencing: simulation step, pending swapchain
//! rebuilds, fence waits, acquire, uniform update, recording, submit and
//! present. Game content plugs in through [`FrameHooks`] and the device
//! through [`FrameBackend`].

use ash::vk;

use super::backend::{AcquireOutcome, FrameBackend, FrameError, PresentOutcome};
use super::resize::ResizeTracker;
use super::slots::FrameSlots;
use super::MAX_FRAMES_IN_FLIGHT;
use crate::input::ControlInput;
use crate::simulation::{FlightModel, FrameTransforms, SimulationState, WorldProbe};

/// What the window collaborator reports for one iteration
#[derive(Debug, Clone, Copy)]
pub struct FrameInput {
    /// Sampled control axes
    pub controls: ControlInput,
    /// Seconds since the previous iteration
    pub dt: f32,
    /// Current framebuffer size
    pub window: vk::Extent2D,
    /// Whether the window's resize callback fired since the last iteration
    pub resized: bool,
}

/// How an iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// A frame was submitted and presented
    Presented,
    /// No image was available or the swapchain went out of date
    Skipped,
    /// The window has zero area; nothing was simulated or acquired
    Minimized,
}

/// Per-frame callbacks into game content
pub trait FrameHooks<B: FrameBackend> {
    /// Error type of the content; frame errors convert into it
    type Error: From<FrameError>;

    /// World the simulation step probes
    fn world(&self) -> &dyn WorldProbe;

    /// Write this frame's uniform data into `slot`'s copies
    fn update(&mut self, slot: usize, transforms: &FrameTransforms) -> Result<(), Self::Error>;

    /// Record draws inside the render pass
    fn record(&mut self, recorder: &mut B::Recorder, slot: usize) -> Result<(), Self::Error>;

    /// Rebuild anything that depends on the swapchain extent
    fn resized(&mut self, backend: &B, extent: vk::Extent2D) -> Result<(), Self::Error>;
}

/// Drives the frame-in-flight protocol and the simulation
pub struct FrameLoop {
    slots: FrameSlots,
    resize: ResizeTracker,
    model: FlightModel,
    state: SimulationState,
    transforms: Option<FrameTransforms>,
    frames_presented: u64,
}

impl FrameLoop {
    /// Driver for `backend`'s current swapchain, starting from the model's
    /// initial state
    pub fn new<B: FrameBackend>(model: FlightModel, backend: &B) -> Self {
        let state = model.initial_state();
        Self {
            slots: FrameSlots::new(MAX_FRAMES_IN_FLIGHT, backend.image_count()),
            resize: ResizeTracker::new(backend.extent()),
            model,
            state,
            transforms: None,
            frames_presented: 0,
        }
    }

    /// Replace the simulation state
    pub fn with_state(mut self, state: SimulationState) -> Self {
        self.state = state;
        self
    }

    /// Simulation state after the last step
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Slot bookkeeping
    pub fn slots(&self) -> &FrameSlots {
        &self.slots
    }

    /// Transforms from the last simulated iteration
    pub fn last_transforms(&self) -> Option<&FrameTransforms> {
        self.transforms.as_ref()
    }

    /// Frames presented so far
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Run one iteration
    pub fn run_frame<B, H>(
        &mut self,
        backend: &mut B,
        hooks: &mut H,
        input: &FrameInput,
    ) -> Result<FrameStatus, H::Error>
    where
        B: FrameBackend,
        H: FrameHooks<B>,
    {
        self.resize.observe(input.resized, input.window);
        if self.resize.is_minimized() {
            return Ok(FrameStatus::Minimized);
        }

        let aspect = input.window.width as f32 / input.window.height as f32;
        let transforms = self
            .model
            .step(&mut self.state, hooks.world(), &input.controls, input.dt, aspect);
        self.transforms = Some(transforms.clone());

        if let Some(window) = self.resize.take() {
            self.recreate(backend, hooks, window)?;
        }

        let slot = self.slots.current();
        if self.slots.needs_wait(slot) {
            backend.wait_for_slot(slot)?;
            self.slots.mark_idle(slot);
        }

        let image_index = match backend.acquire(slot)? {
            AcquireOutcome::Ready { image_index, suboptimal } => {
                if suboptimal {
                    self.resize.request();
                }
                image_index
            }
            AcquireOutcome::NotReady => return Ok(FrameStatus::Skipped),
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain out of date on acquire");
                self.resize.request();
                return Ok(FrameStatus::Skipped);
            }
        };

        if let Some(other) = self.slots.claim_image(image_index, slot) {
            backend.wait_for_slot(other)?;
            self.slots.mark_idle(other);
        }

        hooks.update(slot, &transforms)?;
        backend.record(slot, image_index, |recorder| hooks.record(recorder, slot))?;
        backend.submit(slot)?;
        self.slots.mark_submitted(slot);

        match backend.present(slot, image_index)? {
            PresentOutcome::Presented => {}
            PresentOutcome::Suboptimal | PresentOutcome::OutOfDate => {
                log::debug!("Swapchain needs rebuilding after present");
                self.resize.request();
            }
        }

        self.slots.advance();
        self.frames_presented += 1;
        Ok(FrameStatus::Presented)
    }

    /// Let every in-flight submission finish
    pub fn drain<B: FrameBackend>(&mut self, backend: &mut B) -> Result<(), FrameError> {
        backend.wait_idle()?;
        self.slots.reset(backend.image_count());
        Ok(())
    }

    fn recreate<B, H>(
        &mut self,
        backend: &mut B,
        hooks: &mut H,
        window: vk::Extent2D,
    ) -> Result<(), H::Error>
    where
        B: FrameBackend,
        H: FrameHooks<B>,
    {
        self.drain(backend)?;
        let extent = backend.recreate_swapchain(window)?;
        self.slots.reset(backend.image_count());
        hooks.resized(backend, extent)?;
        log::info!("Swapchain rebuilt at {}x{}", extent.width, extent.height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::frame::SlotState;
    use crate::render::vulkan::VulkanError;
    use crate::simulation::OpenSpace;
    use approx::assert_relative_eq;

    struct MockBackend {
        extent: vk::Extent2D,
        image_count: usize,
        next_image: u32,
        pending: Vec<bool>,
        max_outstanding: usize,
        reset_while_pending: bool,
        acquire_results: Vec<AcquireOutcome>,
        acquires: usize,
        recreations: usize,
        recorded: Vec<Vec<String>>,
        failed_submits: usize,
        idle_waits: usize,
    }

    impl MockBackend {
        fn new(width: u32, height: u32) -> Self {
            Self {
                extent: vk::Extent2D { width, height },
                image_count: 3,
                next_image: 0,
                pending: vec![false; MAX_FRAMES_IN_FLIGHT],
                max_outstanding: 0,
                reset_while_pending: false,
                acquire_results: Vec::new(),
                acquires: 0,
                recreations: 0,
                recorded: Vec::new(),
                failed_submits: 0,
                idle_waits: 0,
            }
        }

        fn outstanding(&self) -> usize {
            self.pending.iter().filter(|p| **p).count()
        }
    }

    impl FrameBackend for MockBackend {
        type Recorder = Vec<String>;

        fn image_count(&self) -> usize {
            self.image_count
        }

        fn extent(&self) -> vk::Extent2D {
            self.extent
        }

        fn wait_for_slot(&mut self, slot: usize) -> Result<(), FrameError> {
            let pending = self.pending.get_mut(slot).ok_or(FrameError::InvalidSlot { slot })?;
            if !*pending {
                // A real fence that was never submitted would never signal
                self.idle_waits += 1;
            }
            *pending = false;
            Ok(())
        }

        fn acquire(&mut self, _slot: usize) -> Result<AcquireOutcome, FrameError> {
            self.acquires += 1;
            if !self.acquire_results.is_empty() {
                return Ok(self.acquire_results.remove(0));
            }
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count as u32;
            Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal: false,
            })
        }

        fn record<E, F>(&mut self, _slot: usize, _image_index: u32, draw: F) -> Result<(), E>
        where
            E: From<FrameError>,
            F: FnOnce(&mut Self::Recorder) -> Result<(), E>,
        {
            let mut commands = Vec::new();
            draw(&mut commands)?;
            self.recorded.push(commands);
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> Result<(), FrameError> {
            if self.failed_submits > 0 {
                self.failed_submits -= 1;
                return Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST).into());
            }
            if self.pending[slot] {
                self.reset_while_pending = true;
            }
            self.pending[slot] = true;
            self.max_outstanding = self.max_outstanding.max(self.outstanding());
            Ok(())
        }

        fn present(
            &mut self,
            _slot: usize,
            image_index: u32,
        ) -> Result<PresentOutcome, FrameError> {
            if image_index as usize >= self.image_count {
                return Err(FrameError::InvalidImage { index: image_index });
            }
            Ok(PresentOutcome::Presented)
        }

        fn wait_idle(&mut self) -> Result<(), FrameError> {
            self.pending.fill(false);
            Ok(())
        }

        fn recreate_swapchain(&mut self, window: vk::Extent2D) -> Result<vk::Extent2D, FrameError> {
            self.recreations += 1;
            self.extent = window;
            self.next_image = 0;
            Ok(window)
        }
    }

    #[derive(Default)]
    struct MockContent {
        updates: Vec<usize>,
        resizes: Vec<vk::Extent2D>,
    }

    impl FrameHooks<MockBackend> for MockContent {
        type Error = FrameError;

        fn world(&self) -> &dyn WorldProbe {
            &OpenSpace
        }

        fn update(&mut self, slot: usize, _transforms: &FrameTransforms) -> Result<(), FrameError> {
            self.updates.push(slot);
            Ok(())
        }

        fn record(&mut self, recorder: &mut Vec<String>, slot: usize) -> Result<(), FrameError> {
            recorder.push(format!("draw slot {slot}"));
            Ok(())
        }

        fn resized(
            &mut self,
            _backend: &MockBackend,
            extent: vk::Extent2D,
        ) -> Result<(), FrameError> {
            self.resizes.push(extent);
            Ok(())
        }
    }

    fn input(width: u32, height: u32, resized: bool) -> FrameInput {
        FrameInput {
            controls: ControlInput::default(),
            dt: 1.0 / 60.0,
            window: vk::Extent2D { width, height },
            resized,
        }
    }

    fn assert_no_stale_fences(driver: &FrameLoop, backend: &MockBackend) {
        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            assert_eq!(driver.slots().needs_wait(slot), backend.pending[slot], "slot {slot}");
        }
    }

    #[test]
    fn test_slots_rotate_and_stay_bounded() {
        let mut backend = MockBackend::new(800, 600);
        let mut content = MockContent::default();
        let mut driver = FrameLoop::new(FlightModel::default(), &backend);

        for _ in 0..6 {
            let status = driver
                .run_frame(&mut backend, &mut content, &input(800, 600, false))
                .unwrap();
            assert_eq!(status, FrameStatus::Presented);
        }

        assert_eq!(content.updates, vec![0, 1, 0, 1, 0, 1]);
        assert_eq!(backend.recorded.len(), 6);
        assert_eq!(backend.recorded[1], vec!["draw slot 1".to_string()]);
        assert!(backend.max_outstanding <= MAX_FRAMES_IN_FLIGHT);
        assert!(!backend.reset_while_pending);
        assert_eq!(driver.frames_presented(), 6);
        assert_no_stale_fences(&driver, &backend);
    }

    #[test]
    fn test_failed_submit_leaves_slot_idle() {
        let mut backend = MockBackend::new(800, 600);
        backend.failed_submits = 1;
        let mut content = MockContent::default();
        let mut driver = FrameLoop::new(FlightModel::default(), &backend);

        assert!(driver.run_frame(&mut backend, &mut content, &input(800, 600, false)).is_err());
        assert_eq!(driver.slots().state(0), Some(SlotState::Idle));
        assert_eq!(driver.frames_presented(), 0);

        for _ in 0..6 {
            let status = driver
                .run_frame(&mut backend, &mut content, &input(800, 600, false))
                .unwrap();
            assert_eq!(status, FrameStatus::Presented);
        }
        assert_eq!(backend.idle_waits, 0);
        assert_no_stale_fences(&driver, &backend);
    }

    #[test]
    fn test_resize_then_acquire_uses_reported_extent() {
        let mut backend = MockBackend::new(800, 600);
        let mut content = MockContent::default();
        let mut driver = FrameLoop::new(FlightModel::default(), &backend);

        driver.run_frame(&mut backend, &mut content, &input(800, 600, false)).unwrap();
        driver.run_frame(&mut backend, &mut content, &input(800, 600, false)).unwrap();
        assert_eq!(backend.outstanding(), 2);

        let status = driver.run_frame(&mut backend, &mut content, &input(1280, 720, true)).unwrap();

        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(backend.recreations, 1);
        assert_eq!(backend.extent(), vk::Extent2D { width: 1280, height: 720 });
        assert_eq!(content.resizes, vec![vk::Extent2D { width: 1280, height: 720 }]);
        // Only the frame submitted after the rebuild is outstanding
        assert_eq!(backend.outstanding(), 1);
        assert!(!backend.reset_while_pending);
        assert_no_stale_fences(&driver, &backend);
        assert_eq!(driver.slots().image_owner(0), Some(0));
        assert_eq!(driver.slots().image_owner(1), None);
    }

    #[test]
    fn test_out_of_date_acquire_rebuilds_next_frame() {
        let mut backend = MockBackend::new(800, 600);
        backend.acquire_results.push(AcquireOutcome::OutOfDate);
        let mut content = MockContent::default();
        let mut driver = FrameLoop::new(FlightModel::default(), &backend);

        let status = driver.run_frame(&mut backend, &mut content, &input(800, 600, false)).unwrap();
        assert_eq!(status, FrameStatus::Skipped);
        assert_eq!(backend.recreations, 0);
        assert!(content.updates.is_empty());

        let status = driver.run_frame(&mut backend, &mut content, &input(800, 600, false)).unwrap();
        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(backend.recreations, 1);
        assert_no_stale_fences(&driver, &backend);
    }

    #[test]
    fn test_not_ready_skips_without_rebuild() {
        let mut backend = MockBackend::new(800, 600);
        backend.acquire_results.push(AcquireOutcome::NotReady);
        let mut content = MockContent::default();
        let mut driver = FrameLoop::new(FlightModel::default(), &backend);

        let status = driver.run_frame(&mut backend, &mut content, &input(800, 600, false)).unwrap();
        assert_eq!(status, FrameStatus::Skipped);
        let status = driver.run_frame(&mut backend, &mut content, &input(800, 600, false)).unwrap();
        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(backend.recreations, 0);
    }

    #[test]
    fn test_minimized_window_suspends_everything() {
        let mut backend = MockBackend::new(800, 600);
        let mut content = MockContent::default();
        let mut driver = FrameLoop::new(FlightModel::default(), &backend);

        let status = driver.run_frame(&mut backend, &mut content, &input(0, 0, true)).unwrap();
        assert_eq!(status, FrameStatus::Minimized);
        assert_eq!(backend.acquires, 0);
        assert_relative_eq!(driver.state().time, 0.0);

        let status = driver.run_frame(&mut backend, &mut content, &input(640, 480, false)).unwrap();
        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(content.resizes, vec![vk::Extent2D { width: 640, height: 480 }]);
    }

    #[test]
    fn test_simulation_advances_with_forward_input() {
        let mut backend = MockBackend::new(800, 600);
        let mut content = MockContent::default();
        let mut driver = FrameLoop::new(FlightModel::default(), &backend);

        let mut frame = input(800, 600, false);
        frame.controls = ControlInput::forward();
        for _ in 0..60 {
            driver.run_frame(&mut backend, &mut content, &frame).unwrap();
        }

        let transforms = driver.last_transforms().unwrap();
        assert_relative_eq!(transforms.time, 1.0, epsilon = 1e-4);
        assert!(driver.state().momentum > 0.0);
        let travelled = driver.state().position.dot(&driver.state().forward());
        assert!(travelled > 0.0);
        assert_relative_eq!(driver.state().position.cross(&Vec3::z()).norm(), 0.0, epsilon = 1e-4);
    }
}
