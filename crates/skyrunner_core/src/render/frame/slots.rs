//! Frame-in-flight slot bookkeeping

/// Where a slot is in its submit cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Nothing outstanding; the slot's resources may be written
    Idle,
    /// Submitted and not yet observed complete
    Submitted,
}

/// Tracks which slots have outstanding GPU work and which slot last used
/// each swapchain image
#[derive(Debug, Clone)]
pub struct FrameSlots {
    states: Vec<SlotState>,
    images_in_flight: Vec<Option<usize>>,
    current: usize,
}

impl FrameSlots {
    /// `slot_count` idle slots and `image_count` unused images
    pub fn new(slot_count: usize, image_count: usize) -> Self {
        Self {
            states: vec![SlotState::Idle; slot_count.max(1)],
            images_in_flight: vec![None; image_count],
            current: 0,
        }
    }

    /// Slot the next frame uses
    pub fn current(&self) -> usize {
        self.current
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always false; there is at least one slot
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// State of `slot`
    pub fn state(&self, slot: usize) -> Option<SlotState> {
        self.states.get(slot).copied()
    }

    /// Whether the CPU must wait on `slot`'s fence before reusing it
    pub fn needs_wait(&self, slot: usize) -> bool {
        self.state(slot) == Some(SlotState::Submitted)
    }

    /// Record that `slot`'s fence was observed signaled
    pub fn mark_idle(&mut self, slot: usize) {
        if let Some(state) = self.states.get_mut(slot) {
            *state = SlotState::Idle;
        }
    }

    /// Record a submission on `slot`
    pub fn mark_submitted(&mut self, slot: usize) {
        if let Some(state) = self.states.get_mut(slot) {
            *state = SlotState::Submitted;
        }
    }

    /// Number of slots with outstanding work
    pub fn submitted_count(&self) -> usize {
        self.states.iter().filter(|s| **s == SlotState::Submitted).count()
    }

    /// Hand `image_index` to `slot`
    ///
    /// Returns another slot whose submission still renders into that image;
    /// its fence must be waited on before the image is reused.
    pub fn claim_image(&mut self, image_index: u32, slot: usize) -> Option<usize> {
        let entry = self.images_in_flight.get_mut(image_index as usize)?;
        let previous = entry.replace(slot);
        previous.filter(|&other| {
            other != slot && self.states.get(other) == Some(&SlotState::Submitted)
        })
    }

    /// Slot that last rendered into `image_index`
    pub fn image_owner(&self, image_index: u32) -> Option<usize> {
        self.images_in_flight.get(image_index as usize).copied().flatten()
    }

    /// Move to the next slot, wrapping around
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.states.len();
        self.current
    }

    /// Forget all outstanding work after the device went idle and track a
    /// new set of `image_count` swapchain images
    pub fn reset(&mut self, image_count: usize) {
        self.states.fill(SlotState::Idle);
        self.images_in_flight = vec![None; image_count];
    }
}
