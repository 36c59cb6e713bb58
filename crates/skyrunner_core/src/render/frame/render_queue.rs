//! # Render Queue
//!
//! Collects a frame's draw items and hands them back in submission order:
//! every opaque item first, then every transparent item, each group in the
//! order it was pushed. Blending only comes out right when transparent
//! geometry is drawn over a finished opaque depth buffer.

/// Whether an item is drawn in the opaque or transparent pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawPass {
    /// Depth-written geometry
    Opaque,
    /// Blended geometry drawn after all opaque geometry
    Transparent,
}

impl DrawPass {
    /// Pass for a pipeline's transparency flag
    pub fn from_transparent(transparent: bool) -> Self {
        if transparent {
            Self::Transparent
        } else {
            Self::Opaque
        }
    }
}

/// Per-frame draw list
#[derive(Debug, Clone)]
pub struct RenderQueue<T> {
    opaque: Vec<T>,
    transparent: Vec<T>,
}

impl<T> Default for RenderQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RenderQueue<T> {
    /// Empty queue
    pub fn new() -> Self {
        Self {
            opaque: Vec::new(),
            transparent: Vec::new(),
        }
    }

    /// Queue `item` in `pass`
    pub fn push(&mut self, pass: DrawPass, item: T) {
        match pass {
            DrawPass::Opaque => self.opaque.push(item),
            DrawPass::Transparent => self.transparent.push(item),
        }
    }

    /// Items in submission order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.opaque.iter().chain(self.transparent.iter())
    }

    /// Consume the queue in submission order
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.opaque.drain(..).chain(self.transparent.drain(..))
    }

    /// Total queued items
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every item, keeping the allocations
    pub fn clear(&mut self) {
        self.opaque.clear();
        self.transparent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_before_transparent() {
        let mut queue = RenderQueue::new();
        queue.push(DrawPass::Transparent, "glass");
        queue.push(DrawPass::Opaque, "ship");
        queue.push(DrawPass::Transparent, "shield");
        queue.push(DrawPass::Opaque, "asteroid");

        let order: Vec<_> = queue.iter().copied().collect();
        assert_eq!(order, vec!["ship", "asteroid", "glass", "shield"]);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = RenderQueue::new();
        queue.push(DrawPass::from_transparent(true), 2);
        queue.push(DrawPass::from_transparent(false), 1);

        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(drained, vec![1, 2]);
        assert!(queue.is_empty());
    }
}
