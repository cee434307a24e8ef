use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::capture::frame::Frame;

/// Single-slot, last-write-wins frame holder.
///
/// Replacement is an atomic pointer swap, so a reader on another thread sees
/// either the old frame or the new one, never a mix.
#[derive(Debug, Default)]
pub struct LatestFrame {
    slot: ArcSwapOption<Frame>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, frame: Frame) {
        self.slot.store(Some(Arc::new(frame)));
    }

    pub fn load(&self) -> Option<Arc<Frame>> {
        self.slot.load_full()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.load().is_none()
    }
}
