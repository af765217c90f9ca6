use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::FrameSlot;

/// Cooperative shutdown request shared with the interrupt handler.
///
/// Setting it only touches an atomic, so it is safe to call from a signal
/// handler.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State shared by everything taking part in one viewing session.
#[derive(Clone, Default)]
pub struct ViewerContext {
    stop: StopFlag,
    frames: Arc<FrameSlot>,
}

impl ViewerContext {
    pub fn new(stop: StopFlag) -> Self {
        Self {
            stop,
            frames: Arc::new(FrameSlot::new()),
        }
    }

    pub fn stop(&self) -> &StopFlag {
        &self.stop
    }

    /// Latest captured frame, for any consumer besides the playback loop.
    pub fn frames(&self) -> &Arc<FrameSlot> {
        &self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let flag = StopFlag::new();
        let handler_copy = flag.clone();
        assert!(!flag.is_requested());
        handler_copy.request();
        assert!(flag.is_requested());
    }

    #[test]
    fn context_clones_share_the_slot() {
        let ctx = ViewerContext::new(StopFlag::new());
        let other = ctx.clone();
        assert!(Arc::ptr_eq(ctx.frames(), other.frames()));
    }
}
