use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::{Error, Frame};

/// Latest-frame cell shared between the playback loop and other readers.
///
/// The playback loop is the only writer. Readers always get a full copy
/// of whatever frame was published last; there is no queueing.
#[derive(Default)]
pub struct FrameSlot {
    inner: Mutex<SlotInner>,
    updated: Condvar,
}

#[derive(Default)]
struct SlotInner {
    frame: Option<Frame>,
    sequence: u64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored frame with a copy of `frame` and wake any waiters.
    pub fn publish(&self, frame: &Frame) -> Result<(), Error> {
        let mut inner = self.inner.lock().map_err(|_| Error::PoisonedLock)?;
        inner.frame = Some(frame.clone());
        inner.sequence += 1;
        self.updated.notify_all();
        Ok(())
    }

    /// Copy of the most recently published frame.
    pub fn read(&self) -> Result<Option<Frame>, Error> {
        let inner = self.inner.lock().map_err(|_| Error::PoisonedLock)?;
        Ok(inner.frame.clone())
    }

    /// Number of frames published so far.
    pub fn sequence(&self) -> Result<u64, Error> {
        let inner = self.inner.lock().map_err(|_| Error::PoisonedLock)?;
        Ok(inner.sequence)
    }

    /// Block until a frame newer than `seen` is published, or `timeout` passes.
    ///
    /// Returns the new sequence number with a copy of the frame, or `None`
    /// on timeout.
    pub fn wait_for_update(
        &self,
        seen: u64,
        timeout: Duration,
    ) -> Result<Option<(u64, Frame)>, Error> {
        let inner = self.inner.lock().map_err(|_| Error::PoisonedLock)?;
        let (inner, _) = self
            .updated
            .wait_timeout_while(inner, timeout, |inner| inner.sequence <= seen)
            .map_err(|_| Error::PoisonedLock)?;
        if inner.sequence <= seen {
            return Ok(None);
        }
        Ok(inner.frame.clone().map(|frame| (inner.sequence, frame)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::PixelFormat;

    fn solid(width: u32, value: u8) -> Frame {
        Frame::new(width, 2, PixelFormat::Gray8, vec![value; width as usize * 2]).unwrap()
    }

    #[test]
    fn read_before_publish_is_empty() {
        let slot = FrameSlot::new();
        assert_eq!(slot.read().unwrap(), None);
        assert_eq!(slot.sequence().unwrap(), 0);
    }

    #[test]
    fn latest_publish_wins() {
        let slot = FrameSlot::new();
        slot.publish(&solid(2, 1)).unwrap();
        slot.publish(&solid(3, 2)).unwrap();
        assert_eq!(slot.read().unwrap(), Some(solid(3, 2)));
        assert_eq!(slot.sequence().unwrap(), 2);
    }

    #[test]
    fn wait_times_out_without_publish() {
        let slot = FrameSlot::new();
        let got = slot.wait_for_update(0, Duration::from_millis(10)).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn concurrent_readers_never_see_torn_frames() {
        let slot = Arc::new(FrameSlot::new());
        slot.publish(&solid(8, 0)).unwrap();

        let reader = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for _ in 0..500 {
                    let frame = slot.read().unwrap().unwrap();
                    let first = frame.data[0];
                    assert!(frame.data.iter().all(|&b| b == first));
                    assert_eq!(frame.width as u8, first % 4 + 8);
                }
            })
        };

        for i in 0..500u32 {
            let value = i as u8;
            slot.publish(&solid(value as u32 % 4 + 8, value)).unwrap();
        }
        reader.join().unwrap();
    }

    #[test]
    fn waiter_wakes_on_publish() {
        let slot = Arc::new(FrameSlot::new());
        let waiter = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.wait_for_update(0, Duration::from_secs(5)).unwrap())
        };
        slot.publish(&solid(2, 7)).unwrap();
        let (sequence, frame) = waiter.join().unwrap().unwrap();
        assert_eq!(sequence, 1);
        assert_eq!(frame, solid(2, 7));
    }
}
