use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use super::{Error, Frame, FrameSink, FrameSource, ViewerContext, Window};

/// Bounded wait after each displayed frame; a key press during it ends playback.
pub const KEY_WAIT: Duration = Duration::from_millis(30);

/// Why playback ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The source ran out of frames.
    Completed,
    /// A read failed before the end of the source.
    ReadError,
    /// The stop flag was raised.
    Stopped,
    /// A key was pressed or the window went away.
    KeyPressed,
}

/// Drives frames from a source to the window, the recording and the shared slot.
pub struct FrameLoop<'a> {
    context: &'a ViewerContext,
    key_wait: Duration,
}

impl<'a> FrameLoop<'a> {
    pub fn new(context: &'a ViewerContext) -> Self {
        Self {
            context,
            key_wait: KEY_WAIT,
        }
    }

    pub fn with_key_wait(mut self, key_wait: Duration) -> Self {
        self.key_wait = key_wait;
        self
    }

    fn stop_requested(&self) -> bool {
        self.context.stop().is_requested()
    }

    /// Pull frames until the source ends, a read fails, the stop flag is
    /// raised or a key is pressed.
    pub fn run<S, W>(
        &self,
        source: &mut S,
        window: &mut W,
        mut writer: Option<&mut dyn FrameSink>,
    ) -> Result<Outcome, Error>
    where
        S: FrameSource + ?Sized,
        W: Window + ?Sized,
    {
        let mut first = true;
        while !self.stop_requested() {
            let start = Instant::now();

            let Some(frame) = source.read() else {
                return Ok(end_of_source(source));
            };
            let read_time = Instant::now();
            if first {
                debug!(details = %frame.details(), "First frame");
                first = false;
            }

            self.context.frames().publish(&frame)?;
            if self.stop_requested() {
                break;
            }

            present(&frame, window, &mut writer)?;
            let process_time = Instant::now();
            if self.stop_requested() {
                break;
            }

            info!(
                "Read time: {} ms, Process time: {} ms, Total time: {} ms",
                (read_time - start).as_millis(),
                (process_time - read_time).as_millis(),
                (process_time - start).as_millis()
            );

            if window.wait_key(self.key_wait) {
                return Ok(Outcome::KeyPressed);
            }
        }
        info!("Stop requested, ending playback");
        Ok(Outcome::Stopped)
    }

    /// Show a single image until the stop flag is raised or a key is pressed.
    pub fn show_still<W>(
        &self,
        frame: &Frame,
        window: &mut W,
        mut writer: Option<&mut dyn FrameSink>,
    ) -> Result<Outcome, Error>
    where
        W: Window + ?Sized,
    {
        debug!(details = %frame.details(), "Still image");
        self.context.frames().publish(frame)?;
        present(frame, window, &mut writer)?;

        while !self.stop_requested() {
            if window.wait_key(self.key_wait) {
                return Ok(Outcome::KeyPressed);
            }
        }
        Ok(Outcome::Stopped)
    }
}

fn present<W>(
    frame: &Frame,
    window: &mut W,
    writer: &mut Option<&mut dyn FrameSink>,
) -> Result<(), Error>
where
    W: Window + ?Sized,
{
    if let Some(writer) = writer {
        writer.write(frame)?;
    }
    window.show(frame)
}

fn end_of_source<S: FrameSource + ?Sized>(source: &S) -> Outcome {
    match (source.position(), source.frame_count()) {
        (Some(position), Some(count)) if position >= count => {
            info!("Video playback completed.");
            Outcome::Completed
        }
        _ => {
            error!("Unable to read frame from video capture");
            Outcome::ReadError
        }
    }
}
