#![crate_name = "video"]

//! Video capture, display and recording utilities.
//! This crate turns a validated source specification into a frame
//! source, pulls frames from it in a loop and forwards each frame to a
//! display window, an optional recording and a shared latest-frame slot.
//!
//! Support matrix:
//! * input: video file (mp4, avi, webm), still image (jpg, png, bmp),
//!   capture-card pipeline template, default pipeline description
//! * output: window on screen, optionally a recorded mp4/avi/webm file
//!
//! Under the hood, the crate uses [`gstreamer`](https://gstreamer.freedesktop.org/).

use std::fmt::{self, Display};
use std::result::Result;
use std::time::Duration;

use util::ErrorKind;

pub mod context;
pub mod frame;
/// Gstreamer based implementation
pub mod gst;
pub mod playback;
pub mod resolver;
pub mod slot;

pub use context::{StopFlag, ViewerContext};
pub use frame::{Frame, PixelFormat};
pub use slot::FrameSlot;

#[derive(Debug)]
/// Errors that can occur while capturing, showing or recording video
pub enum Error {
    /// Gstreamer error
    Gstreamer(gst::Error),
    /// Argument or configuration error
    Util(util::Error),
    /// Still image could not be decoded
    Image(image::ImageError),
    /// Still image decoded to nothing
    EmptyImage(String),
    /// Source name matched no known source type
    UnsupportedSource(String),
    /// Capture handle did not open
    NotOpened(String),
    /// Frame buffer does not match its geometry
    InvalidFrame(String),
    /// Mutex poisoned
    PoisonedLock,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Util(e) => e.kind(),
            Error::Gstreamer(_)
            | Error::Image(_)
            | Error::EmptyImage(_)
            | Error::UnsupportedSource(_)
            | Error::NotOpened(_) => ErrorKind::Runtime,
            Error::InvalidFrame(_) | Error::PoisonedLock => ErrorKind::Generic,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Gstreamer(e) => write!(f, "Gstreamer error: {}", e),
            Error::Util(e) => write!(f, "{}", e),
            Error::Image(e) => write!(f, "Image error: {}", e),
            Error::EmptyImage(path) => write!(f, "Image {} is empty", path),
            Error::UnsupportedSource(name) => write!(f, "Unsupported video source: {}", name),
            Error::NotOpened(what) => write!(f, "Unable to open video capture: {}", what),
            Error::InvalidFrame(e) => write!(f, "Invalid frame: {}", e),
            Error::PoisonedLock => write!(f, "Mutex poisoned"),
        }
    }
}

impl std::error::Error for Error {}

impl From<util::Error> for Error {
    fn from(e: util::Error) -> Self {
        Error::Util(e)
    }
}

impl From<gst::Error> for Error {
    fn from(e: gst::Error) -> Self {
        Error::Gstreamer(e)
    }
}

/// Anything frames can be pulled from, one at a time.
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted or has failed.
    fn read(&mut self) -> Option<Frame>;
    /// Number of frames handed out so far, if known.
    fn position(&self) -> Option<u64>;
    /// Total number of frames in the source, if known.
    fn frame_count(&self) -> Option<u64>;
}

/// Consumer of frames, e.g. a recording.
pub trait FrameSink {
    fn write(&mut self, frame: &Frame) -> Result<(), Error>;
}

/// On-screen output for frames.
pub trait Window {
    fn show(&mut self, frame: &Frame) -> Result<(), Error>;
    /// Wait up to `timeout` for a key press. Also returns `true` if the
    /// window is gone.
    fn wait_key(&mut self, timeout: Duration) -> bool;
}
