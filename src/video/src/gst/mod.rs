use std::fmt::{self, Display};

use gstreamer::prelude::*;
use gstreamer::{ClockTime, MessageType, MessageView, Pipeline};
use gstreamer_app::AppSink;
use gstreamer_video::{VideoFormat, VideoInfo};
use tracing::{debug, error, info};

use super::{Error as VideoError, Frame, FrameSource, PixelFormat};

mod display;
mod writer;

pub use display::DisplayWindow;
pub use writer::{Container, FileWriter};

/// Frame rate advertised on frames pushed into display and recording pipelines.
const PUSH_FRAME_RATE: i32 = 30;
/// How long a single appsink pull waits before the bus is checked for errors.
const PULL_INTERVAL_MS: u64 = 100;
const OPEN_TIMEOUT_SECS: u64 = 5;

#[derive(Debug)]
pub enum Error {
    Glib(glib::Error),
    GlibBool(glib::BoolError),
    StateChange(gstreamer::StateChangeError),
    Flow(gstreamer::FlowError),
    NoAppSink,
    UnsupportedFormat(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Glib(e) => write!(f, "glib error: {}", e),
            Error::GlibBool(e) => write!(f, "glib bool error: {}", e),
            Error::StateChange(e) => write!(f, "state change error: {}", e),
            Error::Flow(e) => write!(f, "flow error: {:?}", e),
            Error::NoAppSink => write!(f, "pipeline has no appsink to pull frames from"),
            Error::UnsupportedFormat(e) => write!(f, "unsupported pixel format: {}", e),
        }
    }
}

pub fn init() -> Result<(), VideoError> {
    gstreamer::init().map_err(|e| VideoError::Gstreamer(Error::Glib(e)))
}

fn video_format(format: PixelFormat) -> VideoFormat {
    match format {
        PixelFormat::Bgr => VideoFormat::Bgr,
        PixelFormat::Rgb => VideoFormat::Rgb,
        PixelFormat::Bgra => VideoFormat::Bgra,
        PixelFormat::Rgba => VideoFormat::Rgba,
        PixelFormat::Gray8 => VideoFormat::Gray8,
    }
}

fn pixel_format(format: VideoFormat) -> Option<PixelFormat> {
    match format {
        VideoFormat::Bgr => Some(PixelFormat::Bgr),
        VideoFormat::Rgb => Some(PixelFormat::Rgb),
        VideoFormat::Bgra => Some(PixelFormat::Bgra),
        VideoFormat::Rgba => Some(PixelFormat::Rgba),
        VideoFormat::Gray8 => Some(PixelFormat::Gray8),
        _ => None,
    }
}

/// Caps description for pushing `frame` into an appsrc.
fn video_info(frame: &Frame) -> Result<VideoInfo, VideoError> {
    VideoInfo::builder(video_format(frame.format), frame.width, frame.height)
        .fps(gstreamer::Fraction::new(PUSH_FRAME_RATE, 1))
        .build()
        .map_err(|e| VideoError::Gstreamer(Error::GlibBool(e)))
}

/// Copy a packed frame into a buffer laid out as `info` says (rows may be padded).
fn frame_to_buffer(frame: &Frame, info: &VideoInfo) -> Result<gstreamer::Buffer, VideoError> {
    if frame.is_empty() {
        return Err(VideoError::InvalidFrame("empty frame".to_string()));
    }

    let mut buffer = gstreamer::Buffer::with_size(info.size())
        .map_err(|e| VideoError::Gstreamer(Error::GlibBool(e)))?;
    {
        let buffer_ref = buffer
            .get_mut()
            .ok_or_else(|| VideoError::InvalidFrame("buffer is not writable".to_string()))?;
        let mut map = buffer_ref
            .map_writable()
            .map_err(|e| VideoError::Gstreamer(Error::GlibBool(e)))?;
        let dest = map.as_mut_slice();

        let stride = info.stride()[0] as usize;
        let offset = info.offset()[0];
        let row = frame.stride();
        for (y, src) in frame.data.chunks_exact(row).enumerate() {
            let start = offset + y * stride;
            dest.get_mut(start..start + row)
                .ok_or_else(|| VideoError::InvalidFrame("buffer smaller than frame".to_string()))?
                .copy_from_slice(src);
        }
    }
    Ok(buffer)
}

fn sample_to_frame(sample: &gstreamer::Sample) -> Result<Frame, VideoError> {
    let caps = sample
        .caps()
        .ok_or_else(|| VideoError::InvalidFrame("sample without caps".to_string()))?;
    let info =
        VideoInfo::from_caps(caps).map_err(|e| VideoError::Gstreamer(Error::GlibBool(e)))?;
    let format = pixel_format(info.format()).ok_or_else(|| {
        VideoError::Gstreamer(Error::UnsupportedFormat(format!("{:?}", info.format())))
    })?;

    let buffer = sample
        .buffer()
        .ok_or_else(|| VideoError::InvalidFrame("sample without buffer".to_string()))?;
    let map = buffer
        .map_readable()
        .map_err(|e| VideoError::Gstreamer(Error::GlibBool(e)))?;
    let data = map.as_slice();

    let (width, height) = (info.width(), info.height());
    let row = width as usize * format.bytes_per_pixel() as usize;
    let stride = info.stride()[0] as usize;
    let offset = info.offset()[0];

    let mut packed = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = offset + y * stride;
        let src = data
            .get(start..start + row)
            .ok_or_else(|| VideoError::InvalidFrame("buffer shorter than caps".to_string()))?;
        packed.extend_from_slice(src);
    }
    Frame::new(width, height, format, packed)
}

fn log_bus_error(context: &str, err: &gstreamer::message::Error) {
    error!(
        source = ?err.src().map(|s| s.path_string()),
        error = %err.error(),
        debug = ?err.debug(),
        "{}",
        context
    );
}

/// Capture session over a pipeline description ending in an appsink.
///
/// The pipeline runs from [`GstCapture::open`] until [`GstCapture::close`]
/// or drop, whichever comes first.
pub struct GstCapture {
    description: String,
    pipeline: Option<Pipeline>,
    appsink: AppSink,
    frames_read: u64,
    eos: bool,
}

impl GstCapture {
    pub fn open(description: &str) -> Result<Self, VideoError> {
        init()?;

        let pipeline = gstreamer::parse::launch(description)
            .map_err(|e| VideoError::Gstreamer(Error::Glib(e)))?
            .downcast::<Pipeline>()
            .map_err(|_| VideoError::NotOpened(description.to_string()))?;

        let appsink = pipeline
            .iterate_sinks()
            .find(|sink| sink.is::<AppSink>())
            .and_then(|sink| sink.downcast::<AppSink>().ok())
            .ok_or(VideoError::Gstreamer(Error::NoAppSink))?;

        let mut capture = Self {
            description: description.to_string(),
            pipeline: Some(pipeline),
            appsink,
            frames_read: 0,
            eos: false,
        };
        if let Err(e) = capture.start() {
            error!(pipeline = description, "Unable to open video capture with pipeline");
            capture.close()?;
            return Err(e);
        }
        info!(pipeline = description, "Video capture opened");
        Ok(capture)
    }

    fn start(&self) -> Result<(), VideoError> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| VideoError::NotOpened(self.description.clone()))?;
        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| VideoError::Gstreamer(Error::StateChange(e)))?;

        let (result, _state, _pending) =
            pipeline.state(ClockTime::from_seconds(OPEN_TIMEOUT_SECS));
        result.map_err(|e| VideoError::Gstreamer(Error::StateChange(e)))?;
        Ok(())
    }

    /// Stop the pipeline and release its resources. Later calls do nothing.
    pub fn close(&mut self) -> Result<(), VideoError> {
        if let Some(pipeline) = self.pipeline.take() {
            debug!(frames = self.frames_read, "Closing video capture");
            pipeline
                .set_state(gstreamer::State::Null)
                .map_err(|e| VideoError::Gstreamer(Error::StateChange(e)))?;
        }
        Ok(())
    }
}

impl FrameSource for GstCapture {
    fn read(&mut self) -> Option<Frame> {
        let bus = self.pipeline.as_ref()?.bus()?;
        loop {
            if let Some(sample) = self
                .appsink
                .try_pull_sample(ClockTime::from_mseconds(PULL_INTERVAL_MS))
            {
                return match sample_to_frame(&sample) {
                    Ok(frame) => {
                        self.frames_read += 1;
                        Some(frame)
                    }
                    Err(e) => {
                        error!(%e, "Unable to convert captured sample");
                        None
                    }
                };
            }
            if self.appsink.is_eos() {
                debug!(frames = self.frames_read, "Capture reached end of stream");
                self.eos = true;
                return None;
            }
            if let Some(msg) = bus.pop_filtered(&[MessageType::Error]) {
                if let MessageView::Error(err) = msg.view() {
                    log_bus_error("Capture pipeline failed", &err);
                }
                return None;
            }
        }
    }

    fn position(&self) -> Option<u64> {
        Some(self.frames_read)
    }

    fn frame_count(&self) -> Option<u64> {
        if self.eos {
            return Some(self.frames_read);
        }
        self.pipeline
            .as_ref()?
            .query_duration_generic(gstreamer::Format::Default)
            .and_then(|frames| u64::try_from(frames.value()).ok())
    }
}

impl Drop for GstCapture {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(%e, "Failed to release video capture");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_formats_map_both_ways() {
        for format in [
            PixelFormat::Bgr,
            PixelFormat::Rgb,
            PixelFormat::Bgra,
            PixelFormat::Rgba,
            PixelFormat::Gray8,
        ] {
            assert_eq!(pixel_format(video_format(format)), Some(format));
        }
        assert_eq!(pixel_format(VideoFormat::I420), None);
    }

    fn through_buffer(frame: &Frame) -> (VideoInfo, gstreamer::Buffer, Frame) {
        init().unwrap();
        let info = video_info(frame).unwrap();
        let buffer = frame_to_buffer(frame, &info).unwrap();
        let sample = gstreamer::Sample::builder()
            .buffer(&buffer)
            .caps(&info.to_caps().unwrap())
            .build();
        let back = sample_to_frame(&sample).unwrap();
        (info, buffer, back)
    }

    #[test]
    fn padded_rows_survive_buffer_conversion() {
        // 3 BGR pixels are 9 bytes, gstreamer pads rows to 12
        let data: Vec<u8> = (1..=18).collect();
        let frame = Frame::new(3, 2, PixelFormat::Bgr, data).unwrap();
        let (info, buffer, back) = through_buffer(&frame);

        assert_eq!(info.stride()[0], 12);
        let map = buffer.map_readable().unwrap();
        let offset = info.offset()[0];
        assert_eq!(&map[offset..offset + 9], &frame.data[..9]);
        assert_eq!(&map[offset + 12..offset + 21], &frame.data[9..]);
        assert_eq!(back, frame);
    }

    #[test]
    fn gray_frames_survive_buffer_conversion() {
        let frame = Frame::new(3, 2, PixelFormat::Gray8, vec![10, 20, 30, 40, 50, 60]).unwrap();
        let (info, _, back) = through_buffer(&frame);
        assert_eq!(info.stride()[0], 4);
        assert_eq!(back, frame);
    }

    #[test]
    fn buffer_shorter_than_caps_is_rejected() {
        init().unwrap();
        let frame = Frame::new(3, 2, PixelFormat::Bgr, vec![0; 18]).unwrap();
        let caps = video_info(&frame).unwrap().to_caps().unwrap();
        let sample = gstreamer::Sample::builder()
            .buffer(&gstreamer::Buffer::from_slice(vec![0u8; 10]))
            .caps(&caps)
            .build();
        assert!(matches!(
            sample_to_frame(&sample),
            Err(VideoError::InvalidFrame(_))
        ));
    }

    #[test]
    fn empty_frame_is_not_pushed() {
        init().unwrap();
        let frame = Frame::new(3, 2, PixelFormat::Gray8, vec![0; 6]).unwrap();
        let info = video_info(&frame).unwrap();
        let empty = Frame {
            data: Vec::new(),
            width: 0,
            height: 0,
            format: PixelFormat::Gray8,
        };
        assert!(matches!(
            frame_to_buffer(&empty, &info),
            Err(VideoError::InvalidFrame(_))
        ));
    }
}
