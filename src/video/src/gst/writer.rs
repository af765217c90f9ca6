use std::path::{Path, PathBuf};

use gstreamer::prelude::*;
use gstreamer::{ClockTime, MessageType, MessageView, Pipeline};
use gstreamer_app::AppSrc;
use gstreamer_video::VideoInfo;
use tracing::{debug, error, info, warn};

use super::{frame_to_buffer, log_bus_error, video_info, Error};
use crate::{Error as VideoError, Frame, FrameSink};

/// Upper bound on waiting for the muxer to finish the file after EOS.
const FINALIZE_TIMEOUT_SECS: u64 = 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Container {
    Mp4,
    Avi,
    Webm,
}

impl Container {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "mp4" => Some(Container::Mp4),
            "avi" => Some(Container::Avi),
            "webm" => Some(Container::Webm),
            _ => None,
        }
    }

    fn encoder(&self) -> &'static str {
        match self {
            Container::Mp4 | Container::Avi => "x264enc tune=zerolatency",
            Container::Webm => "vp8enc deadline=1",
        }
    }

    fn muxer(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4mux",
            Container::Avi => "avimux",
            Container::Webm => "webmmux",
        }
    }

    /// Launch description that encodes frames pushed into `src` to `path`.
    pub fn recording_pipeline(&self, path: &Path) -> String {
        format!(
            "appsrc name=src format=time is-live=true do-timestamp=true ! videoconvert ! {} ! {} ! filesink location=\"{}\"",
            self.encoder(),
            self.muxer(),
            path.display()
        )
    }
}

/// Records every frame it is given into a video file.
///
/// Caps are fixed by the first frame; frames with a different geometry
/// are dropped with a warning.
pub struct FileWriter {
    path: PathBuf,
    pipeline: Option<Pipeline>,
    appsrc: AppSrc,
    info: Option<VideoInfo>,
    frames_written: u64,
}

impl FileWriter {
    pub fn open(path: &Path) -> Result<Self, VideoError> {
        let container = Container::from_path(path).ok_or_else(|| {
            VideoError::Util(util::Error::InvalidArgument(format!(
                "no container for output file {}",
                path.display()
            )))
        })?;
        super::init()?;

        let pipeline = gstreamer::parse::launch(&container.recording_pipeline(path))
            .map_err(|e| VideoError::Gstreamer(Error::Glib(e)))?
            .downcast::<Pipeline>()
            .map_err(|_| VideoError::NotOpened(path.display().to_string()))?;
        let appsrc = pipeline
            .by_name("src")
            .and_then(|src| src.downcast::<AppSrc>().ok())
            .ok_or_else(|| VideoError::NotOpened("recording appsrc".to_string()))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| VideoError::Gstreamer(Error::StateChange(e)))?;
        info!(path = %path.display(), ?container, "Recording to file");

        Ok(Self {
            path: path.to_path_buf(),
            pipeline: Some(pipeline),
            appsrc,
            info: None,
            frames_written: 0,
        })
    }

    /// Finish the file and release the pipeline. Later calls do nothing.
    pub fn close(&mut self) -> Result<(), VideoError> {
        let Some(pipeline) = self.pipeline.take() else {
            return Ok(());
        };

        if self.info.is_some() {
            if let Err(e) = self.appsrc.end_of_stream() {
                warn!(?e, "Failed to send EOS to recording");
            } else if let Some(bus) = pipeline.bus() {
                let msg = bus.timed_pop_filtered(
                    ClockTime::from_seconds(FINALIZE_TIMEOUT_SECS),
                    &[MessageType::Eos, MessageType::Error],
                );
                match msg.as_ref().map(|m| m.view()) {
                    Some(MessageView::Error(err)) => log_bus_error("Recording failed", err),
                    Some(_) => {}
                    None => warn!("Timed out finalizing recording"),
                }
            }
        }

        pipeline
            .set_state(gstreamer::State::Null)
            .map_err(|e| VideoError::Gstreamer(Error::StateChange(e)))?;
        info!(path = %self.path.display(), frames = self.frames_written, "Recording closed");
        Ok(())
    }
}

impl FrameSink for FileWriter {
    fn write(&mut self, frame: &Frame) -> Result<(), VideoError> {
        if self.pipeline.is_none() {
            return Err(VideoError::NotOpened(self.path.display().to_string()));
        }

        let info = video_info(frame)?;
        match &self.info {
            None => {
                let caps = info
                    .to_caps()
                    .map_err(|e| VideoError::Gstreamer(Error::GlibBool(e)))?;
                debug!(%caps, "Recording caps fixed");
                self.appsrc.set_caps(Some(&caps));
                self.info = Some(info.clone());
            }
            Some(current) if *current != info => {
                warn!(
                    width = frame.width,
                    height = frame.height,
                    "Frame geometry changed, not recording it"
                );
                return Ok(());
            }
            Some(_) => {}
        }

        let buffer = frame_to_buffer(frame, &info)?;
        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| VideoError::Gstreamer(Error::Flow(e)))?;
        self.frames_written += 1;
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(%e, "Failed to release recording");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_from_extension() {
        assert_eq!(Container::from_path(Path::new("a/b.mp4")), Some(Container::Mp4));
        assert_eq!(Container::from_path(Path::new("b.avi")), Some(Container::Avi));
        assert_eq!(Container::from_path(Path::new("b.webm")), Some(Container::Webm));
        assert_eq!(Container::from_path(Path::new("b.mkv")), None);
        assert_eq!(Container::from_path(Path::new("mp4")), None);
    }

    #[test]
    fn recording_pipeline_names_the_appsrc() {
        let desc = Container::Webm.recording_pipeline(Path::new("out.webm"));
        assert!(desc.starts_with("appsrc name=src "));
        assert!(desc.contains("vp8enc"));
        assert!(desc.ends_with("webmmux ! filesink location=\"out.webm\""));
    }
}
