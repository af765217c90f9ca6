//! Turns a validated [`SourceSpec`] into something frames can come from.
//!
//! Resolution happens in two steps: [`plan`] decides what kind of source
//! the name refers to and prepares it (loading pipeline files, decoding
//! still images), then [`SourcePlan::open`] starts the capture pipeline.

use std::path::Path;

use tracing::{debug, error, info};
use util::config::{PipelineFiles, CAPTURE_CARD_KEYWORD};
use util::validator::SourceSpec;
use util::SourceKind;

use super::gst::GstCapture;
use super::{Error, Frame};

#[derive(Debug, PartialEq, Eq)]
pub enum SourcePlan {
    /// A pipeline description to open as a capture stream.
    Stream { description: String },
    /// A decoded still image.
    Still(Frame),
}

pub enum Source {
    Stream(GstCapture),
    Still(Frame),
}

/// Launch description decoding a video file into BGR frames for an appsink.
pub fn file_pipeline(path: &str) -> String {
    format!(
        "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=BGR ! appsink max-buffers=1 drop=true",
        path
    )
}

pub fn plan(spec: &SourceSpec, files: &PipelineFiles) -> Result<SourcePlan, Error> {
    let name = spec.name.as_str();
    match SourceKind::from_substring(name) {
        Some(SourceKind::Video) => Ok(SourcePlan::Stream {
            description: file_pipeline(name),
        }),
        Some(SourceKind::Image) => {
            Ok(SourcePlan::Still(load_still(Path::new(name))?))
        }
        None if name == CAPTURE_CARD_KEYWORD => {
            let device_index = spec.device_index.ok_or_else(|| {
                Error::Util(util::Error::InvalidArgument(format!(
                    "{} needs a camera number",
                    CAPTURE_CARD_KEYWORD
                )))
            })?;
            let description = files.capture_card_pipeline(device_index)?;
            info!(pipeline = %description, "Using Decklink pipeline");
            Ok(SourcePlan::Stream { description })
        }
        None if name.is_empty() => {
            let description = files.default_pipeline()?;
            info!(pipeline = %description, "Using default pipeline");
            Ok(SourcePlan::Stream { description })
        }
        None => {
            error!(source = name, "Invalid input source");
            Err(Error::UnsupportedSource(name.to_string()))
        }
    }
}

fn load_still(path: &Path) -> Result<Frame, Error> {
    let image = image::open(path).map_err(|e| {
        error!(source = %path.display(), %e, "Invalid input source");
        Error::Image(e)
    })?;
    let frame = Frame::from(image);
    if frame.is_empty() {
        error!(source = %path.display(), "Invalid input source");
        return Err(Error::EmptyImage(path.display().to_string()));
    }
    debug!(source = %path.display(), details = %frame.details(), "Loaded still image");
    Ok(frame)
}

impl SourcePlan {
    pub fn open(self) -> Result<Source, Error> {
        match self {
            SourcePlan::Stream { description } => GstCapture::open(&description)
                .map(Source::Stream)
                .inspect_err(|e| error!(%e, "Invalid input source")),
            SourcePlan::Still(frame) => Ok(Source::Still(frame)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_names_become_file_pipelines() {
        let spec = SourceSpec {
            name: "clips/intro.webm".to_string(),
            device_index: None,
        };
        let plan = plan(&spec, &PipelineFiles::default()).unwrap();
        let SourcePlan::Stream { description } = plan else {
            panic!("expected a stream");
        };
        assert!(description.starts_with("filesrc location=\"clips/intro.webm\""));
        assert!(description.ends_with("appsink max-buffers=1 drop=true"));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let spec = SourceSpec {
            name: "rtsp-camera".to_string(),
            device_index: Some(1),
        };
        let err = plan(&spec, &PipelineFiles::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSource(_)));
    }

    #[test]
    fn capture_card_needs_device_index() {
        let spec = SourceSpec {
            name: CAPTURE_CARD_KEYWORD.to_string(),
            device_index: None,
        };
        let err = plan(&spec, &PipelineFiles::default()).unwrap_err();
        assert_eq!(err.kind(), util::ErrorKind::InvalidArgument);
    }
}
