use std::error;
use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;

pub mod config;
pub mod validator;

/// File extensions played back as a video stream.
pub const VIDEO_EXTENSIONS: [&str; 3] = [".mp4", ".avi", ".webm"];
/// File extensions shown as a single still image.
pub const IMAGE_EXTENSIONS: [&str; 3] = [".jpg", ".png", ".bmp"];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Video,
    Image,
}

impl SourceKind {
    /// Classify a source name by its trailing extension.
    pub fn from_suffix(name: &str) -> Option<Self> {
        if VIDEO_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            Some(SourceKind::Video)
        } else if IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            Some(SourceKind::Image)
        } else {
            None
        }
    }

    /// Classify a source name by an extension appearing anywhere in it.
    ///
    /// This is looser than [`SourceKind::from_suffix`]: `clip.mp4.part`
    /// still counts as a video.
    pub fn from_substring(name: &str) -> Option<Self> {
        if VIDEO_EXTENSIONS.iter().any(|ext| name.contains(ext)) {
            Some(SourceKind::Video)
        } else if IMAGE_EXTENSIONS.iter().any(|ext| name.contains(ext)) {
            Some(SourceKind::Image)
        } else {
            None
        }
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Video => write!(f, "video file"),
            SourceKind::Image => write!(f, "image file"),
        }
    }
}

/// Coarse classification used to pick the top-level failure message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    OutOfRange,
    Runtime,
    Generic,
}

#[derive(Debug)]
pub enum Error {
    InvalidArgument(String),
    OutOfRange(String),
    Config { path: PathBuf, source: io::Error },
    EmptyConfig(PathBuf),
    MissingPlaceholder { path: PathBuf, placeholder: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::OutOfRange(_) => ErrorKind::OutOfRange,
            Error::Config { .. } | Error::EmptyConfig(_) | Error::MissingPlaceholder { .. } => {
                ErrorKind::Runtime
            }
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(e) | Error::OutOfRange(e) => write!(f, "{}", e),
            Error::Config { path, source } => write!(
                f,
                "Unable to open configuration file {}: {}",
                path.display(),
                source
            ),
            Error::EmptyConfig(path) => {
                write!(f, "Configuration file {} is empty", path.display())
            }
            Error::MissingPlaceholder { path, placeholder } => write!(
                f,
                "Placeholder {} not found in pipeline template {}",
                placeholder,
                path.display()
            ),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Config { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_classification() {
        assert_eq!(SourceKind::from_suffix("a.mp4"), Some(SourceKind::Video));
        assert_eq!(SourceKind::from_suffix("dir/b.webm"), Some(SourceKind::Video));
        assert_eq!(SourceKind::from_suffix("c.bmp"), Some(SourceKind::Image));
        assert_eq!(SourceKind::from_suffix("c.bmp.bak"), None);
        assert_eq!(SourceKind::from_suffix("decklink"), None);
    }

    #[test]
    fn substring_classification_is_looser() {
        assert_eq!(SourceKind::from_substring("c.png.bak"), Some(SourceKind::Image));
        assert_eq!(SourceKind::from_substring("x.avi.part"), Some(SourceKind::Video));
        assert_eq!(SourceKind::from_substring(""), None);
    }

    #[test]
    fn config_errors_are_runtime_failures() {
        let err = Error::EmptyConfig(PathBuf::from("gstreamer_pipeline.txt"));
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(
            Error::OutOfRange("5".into()).kind(),
            ErrorKind::OutOfRange
        );
    }

    #[test]
    fn argument_errors_display_the_bare_message() {
        let err = Error::InvalidArgument("Camera number must be a valid integer.".into());
        assert_eq!(err.to_string(), "Camera number must be a valid integer.");
    }
}
