use std::path::PathBuf;

use tracing::info;

use super::{Error, SourceKind, VIDEO_EXTENSIONS};

/// Highest device index accepted on the command line.
pub const MAX_DEVICE_INDEX: u8 = 4;

/// What the user asked to view.
///
/// An empty `name` selects the default pipeline configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceSpec {
    pub name: String,
    pub device_index: Option<u8>,
}

impl SourceSpec {
    pub fn is_default(&self) -> bool {
        self.name.is_empty()
    }
}

/// Validate the positional tokens (program name excluded) into a [`SourceSpec`].
pub fn parse_source(program: &str, tokens: &[String]) -> Result<SourceSpec, Error> {
    match tokens {
        [] => {
            info!("No video source is selected, the program will use the default pipeline");
            Ok(SourceSpec::default())
        }
        [name] => {
            let kind = SourceKind::from_suffix(name).ok_or_else(|| {
                info!(source = %name, "The video source is not a video file or image file");
                Error::InvalidArgument(format!(
                    "Usage: {} <video file or image file>",
                    program
                ))
            })?;
            info!(source = %name, "The video source is a {}", kind);
            Ok(SourceSpec {
                name: name.clone(),
                device_index: None,
            })
        }
        [name, index] => {
            let device_index = parse_device_index(index)?;
            if name.is_empty() {
                return Err(Error::InvalidArgument(
                    "The video input does not exist: <empty>".to_string(),
                ));
            }
            Ok(SourceSpec {
                name: name.clone(),
                device_index: Some(device_index),
            })
        }
        _ => Err(Error::InvalidArgument(format!(
            "Usage: {} <input_name> <camera_number>",
            program
        ))),
    }
}

pub fn parse_device_index(token: &str) -> Result<u8, Error> {
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidArgument(
            "Camera number must be a valid integer.".to_string(),
        ));
    }

    // all digits, so the only parse failure left is overflow
    let out_of_range = || {
        Error::OutOfRange(format!(
            "Camera number must be between 0 and {}.",
            MAX_DEVICE_INDEX
        ))
    };
    let value: u64 = token.parse().map_err(|_| out_of_range())?;
    if value > MAX_DEVICE_INDEX as u64 {
        return Err(out_of_range());
    }
    Ok(value as u8)
}

/// Value parser for the recording target; the container is picked from the extension.
pub fn parse_output_path(fnamestr: &str) -> Result<PathBuf, Error> {
    if VIDEO_EXTENSIONS.iter().any(|ext| fnamestr.ends_with(ext)) {
        return Ok(PathBuf::from(fnamestr));
    }
    Err(Error::InvalidArgument(format!(
        "output file must end in one of {}",
        VIDEO_EXTENSIONS.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_tokens_selects_default() {
        let spec = parse_source("vidview", &[]).unwrap();
        assert!(spec.is_default());
        assert_eq!(spec.device_index, None);
    }

    #[test]
    fn single_token_must_have_known_extension() {
        for name in ["clip.mp4", "clip.avi", "clip.webm", "a.jpg", "a.png", "a.bmp"] {
            let spec = parse_source("vidview", &tokens(&[name])).unwrap();
            assert_eq!(spec.name, name);
        }
        for name in ["clip.mkv", "decklink", "a.jpeg", "mp4", "a.mp4.tmp"] {
            let err = parse_source("vidview", &tokens(&[name])).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{}", name);
        }
    }

    #[test]
    fn device_index_must_be_numeric() {
        for index in ["x", "-1", "1.0", " 2", ""] {
            let err = parse_source("vidview", &tokens(&["decklink", index])).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{:?}", index);
        }
    }

    #[test]
    fn device_index_must_be_in_range() {
        for index in ["5", "10", "99999999999999999999999"] {
            let err = parse_source("vidview", &tokens(&["decklink", index])).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::OutOfRange, "{:?}", index);
        }
        let spec = parse_source("vidview", &tokens(&["decklink", "04"])).unwrap();
        assert_eq!(spec.device_index, Some(4));
    }

    #[test]
    fn empty_name_with_index_is_rejected() {
        let err = parse_source("vidview", &tokens(&["", "0"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn too_many_tokens() {
        let err = parse_source("vidview", &tokens(&["decklink", "0", "extra"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("vidview"));
    }

    #[test]
    fn output_path_needs_video_container() {
        assert!(parse_output_path("out.mp4").is_ok());
        assert!(parse_output_path("out.png").is_err());
    }
}
