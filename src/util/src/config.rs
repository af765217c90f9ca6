//! Pipeline description files.
//!
//! Both files are plain text and only their first line is used. The
//! description itself is GStreamer launch syntax and is never parsed
//! here; the capture-card template only gets its placeholder replaced.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use super::Error;

pub const DEFAULT_PIPELINE_FILE: &str = "gstreamer_pipeline.txt";
pub const CAPTURE_TEMPLATE_FILE: &str = "decklink_pipeline.txt";
/// Source name selecting the capture-card template.
pub const CAPTURE_CARD_KEYWORD: &str = "decklink";
pub const DEVICE_PLACEHOLDER: &str = "$CAMERA_NUMBER$";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineFiles {
    pub default_pipeline: PathBuf,
    pub capture_template: PathBuf,
}

impl Default for PipelineFiles {
    fn default() -> Self {
        Self {
            default_pipeline: PathBuf::from(DEFAULT_PIPELINE_FILE),
            capture_template: PathBuf::from(CAPTURE_TEMPLATE_FILE),
        }
    }
}

impl PipelineFiles {
    /// Pipeline used when no source was given.
    pub fn default_pipeline(&self) -> Result<String, Error> {
        read_first_line(&self.default_pipeline).inspect_err(|e| error!("{}", e))
    }

    /// Capture-card pipeline with `device_index` substituted into the template.
    pub fn capture_card_pipeline(&self, device_index: u8) -> Result<String, Error> {
        let template = read_first_line(&self.capture_template).inspect_err(|_| {
            error!(
                path = %self.capture_template.display(),
                "Could not open pipeline configuration file"
            )
        })?;
        substitute_device(&template, device_index).ok_or_else(|| {
            error!("Camera number placeholder not found in pipeline template");
            Error::MissingPlaceholder {
                path: self.capture_template.clone(),
                placeholder: DEVICE_PLACEHOLDER.to_string(),
            }
        })
    }
}

/// Replace the first device placeholder; `None` when the template has none.
pub fn substitute_device(template: &str, device_index: u8) -> Option<String> {
    if !template.contains(DEVICE_PLACEHOLDER) {
        return None;
    }
    Some(template.replacen(DEVICE_PLACEHOLDER, &device_index.to_string(), 1))
}

fn read_first_line(path: &Path) -> Result<String, Error> {
    let contents = fs::read_to_string(path).map_err(|source| Error::Config {
        path: path.to_path_buf(),
        source,
    })?;
    let line = contents.lines().next().unwrap_or_default().trim_end();
    if line.is_empty() {
        return Err(Error::EmptyConfig(path.to_path_buf()));
    }
    debug!(path = %path.display(), pipeline = line, "Loaded pipeline description");
    Ok(line.to_string())
}
