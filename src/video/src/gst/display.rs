use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gstreamer::prelude::*;
use gstreamer::{ClockTime, Element, ElementFactory, MessageType, MessageView, Pipeline};
use gstreamer_app::AppSrc;
use gstreamer_video::VideoInfo;
use tracing::{debug, error, warn};

use super::{frame_to_buffer, log_bus_error, video_info, Error};
use crate::{Error as VideoError, Frame, Window};

/// Longest single bus poll while waiting for a key press.
const BUS_POLL_MS: u64 = 10;

/// On-screen window fed through `appsrc ! videoconvert ! autovideosink`.
///
/// Key presses in the window arrive as upstream navigation events, which
/// a probe on the converter records for [`Window::wait_key`].
pub struct DisplayWindow {
    pipeline: Option<Pipeline>,
    appsrc: AppSrc,
    info: Option<VideoInfo>,
    title: String,
    key_pressed: Arc<AtomicBool>,
}

impl DisplayWindow {
    /// Open a window whose title is set from a title tag on the first frame.
    pub fn open(title: &str) -> Result<Self, VideoError> {
        super::init()?;

        let pipeline = Pipeline::with_name("vidview-display");
        let src = make_element("appsrc", "vidview-displaysrc")?;
        let convert = make_element("videoconvert", "vidview-displayconvert")?;
        let sink = make_element("autovideosink", "vidview-displaysink")?;

        let appsrc = src
            .downcast::<AppSrc>()
            .map_err(|_| VideoError::NotOpened("display appsrc".to_string()))?;
        appsrc.set_format(gstreamer::Format::Time);
        appsrc.set_is_live(true);
        appsrc.set_do_timestamp(true);

        pipeline
            .add_many([appsrc.upcast_ref(), &convert, &sink])
            .map_err(|e| VideoError::Gstreamer(Error::GlibBool(e)))?;
        Element::link_many([appsrc.upcast_ref(), &convert, &sink])
            .map_err(|e| VideoError::Gstreamer(Error::GlibBool(e)))?;

        let key_pressed = Arc::new(AtomicBool::new(false));
        let pad = convert
            .static_pad("src")
            .ok_or_else(|| VideoError::NotOpened("display converter has no src pad".to_string()))?;
        let flag = Arc::clone(&key_pressed);
        pad.add_probe(gstreamer::PadProbeType::EVENT_UPSTREAM, move |_, info| {
            if let Some(gstreamer::PadProbeData::Event(ref event)) = info.data {
                if is_key_press(event) {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            gstreamer::PadProbeReturn::Ok
        });

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| VideoError::Gstreamer(Error::StateChange(e)))?;
        debug!("Display window opened");

        Ok(Self {
            pipeline: Some(pipeline),
            appsrc,
            info: None,
            title: title.to_string(),
            key_pressed,
        })
    }

    pub fn close(&mut self) -> Result<(), VideoError> {
        if let Some(pipeline) = self.pipeline.take() {
            debug!("Closing display window");
            pipeline
                .set_state(gstreamer::State::Null)
                .map_err(|e| VideoError::Gstreamer(Error::StateChange(e)))?;
        }
        Ok(())
    }
}

fn make_element(factory: &str, name: &str) -> Result<Element, VideoError> {
    ElementFactory::make(factory)
        .name(name)
        .build()
        .map_err(|e| VideoError::Gstreamer(Error::GlibBool(e)))
}

/// Video sinks name their window after the stream's title tag.
fn title_tags(title: &str) -> gstreamer::TagList {
    let mut tags = gstreamer::TagList::new();
    if let Some(tags) = tags.get_mut() {
        tags.add::<gstreamer::tags::Title>(&title, gstreamer::TagMergeMode::Replace);
    }
    tags
}

fn is_key_press(event: &gstreamer::Event) -> bool {
    event.type_() == gstreamer::EventType::Navigation
        && event
            .structure()
            .and_then(|s| s.get::<&str>("event").ok())
            .is_some_and(|kind| kind == "key-press")
}

impl Window for DisplayWindow {
    fn show(&mut self, frame: &Frame) -> Result<(), VideoError> {
        if self.pipeline.is_none() {
            return Err(VideoError::NotOpened("display window is closed".to_string()));
        }

        let info = video_info(frame)?;
        if self.info.as_ref() != Some(&info) {
            let caps = info
                .to_caps()
                .map_err(|e| VideoError::Gstreamer(Error::GlibBool(e)))?;
            debug!(%caps, "Display caps changed");
            self.appsrc.set_caps(Some(&caps));
            if self.info.is_none()
                && !self
                    .appsrc
                    .send_event(gstreamer::event::Tag::new(title_tags(&self.title)))
            {
                warn!(title = %self.title, "Unable to set display window title");
            }
            self.info = Some(info.clone());
        }

        let buffer = frame_to_buffer(frame, &info)?;
        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| VideoError::Gstreamer(Error::Flow(e)))?;
        Ok(())
    }

    fn wait_key(&mut self, timeout: Duration) -> bool {
        let Some(bus) = self.pipeline.as_ref().and_then(|p| p.bus()) else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        loop {
            if self.key_pressed.swap(false, Ordering::SeqCst) {
                debug!("Key pressed in display window");
                return true;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let poll = remaining.min(Duration::from_millis(BUS_POLL_MS));
            if let Some(msg) = bus.timed_pop_filtered(
                ClockTime::from_mseconds(poll.as_millis() as u64),
                &[MessageType::Error, MessageType::Eos],
            ) {
                match msg.view() {
                    MessageView::Error(err) => log_bus_error("Display window failed", err),
                    _ => warn!("Display window closed"),
                }
                return true;
            }

            if remaining.is_zero() {
                return self.key_pressed.swap(false, Ordering::SeqCst);
            }
        }
    }
}

impl Drop for DisplayWindow {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(%e, "Failed to release display window");
        }
    }
}
