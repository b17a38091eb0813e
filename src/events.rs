use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;

use crate::mask_sync::MaskResult;

/// A decoded image ready for display.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub image: Arc<RgbaImage>,
    /// Whether the source colour type carried an alpha channel.
    pub has_alpha: bool,
}

#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub path: PathBuf,
    pub image: Arc<RgbaImage>,
}

/// Which window a background mask scan was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskTarget {
    Primary,
    Overlay,
}

/// Messages delivered to the UI thread through the event loop proxy.
#[derive(Debug)]
pub enum ViewerEvent {
    Cancelled,
    ImageLoaded { request: u64, image: LoadedImage },
    LoadFailed { request: u64, path: PathBuf },
    ThumbnailsReady(Vec<Thumbnail>),
    MaskReady { target: MaskTarget, result: MaskResult },
}

/// Where background tasks deliver their results.
///
/// The event loop proxy in production; a channel in tests.
pub trait EventSink: Clone + Send + 'static {
    /// Returns `false` once the receiving side is gone.
    fn deliver(&self, event: ViewerEvent) -> bool;
}

impl EventSink for winit::event_loop::EventLoopProxy<ViewerEvent> {
    fn deliver(&self, event: ViewerEvent) -> bool {
        self.send_event(event).is_ok()
    }
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<ViewerEvent> {
    fn deliver(&self, event: ViewerEvent) -> bool {
        self.send(event).is_ok()
    }
}
