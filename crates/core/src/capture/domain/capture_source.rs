use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to open capture source {url}: {reason}")]
    Open { url: String, reason: String },
    #[error("no frame is ready")]
    NotReady,
    #[error("capture source stopped")]
    Disconnected,
}

/// Where and how to open a live frame source.
#[derive(Debug, Clone, Default)]
pub struct CaptureConfig {
    /// Device path (`/dev/video0`, `0`, `video=Webcam`) or file/stream URL.
    pub url: String,
    /// Demuxer name for capture devices, e.g. `v4l2`, `avfoundation`, `dshow`.
    /// `None` lets ffmpeg probe the URL and paces file playback in real time.
    pub device_format: Option<String>,
    /// Demuxer options such as `video_size` or `framerate`.
    pub options: Vec<(String, String)>,
}

/// Provides the most recent camera frame.
///
/// A source is not ready until it has a frame that has not been handed out
/// yet. Dimensions are only meaningful once the source has been ready.
pub trait CaptureSource: Send {
    fn is_ready(&mut self) -> bool;

    fn dimensions(&self) -> Option<(u32, u32)>;

    fn read_frame(&mut self) -> Result<Frame, CaptureError>;
}
