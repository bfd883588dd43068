//! Frame source abstraction and source identifier parsing.

use url::Url;

use super::types::{CameraError, Frame, SourceId};

/// Path appended to bare `http(s)://host[:port]` stream addresses.
///
/// Android "IP Webcam" style servers publish their MJPEG stream there.
pub const DEFAULT_STREAM_PATH: &str = "/video";

/// One physical or network camera.
///
/// Implementations hand out one frame per `read()` call and must tolerate
/// `release()` being called more than once.
pub trait FrameSource: Send {
    /// Human-readable name used in logs.
    fn name(&self) -> String;

    /// Read the next frame.
    fn read(&mut self) -> Result<Frame, CameraError>;

    /// Release the underlying device. Never fails.
    fn release(&mut self);
}

/// Parse a CLI/config camera identifier.
///
/// Numeric identifiers are device indices. An `http(s)` address without a
/// path gets [`DEFAULT_STREAM_PATH`] appended. Anything else is used as a
/// stream address verbatim.
pub fn parse_source(raw: &str) -> SourceId {
    let trimmed = raw.trim();

    if let Ok(index) = trimmed.parse::<u32>() {
        return SourceId::Device(index);
    }

    if trimmed.starts_with("http") {
        if let Ok(mut url) = Url::parse(trimmed) {
            if url.path().is_empty() || url.path() == "/" {
                url.set_path(DEFAULT_STREAM_PATH);
                return SourceId::Stream(url.to_string());
            }
        }
    }

    SourceId::Stream(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_is_device_index() {
        assert_eq!(parse_source("0"), SourceId::Device(0));
        assert_eq!(parse_source(" 3 "), SourceId::Device(3));
    }

    #[test]
    fn test_bare_host_gets_video_path() {
        assert_eq!(
            parse_source("http://192.168.1.20:8080"),
            SourceId::Stream("http://192.168.1.20:8080/video".to_string())
        );
        assert_eq!(
            parse_source("http://192.168.1.20:8080/"),
            SourceId::Stream("http://192.168.1.20:8080/video".to_string())
        );
    }

    #[test]
    fn test_url_with_path_is_kept() {
        assert_eq!(
            parse_source("http://cam.local/mjpeg/stream"),
            SourceId::Stream("http://cam.local/mjpeg/stream".to_string())
        );
    }

    #[test]
    fn test_non_http_stream_is_kept() {
        assert_eq!(
            parse_source("rtsp://10.0.0.9:554/live"),
            SourceId::Stream("rtsp://10.0.0.9:554/live".to_string())
        );
        assert_eq!(
            parse_source("/dev/video2"),
            SourceId::Stream("/dev/video2".to_string())
        );
    }
}
