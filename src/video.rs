//! Frame source and sink abstractions over `OpenCV` video I/O.

use crate::constants::DEFAULT_FPS;
use crate::error::Error;
use crate::Result;
use opencv::core::{Mat, Size};
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture, VideoWriter};

/// Static properties of a video stream
#[derive(Debug, Clone, Copy)]
pub struct VideoProperties {
    pub width: i32,
    pub height: i32,
    pub fps: f64,
    /// Total frames as reported by the container; may be 0 when unknown
    pub frame_count: i64,
}

/// Produces a lazy, finite, ordered sequence of frames
pub trait FrameSource {
    /// Stream properties, available before the first read
    fn properties(&self) -> VideoProperties;

    /// Read the next frame; `Ok(None)` signals source exhaustion
    fn read_frame(&mut self) -> Result<Option<Mat>>;
}

/// Consumes annotated frames in strict input order
pub trait FrameSink {
    /// Write one frame; called exactly once per processed frame
    fn write_frame(&mut self, frame: &Mat) -> Result<()>;
}

/// Video file source backed by `VideoCapture`
pub struct VideoFileSource {
    capture: VideoCapture,
    properties: VideoProperties,
}

impl VideoFileSource {
    /// Open a video file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VideoOpen`] when the file cannot be opened; no
    /// valid properties can be obtained in that case, so the caller must
    /// fail before producing any output.
    pub fn open(path: &str) -> Result<Self> {
        log::info!("Opening video file: {path}");
        let capture = VideoCapture::from_file(path, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(Error::VideoOpen(path.to_string()));
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
        if width <= 0 || height <= 0 {
            return Err(Error::VideoOpen(format!(
                "{path}: invalid frame dimensions {width}x{height}"
            )));
        }

        let reported_fps = capture.get(videoio::CAP_PROP_FPS)?;
        let fps = if reported_fps > 0.0 { reported_fps } else { DEFAULT_FPS };
        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT)? as i64;

        log::info!("Video properties: {width}x{height} @ {fps:.2} fps, {frame_count} frames");

        Ok(Self {
            capture,
            properties: VideoProperties {
                width,
                height,
                fps,
                frame_count,
            },
        })
    }
}

impl FrameSource for VideoFileSource {
    fn properties(&self) -> VideoProperties {
        self.properties
    }

    fn read_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

/// Video file sink backed by `VideoWriter`
pub struct VideoFileSink {
    writer: VideoWriter,
    path: String,
}

impl VideoFileSink {
    /// Create a writer matching the source's dimensions and frame rate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VideoWrite`] when the writer cannot be opened for
    /// the given codec and path.
    pub fn create(path: &str, fourcc: &str, properties: &VideoProperties) -> Result<Self> {
        let mut chars = fourcc.chars();
        let (Some(c1), Some(c2), Some(c3), Some(c4)) =
            (chars.next(), chars.next(), chars.next(), chars.next())
        else {
            return Err(Error::VideoWrite(format!("Invalid fourcc: {fourcc:?}")));
        };

        let code = VideoWriter::fourcc(c1, c2, c3, c4)?;
        let writer = VideoWriter::new(
            path,
            code,
            properties.fps,
            Size::new(properties.width, properties.height),
            true,
        )?;
        if !writer.is_opened()? {
            return Err(Error::VideoWrite(format!(
                "Cannot open output video {path} with codec {fourcc}"
            )));
        }

        log::info!("Writing annotated video to {path}");
        Ok(Self {
            writer,
            path: path.to_string(),
        })
    }
}

impl FrameSink for VideoFileSink {
    fn write_frame(&mut self, frame: &Mat) -> Result<()> {
        self.writer
            .write(frame)
            .map_err(|e| Error::VideoWrite(format!("{}: {e}", self.path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_fails() {
        let result = VideoFileSource::open("definitely_missing_video.mp4");
        assert!(result.is_err());
    }
}
