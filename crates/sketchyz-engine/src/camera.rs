use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use image::ImageFormat;
use sketchyz_contracts::image_data::ImageData;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CameraFacing {
    #[default]
    Environment,
    User,
}

impl CameraFacing {
    pub fn flip(self) -> Self {
        match self {
            Self::Environment => Self::User,
            Self::User => Self::Environment,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::User => "user",
        }
    }
}

impl fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live video stream. `capture_frame` returns `None` until a frame is ready.
pub trait CameraStream: Send {
    fn capture_frame(&mut self) -> Result<Option<ImageData>>;
    fn stop(&mut self);
}

pub trait CameraDevice: Send + Sync {
    fn open(&self, facing: CameraFacing) -> Result<Box<dyn CameraStream>>;
}

/// Holds at most one open stream and stops it when released or dropped.
#[derive(Default)]
pub struct CameraSession {
    stream: Option<Box<dyn CameraStream>>,
    facing: CameraFacing,
}

impl CameraSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    /// Replaces any open stream; the previous one is stopped first.
    pub fn attach(&mut self, stream: Box<dyn CameraStream>, facing: CameraFacing) {
        self.release();
        self.stream = Some(stream);
        self.facing = facing;
    }

    pub fn capture(&mut self) -> Result<Option<ImageData>> {
        match self.stream.as_mut() {
            Some(stream) => stream.capture_frame(),
            None => Ok(None),
        }
    }

    /// Returns whether a stream was actually stopped.
    pub fn release(&mut self) -> bool {
        match self.stream.take() {
            Some(mut stream) => {
                stream.stop();
                true
            }
            None => false,
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraSession")
            .field("active", &self.is_active())
            .field("facing", &self.facing)
            .finish()
    }
}

/// Host without a camera; every open attempt fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCamera;

impl CameraDevice for NoCamera {
    fn open(&self, _facing: CameraFacing) -> Result<Box<dyn CameraStream>> {
        bail!("no camera available on this device")
    }
}

/// Serves a still image file as the camera feed. Front-facing frames are
/// mirrored the way a selfie preview is.
#[derive(Debug, Clone)]
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CameraDevice for StillImageCamera {
    fn open(&self, facing: CameraFacing) -> Result<Box<dyn CameraStream>> {
        if !self.path.is_file() {
            bail!("camera feed {} is not available", self.path.display());
        }
        Ok(Box::new(StillImageStream {
            path: self.path.clone(),
            facing,
            stopped: false,
        }))
    }
}

struct StillImageStream {
    path: PathBuf,
    facing: CameraFacing,
    stopped: bool,
}

impl CameraStream for StillImageStream {
    fn capture_frame(&mut self) -> Result<Option<ImageData>> {
        if self.stopped {
            return Ok(None);
        }
        let frame = ImageData::from_path(&self.path)?;
        if self.facing == CameraFacing::Environment {
            return Ok(Some(frame));
        }
        let decoded = image::load_from_memory(&frame.bytes)
            .with_context(|| format!("failed decoding {}", self.path.display()))?;
        let mut bytes = Vec::new();
        decoded
            .fliph()
            .to_rgb8()
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .context("mirrored frame encode failed")?;
        Ok(Some(ImageData::new("image/jpeg", bytes)))
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
