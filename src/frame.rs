use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::error::{Result, SignError};

/// A single video frame handed to the detection pipeline
#[derive(Debug, Clone)]
pub struct Frame {
    /// Caller-assigned frame identifier
    pub id: u64,
    /// Timestamp when the frame was captured
    pub timestamp: SystemTime,
    /// Decoded RGB pixels (shared ownership, frames are cloned per strategy)
    pub image: Arc<RgbImage>,
}

impl Frame {
    /// Create a frame from an already decoded RGB image
    pub fn new(id: u64, image: RgbImage) -> Self {
        Self {
            id,
            timestamp: SystemTime::now(),
            image: Arc::new(image),
        }
    }

    /// Create a frame from raw packed RGB24 bytes
    pub fn from_rgb_bytes(id: u64, width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(SignError::system(format!(
                "RGB buffer has {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }

        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| SignError::system("Failed to wrap RGB buffer"))?;
        Ok(Self::new(id, image))
    }

    /// Decode any image format supported by the `image` crate
    pub fn open<P: AsRef<Path>>(id: u64, path: P) -> Result<Self> {
        let image = image::open(path.as_ref())?.to_rgb8();
        Ok(Self::new(id, image))
    }

    /// Frame filled with a single colour, mostly useful for tests and probes
    pub fn solid(id: u64, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::new(id, RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Check if frame is older than specified duration
    pub fn is_older_than(&self, duration: Duration) -> bool {
        SystemTime::now()
            .duration_since(self.timestamp)
            .map(|age| age > duration)
            .unwrap_or(false)
    }

    /// Resample the frame to the given size
    pub fn resized(&self, width: u32, height: u32) -> RgbImage {
        if self.width() == width && self.height() == height {
            return (*self.image).clone();
        }
        image::imageops::resize(self.image.as_ref(), width, height, FilterType::Triangle)
    }

    /// Encode the frame as JPEG
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder.encode_image(self.image.as_ref())?;
        Ok(buf)
    }

    /// JPEG-encode and base64 the frame for JSON transport
    pub fn to_base64_jpeg(&self, quality: u8) -> Result<String> {
        let jpeg = self.encode_jpeg(quality)?;
        Ok(BASE64.encode(jpeg))
    }
}
