use crate::error::AnalyzerError;
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Packed 8-bit RGB
    Rgb24,
    /// YUV 4:2:2, two bytes per pixel
    Yuyv,
    /// Single 8-bit intensity channel
    Gray8,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Rgb24 => 3,
            FrameFormat::Yuyv => 2,
            FrameFormat::Gray8 => 1,
        }
    }
}

/// Frame data structure containing raw frame data and metadata
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Sequence number assigned by the source
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw pixel data (shared so recorder and detector can hold the same frame)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel layout
    pub format: FrameFormat,
}

impl FrameData {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Build a frame where every pixel has the same RGB value
    pub fn solid_rgb(id: u64, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(id, SystemTime::now(), data, width, height, FrameFormat::Rgb24)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn expected_size(&self) -> usize {
        self.pixel_count() * self.format.bytes_per_pixel()
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Convert to an intensity image using BT.601 luma weights
    pub fn to_gray_image(&self) -> Result<GrayImage, AnalyzerError> {
        if !self.validate_size() {
            return Err(AnalyzerError::FrameConversion {
                details: format!(
                    "frame {} has {} bytes, expected {} for {}x{} {:?}",
                    self.id,
                    self.data.len(),
                    self.expected_size(),
                    self.width,
                    self.height,
                    self.format
                ),
            });
        }

        let gray = match self.format {
            FrameFormat::Gray8 => GrayImage::from_raw(self.width, self.height, self.data.to_vec()),
            FrameFormat::Rgb24 => {
                let luma = self
                    .data
                    .chunks_exact(3)
                    .map(|px| rgb_to_luma(px[0], px[1], px[2]))
                    .collect();
                GrayImage::from_raw(self.width, self.height, luma)
            }
            FrameFormat::Yuyv => {
                let mut image = GrayImage::new(self.width, self.height);
                // Y0 U Y1 V carries two pixels; the Y samples are the intensity
                for (i, y) in self.data.iter().step_by(2).enumerate() {
                    let x = (i % self.width as usize) as u32;
                    let row = (i / self.width as usize) as u32;
                    image.put_pixel(x, row, Luma([*y]));
                }
                Some(image)
            }
        };

        gray.ok_or_else(|| AnalyzerError::FrameConversion {
            details: format!("could not build grayscale image for frame {}", self.id),
        })
    }

    /// Packed RGB bytes for encoders that only accept color input
    pub fn to_rgb_bytes(&self) -> Result<Arc<Vec<u8>>, AnalyzerError> {
        match self.format {
            FrameFormat::Rgb24 => Ok(Arc::clone(&self.data)),
            FrameFormat::Gray8 => Ok(Arc::new(
                self.data.iter().flat_map(|&v| [v, v, v]).collect(),
            )),
            FrameFormat::Yuyv => {
                if !self.validate_size() {
                    return Err(AnalyzerError::FrameConversion {
                        details: format!("YUYV frame {} has unexpected size", self.id),
                    });
                }
                let mut rgb = Vec::with_capacity(self.pixel_count() * 3);
                for quad in self.data.chunks_exact(4) {
                    let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
                    rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
                    rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
                }
                Ok(Arc::new(rgb))
            }
        }
    }
}

fn rgb_to_luma(r: u8, g: u8, b: u8) -> u8 {
    // Fixed-point 0.299 R + 0.587 G + 0.114 B, rounded
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14) as u8
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as f32 - 16.0;
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;
    let clamp = |x: f32| x.round().clamp(0.0, 255.0) as u8;
    [
        clamp(1.164 * c + 1.596 * e),
        clamp(1.164 * c - 0.392 * d - 0.813 * e),
        clamp(1.164 * c + 2.017 * d),
    ]
}
