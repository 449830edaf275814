//! Frame formats and delivered frames.

use crate::error::{HalError, HalResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel encodings a camera can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    /// 8-bit monochrome
    Mono8,
    /// 12-bit samples stored in 16-bit words
    Mono12,
    /// 16-bit monochrome
    Mono16,
    /// Packed 8-bit RGB
    Rgb24,
}

impl PixelType {
    /// Bytes one pixel occupies in a frame buffer.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelType::Mono8 => 1,
            PixelType::Mono12 | PixelType::Mono16 => 2,
            PixelType::Rgb24 => 3,
        }
    }

    /// Parse a device label such as `"mono16"` (case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "mono8" => Some(PixelType::Mono8),
            "mono12" => Some(PixelType::Mono12),
            "mono16" => Some(PixelType::Mono16),
            "rgb24" => Some(PixelType::Rgb24),
            _ => None,
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PixelType::Mono8 => "mono8",
            PixelType::Mono12 => "mono12",
            PixelType::Mono16 => "mono16",
            PixelType::Rgb24 => "rgb24",
        };
        f.write_str(s)
    }
}

/// Geometry and encoding of every slot in a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFormat {
    /// Columns
    pub width: u32,
    /// Rows
    pub height: u32,
    /// Sample encoding
    pub pixel: PixelType,
}

impl FrameFormat {
    /// Layout of `width` x `height` pixels.
    pub fn new(width: u32, height: u32, pixel: PixelType) -> Self {
        Self { width, height, pixel }
    }

    /// Pixels per frame, failing on overflow.
    pub fn pixel_count(&self) -> HalResult<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .ok_or_else(|| self.overflow())
    }

    /// Bytes in one frame.
    pub fn frame_bytes(&self) -> HalResult<usize> {
        self.pixel_count()?
            .checked_mul(self.pixel.bytes_per_pixel())
            .ok_or_else(|| self.overflow())
    }

    /// Bytes for a ring of `frame_count` slots.
    pub fn ring_bytes(&self, frame_count: usize) -> HalResult<usize> {
        self.frame_bytes()?
            .checked_mul(frame_count)
            .ok_or_else(|| self.overflow())
    }

    fn overflow(&self) -> HalError {
        HalError::InvalidArgument(format!(
            "frame size overflow: {}x{} {}",
            self.width, self.height, self.pixel
        ))
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.pixel)
    }
}

/// One frame handed to the consumer.
#[derive(Debug, Clone)]
pub struct FrameSlot {
    /// Ring slot the frame was read from
    pub index: usize,
    /// Running count of frames delivered this acquisition, starting at 1
    pub sequence: u64,
    /// Frames skipped to reach this one (non-zero only in `Latest` mode)
    pub dropped: usize,
    /// Layout fixed when capture started
    pub format: FrameFormat,
    /// Pixel payload copied out of the slot
    pub data: Bytes,
}

impl FrameSlot {
    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result of a single extraction.
#[derive(Debug, Clone)]
pub enum Extraction {
    /// The next frame
    Frame(FrameSlot),
    /// Acquisition was stopped while the call was pending.
    Aborted,
    /// Snap capture finished and every frame has been handed out.
    Complete,
}

impl Extraction {
    /// The frame, if this extraction produced one.
    pub fn into_frame(self) -> Option<FrameSlot> {
        match self {
            Extraction::Frame(frame) => Some(frame),
            Extraction::Aborted | Extraction::Complete => None,
        }
    }

    /// Whether a stop interrupted the call.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Extraction::Aborted)
    }
}
