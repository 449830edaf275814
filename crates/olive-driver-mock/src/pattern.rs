//! Test pattern generation for mock camera frames.

use bytes::{BufMut, Bytes, BytesMut};
use olive_core::acquisition::{FrameFormat, PixelType};

/// Render one frame.
///
/// The pixels form a diagonal gradient shifted by `sequence`, so consecutive
/// frames differ. The first eight bytes carry `sequence` little-endian, which
/// lets tests identify a frame without decoding pixels.
pub fn render_frame(format: &FrameFormat, sequence: u64) -> Bytes {
    let width = format.width as usize;
    let height = format.height as usize;
    let mut buf = BytesMut::with_capacity(width * height * format.pixel.bytes_per_pixel());

    for y in 0..height {
        for x in 0..width {
            let level = (x + y) as u64 + sequence;
            match format.pixel {
                PixelType::Mono8 => buf.put_u8(level as u8),
                PixelType::Mono12 => buf.put_u16_le((level & 0x0FFF) as u16),
                PixelType::Mono16 => buf.put_u16_le(level as u16),
                PixelType::Rgb24 => {
                    buf.put_u8(level as u8);
                    buf.put_u8((level >> 1) as u8);
                    buf.put_u8((level >> 2) as u8);
                }
            }
        }
    }

    if buf.len() >= 8 {
        buf[..8].copy_from_slice(&sequence.to_le_bytes());
    }
    buf.freeze()
}

/// Sequence number stamped by [`render_frame`], if the frame is large enough.
pub fn frame_sequence(data: &[u8]) -> Option<u64> {
    let header: [u8; 8] = data.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(header))
}
