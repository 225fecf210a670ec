//! Painting frames onto the display canvas.
//!
use anyhow::Result;
use bytes::Bytes;
use image::{imageops, Rgb, RgbImage};

/// Background of the canvas before the first frame arrives.
pub const CANVAS_BACKGROUND: Rgb<u8> = Rgb([0x11, 0x11, 0x11]);

const JPEG_QUALITY: i32 = 85;

/// Dark canvas shown while no camera is running.
pub fn blank_canvas(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, CANVAS_BACKGROUND)
}

/// Scale a camera frame to the canvas size.
pub fn paint_frame(frame: &RgbImage, width: u32, height: u32) -> RgbImage {
    if frame.dimensions() == (width, height) {
        return frame.clone();
    }
    imageops::resize(frame, width, height, imageops::FilterType::Triangle)
}

/// Compress a canvas into a JPEG.
pub fn encode_jpeg(canvas: &RgbImage) -> Result<Vec<u8>> {
    let buf = turbojpeg::compress_image(canvas, JPEG_QUALITY, turbojpeg::Subsamp::Sub2x2)?;
    Ok(buf.to_vec())
}

/// Wrap a JPEG into one part of a `multipart/x-mixed-replace` stream.
pub fn as_jpeg_stream_item(jpeg: &[u8]) -> Bytes {
    Bytes::from(
        [
            "--frame\r\nContent-Type: image/jpeg\r\n\r\n".as_bytes(),
            jpeg,
            "\r\n\r\n".as_bytes(),
        ]
        .concat(),
    )
}
