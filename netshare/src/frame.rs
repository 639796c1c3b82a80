//! Captured screen frames

use crate::errors::ScanError;
use image::RgbaImage;

const BYTES_PER_PIXEL: usize = 4;

/// One captured screen frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw RGBA pixel data, tightly packed
    pub image_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(image_data: Vec<u8>, width: u32, height: u32) -> Result<Self, ScanError> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if image_data.len() != expected {
            return Err(ScanError::InvalidFrame(format!(
                "expected {expected} bytes for {width}x{height}, got {}",
                image_data.len()
            )));
        }
        Ok(Self {
            image_data,
            width,
            height,
        })
    }

    /// Build a frame from a mirroring buffer whose rows may carry trailing padding
    /// (`row_stride` bytes per row, at least `width * 4`). The padding is cropped.
    pub fn from_padded_rows(
        buffer: &[u8],
        width: u32,
        height: u32,
        row_stride: usize,
    ) -> Result<Self, ScanError> {
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        if row_stride < row_bytes {
            return Err(ScanError::InvalidFrame(format!(
                "row stride {row_stride} is smaller than a {width}-pixel row"
            )));
        }
        // The last row is not required to carry its padding
        let needed = row_stride * (height as usize).saturating_sub(1) + row_bytes;
        if height > 0 && buffer.len() < needed {
            return Err(ScanError::InvalidFrame(format!(
                "buffer of {} bytes too small for {height} rows of stride {row_stride}",
                buffer.len()
            )));
        }

        let mut image_data = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * row_stride;
            image_data.extend_from_slice(&buffer[start..start + row_bytes]);
        }
        Self::new(image_data, width, height)
    }

    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            image_data: image.into_raw(),
            width,
            height,
        }
    }

    /// View the frame as an image for decoders that work on `image` buffers
    pub fn to_image(&self) -> Result<RgbaImage, ScanError> {
        RgbaImage::from_raw(self.width, self.height, self.image_data.clone()).ok_or_else(|| {
            ScanError::InvalidFrame(format!(
                "{} bytes do not fill a {}x{} image",
                self.image_data.len(),
                self.width,
                self.height
            ))
        })
    }
}
