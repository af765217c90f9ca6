use std::fmt::{self, Display};

use image::{ColorType, DynamicImage};

use super::Error;

/// Packed 8-bit pixel layouts a [`Frame`] can carry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Bgr,
    Rgb,
    Bgra,
    Rgba,
    Gray8,
}

impl PixelFormat {
    pub fn channels(&self) -> u32 {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Bgr | PixelFormat::Rgb => 3,
            PixelFormat::Bgra | PixelFormat::Rgba => 4,
        }
    }

    /// Bits per channel.
    pub fn depth(&self) -> u32 {
        8
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.channels() * self.depth() / 8
    }
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Bgr => write!(f, "BGR"),
            PixelFormat::Rgb => write!(f, "RGB"),
            PixelFormat::Bgra => write!(f, "BGRA"),
            PixelFormat::Rgba => write!(f, "RGBA"),
            PixelFormat::Gray8 => write!(f, "GRAY8"),
        }
    }
}

/// One tightly packed image: row stride is `width * bytes_per_pixel`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, Error> {
        let expected = width as usize * height as usize * format.bytes_per_pixel() as usize;
        if data.len() != expected {
            return Err(Error::InvalidFrame(format!(
                "{}x{} {} needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel() as usize
    }

    pub fn details(&self) -> FrameDetails {
        FrameDetails {
            width: self.width,
            height: self.height,
            channels: self.format.channels(),
            depth: self.format.depth(),
            pixel_size: self.format.bytes_per_pixel(),
            format: self.format,
            size: self.data.len(),
        }
    }
}

impl From<DynamicImage> for Frame {
    fn from(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let (format, data) = match image.color() {
            ColorType::L8 | ColorType::L16 => (PixelFormat::Gray8, image.into_luma8().into_raw()),
            color if color.has_alpha() => (PixelFormat::Rgba, image.into_rgba8().into_raw()),
            _ => (PixelFormat::Rgb, image.into_rgb8().into_raw()),
        };
        Self {
            data,
            width,
            height,
            format,
        }
    }
}

/// Memory layout summary of a frame, used for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameDetails {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    /// Bits per channel
    pub depth: u32,
    /// Bytes per pixel
    pub pixel_size: u32,
    pub format: PixelFormat,
    /// Bytes in the whole image
    pub size: usize,
}

impl Display for FrameDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Resolution: {}x{}, Number of Channels: {}, Depth: {}-bit unsigned integer, \
             Pixel Size: {} bytes, Format: {}, Image Size: {} bytes",
            self.width,
            self.height,
            self.channels,
            self.depth,
            self.pixel_size,
            self.format,
            self.size
        )
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, RgbImage, RgbaImage};

    use super::*;

    #[test]
    fn new_checks_buffer_length() {
        assert!(Frame::new(2, 2, PixelFormat::Bgr, vec![0; 12]).is_ok());
        assert!(matches!(
            Frame::new(2, 2, PixelFormat::Bgr, vec![0; 11]),
            Err(Error::InvalidFrame(_))
        ));
    }

    #[test]
    fn empty_frames() {
        let frame = Frame::new(0, 4, PixelFormat::Rgb, Vec::new()).unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn details_report_layout() {
        let frame = Frame::new(4, 3, PixelFormat::Bgr, vec![0; 36]).unwrap();
        let details = frame.details();
        assert_eq!(details.channels, 3);
        assert_eq!(details.pixel_size, 3);
        assert_eq!(details.size, 36);
        assert_eq!(frame.stride(), 12);
        assert!(details.to_string().contains("Format: BGR"));
    }

    #[test]
    fn from_image_keeps_channel_layout() {
        let rgb = Frame::from(DynamicImage::ImageRgb8(RgbImage::new(3, 2)));
        assert_eq!((rgb.format, rgb.data.len()), (PixelFormat::Rgb, 18));

        let rgba = Frame::from(DynamicImage::ImageRgba8(RgbaImage::new(3, 2)));
        assert_eq!((rgba.format, rgba.data.len()), (PixelFormat::Rgba, 24));

        let gray = Frame::from(DynamicImage::ImageLuma8(GrayImage::new(3, 2)));
        assert_eq!((gray.format, gray.data.len()), (PixelFormat::Gray8, 6));
    }
}
