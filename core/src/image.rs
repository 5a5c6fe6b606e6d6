use image::{GrayImage, ImageBuffer, Luma, RgbImage, RgbaImage};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    U8,
    U16,
    F32,
}

/// Elementary pixel kind of an image: element type plus channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelKind {
    pub pixel_type: PixelType,
    pub channels: u8,
}

impl PixelKind {
    /// Single-channel 8-bit, the kind every integral-image consumer expects.
    pub const GRAY8: PixelKind = PixelKind::new(PixelType::U8, 1);
    pub const GRAY16: PixelKind = PixelKind::new(PixelType::U16, 1);
    pub const GRAY32F: PixelKind = PixelKind::new(PixelType::F32, 1);
    pub const RGB8: PixelKind = PixelKind::new(PixelType::U8, 3);
    pub const RGBA8: PixelKind = PixelKind::new(PixelType::U8, 4);

    pub const fn new(pixel_type: PixelType, channels: u8) -> Self {
        Self {
            pixel_type,
            channels,
        }
    }
}

impl fmt::Display for PixelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}x{}", self.pixel_type, self.channels)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub kind: PixelKind,
}

impl ImageInfo {
    pub fn new(width: u32, height: u32, kind: PixelKind) -> Self {
        Self {
            width,
            height,
            kind,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;
pub type Gray32FImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Image containers the algorithms in this workspace accept.
///
/// Algorithms that only work on one pixel kind check [`CvImage::info`] and
/// then borrow the concrete buffer through the matching accessor.
pub trait CvImage {
    fn info(&self) -> ImageInfo;

    /// The image as an 8-bit single-channel buffer, when it is one.
    fn as_gray8(&self) -> Option<&GrayImage> {
        None
    }
}

impl CvImage for GrayImage {
    fn info(&self) -> ImageInfo {
        ImageInfo::new(self.width(), self.height(), PixelKind::GRAY8)
    }

    fn as_gray8(&self) -> Option<&GrayImage> {
        Some(self)
    }
}

impl CvImage for Gray16Image {
    fn info(&self) -> ImageInfo {
        ImageInfo::new(self.width(), self.height(), PixelKind::GRAY16)
    }
}

impl CvImage for Gray32FImage {
    fn info(&self) -> ImageInfo {
        ImageInfo::new(self.width(), self.height(), PixelKind::GRAY32F)
    }
}

impl CvImage for RgbImage {
    fn info(&self) -> ImageInfo {
        ImageInfo::new(self.width(), self.height(), PixelKind::RGB8)
    }
}

impl CvImage for RgbaImage {
    fn info(&self) -> ImageInfo {
        ImageInfo::new(self.width(), self.height(), PixelKind::RGBA8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_image_reports_gray8() {
        let img = GrayImage::new(7, 3);
        let info = CvImage::info(&img);
        assert_eq!(info.dimensions(), (7, 3));
        assert_eq!(info.kind, PixelKind::GRAY8);
        assert!(img.as_gray8().is_some());
    }

    #[test]
    fn color_and_wide_images_are_not_gray8() {
        let rgb = RgbImage::new(4, 4);
        let g16 = Gray16Image::new(4, 4);
        assert_eq!(CvImage::info(&rgb).kind, PixelKind::RGB8);
        assert!(rgb.as_gray8().is_none());
        assert_eq!(CvImage::info(&g16).kind, PixelKind::GRAY16);
        assert!(g16.as_gray8().is_none());
    }

    #[test]
    fn pixel_kind_display() {
        assert_eq!(PixelKind::GRAY8.to_string(), "U8x1");
        assert_eq!(PixelKind::RGBA8.to_string(), "U8x4");
    }
}
