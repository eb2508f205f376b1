//! Кадр изображения
//!
//! Неизменяемая сетка пикселей с глубиной 1 (яркость) или 3 (RGB) канала.
//! Все преобразования создают новый кадр, исходный не изменяется.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Кадр: одноканальный или трёхканальный
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Luma(GrayImage),
    Rgb(RgbImage),
}

/// Прямоугольная область кадра
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Centered square whose side is `fraction` of the shorter dimension.
    pub fn centered_square(width: u32, height: u32, fraction: f32) -> Self {
        let side = (width.min(height) as f32 * fraction.clamp(0.0, 1.0)).round() as u32;
        Self {
            x: (width - side) / 2,
            y: (height - side) / 2,
            width: side,
            height: side,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Центр области
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

impl Frame {
    pub fn width(&self) -> u32 {
        match self {
            Frame::Luma(img) => img.width(),
            Frame::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Frame::Luma(img) => img.height(),
            Frame::Rgb(img) => img.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Количество каналов (1 или 3)
    pub fn channels(&self) -> u8 {
        match self {
            Frame::Luma(_) => 1,
            Frame::Rgb(_) => 3,
        }
    }

    /// Кадр нулевой площади
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Яркостное представление (ITU-R BT.601, как в `image`)
    pub fn to_luma(&self) -> GrayImage {
        match self {
            Frame::Luma(img) => img.clone(),
            Frame::Rgb(img) => DynamicImage::ImageRgb8(img.clone()).to_luma8(),
        }
    }

    /// Трёхканальное представление; яркость реплицируется во все каналы
    pub fn to_rgb(&self) -> RgbImage {
        match self {
            Frame::Rgb(img) => img.clone(),
            Frame::Luma(img) => replicate_gray(img),
        }
    }

    /// Вырезание области; область обрезается по границам кадра
    pub fn crop(&self, rect: Rect) -> Frame {
        let x = rect.x.min(self.width());
        let y = rect.y.min(self.height());
        let w = rect.width.min(self.width() - x);
        let h = rect.height.min(self.height() - y);

        match self {
            Frame::Luma(img) => Frame::Luma(image::imageops::crop_imm(img, x, y, w, h).to_image()),
            Frame::Rgb(img) => Frame::Rgb(image::imageops::crop_imm(img, x, y, w, h).to_image()),
        }
    }
}

impl From<GrayImage> for Frame {
    fn from(img: GrayImage) -> Self {
        Frame::Luma(img)
    }
}

impl From<RgbImage> for Frame {
    fn from(img: RgbImage) -> Self {
        Frame::Rgb(img)
    }
}

impl From<DynamicImage> for Frame {
    fn from(img: DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(gray) => Frame::Luma(gray),
            DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
                Frame::Luma(img.to_luma8())
            }
            DynamicImage::ImageRgb8(rgb) => Frame::Rgb(rgb),
            // Alpha and wide formats collapse to 8-bit RGB
            other => Frame::Rgb(other.to_rgb8()),
        }
    }
}

/// Серое изображение → RGB с одинаковыми каналами
pub fn replicate_gray(img: &GrayImage) -> RgbImage {
    let (width, height) = img.dimensions();
    let mut result = RgbImage::new(width, height);

    for (x, y, p) in img.enumerate_pixels() {
        let Luma([v]) = *p;
        result.put_pixel(x, y, Rgb([v, v, v]));
    }
    result
}
