//! Модуль предобработки изображений
//!
//! Строит последовательность вариантов кадра для повторных попыток декодирования:
//! - Поворот вокруг центра с сохранением размеров холста
//! - Локальное выравнивание контраста (CLAHE)
//! - Медианное шумоподавление
//! - Бинаризация по порогу Оцу
//! - Увеличение в 2 раза для мелких модулей
//!
//! Варианты вычисляются лениво: следующий строится только если предыдущий
//! не дал результата.

use std::fmt;

use image::imageops::FilterType;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use serde::{Deserialize, Serialize};

use crate::frame::{replicate_gray, Frame, Rect};

/// Конфигурация предобработки
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Перебирать углы поворота (иначе только 0°)
    pub rotation_sweep: bool,
    /// Углы поворота в градусах, в порядке перебора
    pub rotation_angles: Vec<f32>,
    /// Включить локальное выравнивание контраста
    pub enhance_contrast: bool,
    /// Порог ограничения гистограммы CLAHE
    pub clahe_clip_limit: f32,
    /// Размер сетки тайлов CLAHE (grid x grid)
    pub clahe_grid: u32,
    /// Включить медианное шумоподавление
    pub denoise: bool,
    /// Радиус медианного фильтра (1 = окно 3x3)
    pub median_radius: u32,
    /// Коэффициент увеличения после бинаризации
    pub upscale_factor: f32,
    /// Сторона области интереса относительно меньшей стороны кадра
    pub roi_fraction: f32,
    /// Искать сначала в области интереса (live)
    pub roi_cropping: bool,
    /// Sigma сглаживания перед усилением деталей
    pub detail_smooth_sigma: f32,
    /// Sigma маски нерезкости
    pub detail_sharpen_sigma: f32,
    /// Порог маски нерезкости
    pub detail_threshold: i32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            rotation_sweep: true,
            rotation_angles: vec![0.0, 45.0, -45.0, 90.0, -90.0],
            enhance_contrast: true,
            clahe_clip_limit: 2.0,
            clahe_grid: 8,
            denoise: true,
            median_radius: 1,
            upscale_factor: 2.0,
            roi_fraction: 0.7,
            roi_cropping: true,
            detail_smooth_sigma: 1.0,
            detail_sharpen_sigma: 2.0,
            detail_threshold: 2,
        }
    }
}

/// Вид фотометрической обработки варианта
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Enhancement {
    /// Полный рецепт: яркость, CLAHE, медиана, Оцу, увеличение
    Binarized,
    /// ROI в цвете с усилением деталей
    RoiEnhancedColor,
    /// ROI в оттенках серого после CLAHE
    RoiEnhancedGray,
    /// ROI после бинаризации
    RoiBinary,
    /// Весь кадр после бинаризации
    FullFrameBinary,
}

/// Описание одного варианта предобработки
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformVariant {
    pub rotation_deg: f32,
    pub enhancement: Enhancement,
}

impl fmt::Display for TransformVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} @ {}°", self.enhancement, self.rotation_deg)
    }
}

/// Порядок слоёв live-сканирования
const LIVE_LAYERS: [Enhancement; 4] = [
    Enhancement::RoiEnhancedColor,
    Enhancement::RoiEnhancedGray,
    Enhancement::RoiBinary,
    Enhancement::FullFrameBinary,
];

/// Процессор изображений
#[derive(Debug, Clone, Default)]
pub struct ImageProcessor {
    config: ProcessingConfig,
}

impl ImageProcessor {
    /// Создание процессора с конфигурацией
    pub fn new(config: ProcessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Углы, которые будут перебраны для одиночного изображения
    pub fn angles(&self) -> &[f32] {
        if self.config.rotation_sweep {
            &self.config.rotation_angles
        } else {
            &[0.0]
        }
    }

    /// Варианты для одиночного изображения (по одному на угол)
    pub fn single_shot_variants<'a>(&'a self, frame: &'a Frame) -> SingleShotVariants<'a> {
        SingleShotVariants {
            processor: self,
            frame,
            next_angle: 0,
        }
    }

    /// Слои для live-сканирования: ROI цвет, ROI серый, ROI бинарный, весь кадр
    pub fn live_variants<'a>(&'a self, frame: &'a Frame) -> LiveVariants<'a> {
        let roi = Rect::centered_square(frame.width(), frame.height(), self.config.roi_fraction);
        let skip_roi = !self.config.roi_cropping || roi.is_empty();

        LiveVariants {
            processor: self,
            frame,
            roi,
            next_layer: if skip_roi { LIVE_LAYERS.len() - 1 } else { 0 },
            roi_gray: None,
        }
    }

    /// Полный рецепт одиночного изображения для одного угла
    pub fn single_shot(&self, frame: &Frame, angle_deg: f32) -> GrayImage {
        let rotated = self.rotate(frame, angle_deg);
        let gray = self.enhanced_gray(&rotated);
        let binary = self.binarize(&gray);
        self.upscale(&binary)
    }

    /// Поворот вокруг центра; области вне исходника заливаются белым
    pub fn rotate(&self, frame: &Frame, angle_deg: f32) -> Frame {
        if angle_deg == 0.0 {
            return frame.clone();
        }
        // imageproc rotates clockwise for positive theta (y axis points down)
        let theta = -angle_deg.to_radians();

        match frame {
            Frame::Luma(img) => Frame::Luma(rotate_about_center(img, theta, Interpolation::Bilinear, Luma([255]))),
            Frame::Rgb(img) => Frame::Rgb(rotate_about_center(
                img,
                theta,
                Interpolation::Bilinear,
                Rgb([255, 255, 255]),
            )),
        }
    }

    /// Яркость + CLAHE (шаги 2-3)
    pub fn enhanced_gray(&self, frame: &Frame) -> GrayImage {
        let gray = frame.to_luma();
        if self.config.enhance_contrast {
            self.equalize_local(&gray)
        } else {
            gray
        }
    }

    /// Медиана + Оцу (шаги 4-5)
    pub fn binarize(&self, gray: &GrayImage) -> GrayImage {
        if self.config.denoise {
            self.binarize_otsu(&self.median_denoise(gray))
        } else {
            self.binarize_otsu(gray)
        }
    }

    /// Contrast Limited Adaptive Histogram Equalization.
    ///
    /// Each tile gets its own clipped-histogram LUT; pixels blend the LUTs of
    /// the four nearest tile centers bilinearly so tile borders do not show.
    pub fn equalize_local(&self, img: &GrayImage) -> GrayImage {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return img.clone();
        }

        let grid = self.config.clahe_grid.max(1);
        let tile_w = width.div_ceil(grid.min(width));
        let tile_h = height.div_ceil(grid.min(height));
        let tiles_x = width.div_ceil(tile_w);
        let tiles_y = height.div_ceil(tile_h);

        let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let x0 = tx * tile_w;
                let y0 = ty * tile_h;
                let x1 = (x0 + tile_w).min(width);
                let y1 = (y0 + tile_h).min(height);

                let mut histogram = [0u32; 256];
                for y in y0..y1 {
                    for x in x0..x1 {
                        histogram[img.get_pixel(x, y).0[0] as usize] += 1;
                    }
                }
                luts.push(clipped_lut(&mut histogram, (x1 - x0) * (y1 - y0), self.config.clahe_clip_limit));
            }
        }

        let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];
        let mut result = GrayImage::new(width, height);

        for (x, y, p) in img.enumerate_pixels() {
            let (tx0, tx1, ax) = tile_neighbours(x, tile_w, tiles_x);
            let (ty0, ty1, ay) = tile_neighbours(y, tile_h, tiles_y);
            let v = p.0[0] as usize;

            let top = lut_at(tx0, ty0)[v] as f32 * (1.0 - ax) + lut_at(tx1, ty0)[v] as f32 * ax;
            let bottom = lut_at(tx0, ty1)[v] as f32 * (1.0 - ax) + lut_at(tx1, ty1)[v] as f32 * ax;
            let value = top * (1.0 - ay) + bottom * ay;

            result.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
        result
    }

    /// Медианный фильтр для удаления импульсного шума
    pub fn median_denoise(&self, img: &GrayImage) -> GrayImage {
        let r = self.config.median_radius;
        if r == 0 {
            return img.clone();
        }
        imageproc::filter::median_filter(img, r, r)
    }

    /// Глобальная бинаризация: порог по Оцу, тёмное → 0, светлое → 255
    pub fn binarize_otsu(&self, img: &GrayImage) -> GrayImage {
        let level = imageproc::contrast::otsu_level(img);
        imageproc::contrast::threshold(img, level)
    }

    /// Увеличение с линейной интерполяцией
    pub fn upscale(&self, img: &GrayImage) -> GrayImage {
        let factor = self.config.upscale_factor;
        if factor <= 1.0 {
            return img.clone();
        }

        let (width, height) = img.dimensions();
        let new_width = (width as f32 * factor).round() as u32;
        let new_height = (height as f32 * factor).round() as u32;

        image::imageops::resize(img, new_width, new_height, FilterType::Triangle)
    }

    /// Сглаживание с последующим усилением деталей (цветной ROI)
    pub fn detail_enhance(&self, img: &RgbImage) -> RgbImage {
        let smoothed = image::imageops::blur(img, self.config.detail_smooth_sigma);
        image::imageops::unsharpen(&smoothed, self.config.detail_sharpen_sigma, self.config.detail_threshold)
    }
}

/// Clip the histogram, spread the excess evenly, return the CDF mapping.
fn clipped_lut(histogram: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let limit = ((clip_limit * area as f32) / 256.0).max(1.0) as u32;

    let mut excess = 0u32;
    for count in histogram.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    let per_bin = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, count) in histogram.iter_mut().enumerate() {
        *count += per_bin + u32::from(i < remainder);
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u64;
    for (i, &count) in histogram.iter().enumerate() {
        cdf += count as u64;
        lut[i] = ((cdf * 255 + area as u64 / 2) / area as u64).min(255) as u8;
    }
    lut
}

/// Индексы двух соседних тайлов и вес второго
fn tile_neighbours(pos: u32, tile: u32, tiles: u32) -> (u32, u32, f32) {
    let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
    let t0 = f.floor().clamp(0.0, (tiles - 1) as f32) as u32;
    let t1 = (t0 + 1).min(tiles - 1);
    let weight = if t1 == t0 { 0.0 } else { (f - t0 as f32).clamp(0.0, 1.0) };
    (t0, t1, weight)
}

/// Ленивая последовательность вариантов одиночного изображения.
///
/// `Clone` даёт независимую копию с той же позиции, поэтому перебор можно
/// начать заново от исходного значения.
#[derive(Clone)]
pub struct SingleShotVariants<'a> {
    processor: &'a ImageProcessor,
    frame: &'a Frame,
    next_angle: usize,
}

impl Iterator for SingleShotVariants<'_> {
    type Item = (TransformVariant, Frame);

    fn next(&mut self) -> Option<Self::Item> {
        let angle = *self.processor.angles().get(self.next_angle)?;
        self.next_angle += 1;

        let variant = TransformVariant {
            rotation_deg: angle,
            enhancement: Enhancement::Binarized,
        };
        Some((variant, Frame::Luma(self.processor.single_shot(self.frame, angle))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.processor.angles().len().saturating_sub(self.next_angle);
        (left, Some(left))
    }
}

/// Ленивая последовательность слоёв live-сканирования
#[derive(Clone)]
pub struct LiveVariants<'a> {
    processor: &'a ImageProcessor,
    frame: &'a Frame,
    roi: Rect,
    next_layer: usize,
    roi_gray: Option<GrayImage>,
}

impl LiveVariants<'_> {
    /// Область интереса, в которой ищутся первые три слоя
    pub fn roi(&self) -> Rect {
        self.roi
    }

    fn roi_gray(&mut self) -> GrayImage {
        if let Some(gray) = &self.roi_gray {
            return gray.clone();
        }
        let gray = self.processor.enhanced_gray(&self.frame.crop(self.roi));
        self.roi_gray = Some(gray.clone());
        gray
    }
}

impl Iterator for LiveVariants<'_> {
    type Item = (TransformVariant, Frame);

    fn next(&mut self) -> Option<Self::Item> {
        let enhancement = *LIVE_LAYERS.get(self.next_layer)?;
        self.next_layer += 1;

        let image = match enhancement {
            Enhancement::RoiEnhancedColor => {
                let roi = self.frame.crop(self.roi).to_rgb();
                self.processor.detail_enhance(&roi)
            }
            Enhancement::RoiEnhancedGray => replicate_gray(&self.roi_gray()),
            Enhancement::RoiBinary => {
                let gray = self.roi_gray();
                replicate_gray(&self.processor.binarize(&gray))
            }
            Enhancement::FullFrameBinary | Enhancement::Binarized => {
                let gray = self.processor.enhanced_gray(self.frame);
                replicate_gray(&self.processor.binarize(&gray))
            }
        };

        let variant = TransformVariant {
            rotation_deg: 0.0,
            enhancement,
        };
        Some((variant, Frame::Rgb(image)))
    }
}
