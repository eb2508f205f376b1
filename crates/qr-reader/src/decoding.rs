//! Модуль декодирования QR-кодов
//!
//! Использует rqrr как основной декодер с fallback на rxing.
//! "Ничего не найдено" - это пустой результат, а не ошибка.

use std::collections::HashSet;

use image::GrayImage;
use rxing::multi::qrcode::QRCodeMultiReader;
use rxing::multi::MultipleBarcodeReader;
use rxing::{BarcodeFormat, Binarizer, BinaryBitmap, DecodingHintDictionary, Exceptions};
use thiserror::Error;

use crate::frame::Frame;
use crate::{DecodedPayload, TextEncoding};

/// Ошибки декодирования
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Failed to decode QR: {0}")]
    DecodeFailed(String),
}

/// Примитив многосимвольного декодирования QR.
///
/// Возвращает тексты всех найденных символов в порядке обнаружения.
/// Пустые строки допустимы, их отфильтрует [`decode_once`].
pub trait Decoder {
    fn detect_and_decode_multi(&self, frame: &Frame) -> Result<Vec<String>, DecodeError>;
}

impl<D: Decoder + ?Sized> Decoder for &D {
    fn detect_and_decode_multi(&self, frame: &Frame) -> Result<Vec<String>, DecodeError> {
        (**self).detect_and_decode_multi(frame)
    }
}

/// Одна попытка декодирования кадра
pub fn decode_once<D: Decoder + ?Sized>(
    decoder: &D,
    frame: &Frame,
    encoding: TextEncoding,
) -> Result<Vec<DecodedPayload>, DecodeError> {
    let texts = decoder.detect_and_decode_multi(frame)?;
    Ok(texts
        .iter()
        .filter_map(|text| DecodedPayload::from_text(text).map(|p| p.with_encoding(encoding)))
        .collect())
}

/// Декодер QR-кодов с fallback
#[derive(Debug, Clone)]
pub struct QRDecoder {
    /// Пробовать rxing, если rqrr декодировал не все найденные сетки
    rxing_fallback: bool,
}

impl Default for QRDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QRDecoder {
    /// Создание декодера
    pub fn new() -> Self {
        Self { rxing_fallback: true }
    }

    /// Только rqrr, без второго движка
    pub fn without_fallback() -> Self {
        Self { rxing_fallback: false }
    }

    /// Декодирование всех QR на изображении
    pub fn decode_gray(&self, img: &GrayImage) -> Result<Vec<String>, DecodeError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidImage(format!("zero-area image {}x{}", width, height)));
        }

        let (found, grids) = self.decode_with_rqrr(img);
        if !self.rxing_fallback || (!found.is_empty() && found.len() == grids) {
            return Ok(found);
        }

        log::debug!("RQRR decoded {} of {} grids, trying RXING", found.len(), grids);
        match self.decode_with_rxing(img) {
            Ok(extra) => Ok(merge_texts(found, extra)),
            Err(e) if !found.is_empty() => {
                log::debug!("RXING failed, keeping RQRR result: {}", e);
                Ok(found)
            }
            Err(e) => Err(e),
        }
    }

    /// Декодирование через rqrr: тексты декодированных сеток и число всех найденных
    fn decode_with_rqrr(&self, img: &GrayImage) -> (Vec<String>, usize) {
        log::debug!("RQRR: Starting detection on {}x{} image", img.width(), img.height());
        let mut prepared = rqrr::PreparedImage::prepare(img.clone());
        let grids = prepared.detect_grids();
        log::debug!("RQRR: Detected {} grids", grids.len());

        let mut contents = Vec::with_capacity(grids.len());
        for grid in &grids {
            match grid.decode() {
                Ok((meta, content)) => {
                    log::debug!("RQRR: Decode success (version {}, ecc {})", meta.version.0, meta.ecc_level);
                    contents.push(content);
                }
                Err(e) => log::debug!("RQRR: Grid decode failed: {:?}", e),
            }
        }
        (contents, grids.len())
    }

    /// Декодирование через rxing: все символы, HybridBinarizer, затем GlobalHistogramBinarizer
    fn decode_with_rxing(&self, img: &GrayImage) -> Result<Vec<String>, DecodeError> {
        let (width, height) = img.dimensions();

        // Конвертируем grayscale в packed ARGB u32 формат для rxing
        // Формат: 0xAARRGGBB
        let pixels: Vec<u32> = img
            .as_raw()
            .iter()
            .map(|&gray| {
                let g = gray as u32;
                0xFF000000 | (g << 16) | (g << 8) | g
            })
            .collect();

        let mut hints = DecodingHintDictionary::new();
        hints.insert(
            rxing::DecodeHintType::POSSIBLE_FORMATS,
            rxing::DecodeHintValue::PossibleFormats(HashSet::from([BarcodeFormat::QR_CODE])),
        );
        hints.insert(rxing::DecodeHintType::TRY_HARDER, rxing::DecodeHintValue::TryHarder(true));

        let source = rxing::RGBLuminanceSource::new_with_width_height_pixels(width as usize, height as usize, &pixels);
        let hybrid = decode_multiple(
            BinaryBitmap::new(rxing::common::HybridBinarizer::new(source)),
            &hints,
        )?;
        if !hybrid.is_empty() {
            log::debug!("RXING: Decoded {} symbols (HybridBinarizer)", hybrid.len());
            return Ok(hybrid);
        }

        let source = rxing::RGBLuminanceSource::new_with_width_height_pixels(width as usize, height as usize, &pixels);
        let global = decode_multiple(
            BinaryBitmap::new(rxing::common::GlobalHistogramBinarizer::new(source)),
            &hints,
        )?;
        log::debug!("RXING: Decoded {} symbols (GlobalHistogramBinarizer)", global.len());
        Ok(global)
    }
}

/// Все QR-символы одного бинаризованного изображения
fn decode_multiple<B: Binarizer>(
    mut bitmap: BinaryBitmap<B>,
    hints: &DecodingHintDictionary,
) -> Result<Vec<String>, DecodeError> {
    let mut reader = QRCodeMultiReader::new();
    match reader.decode_multiple_with_hints(&mut bitmap, hints) {
        Ok(results) => Ok(results.iter().map(|r| r.getText().to_string()).collect()),
        Err(e) => {
            rxing_outcome(e)?;
            Ok(Vec::new())
        }
    }
}

/// Тексты rqrr, затем новые тексты rxing
fn merge_texts(mut found: Vec<String>, extra: Vec<String>) -> Vec<String> {
    for text in extra {
        if !found.contains(&text) {
            found.push(text);
        }
    }
    found
}

/// Symbol-level misses are "nothing found"; anything about the input is an error.
fn rxing_outcome(err: Exceptions) -> Result<(), DecodeError> {
    match err {
        Exceptions::IllegalArgumentException(_) => Err(DecodeError::InvalidImage(err.to_string())),
        Exceptions::IndexOutOfBoundsException(_) => Err(DecodeError::DecodeFailed(err.to_string())),
        other => {
            log::debug!("RXING: Not found: {}", other);
            Ok(())
        }
    }
}

impl Decoder for QRDecoder {
    fn detect_and_decode_multi(&self, frame: &Frame) -> Result<Vec<String>, DecodeError> {
        self.decode_gray(&frame.to_luma())
    }
}
