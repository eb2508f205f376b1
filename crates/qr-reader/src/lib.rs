//! QR Reader - чтение QR-кодов с повторными попытками
//!
//! Библиотека для чтения QR-кодов из файлов, байтовых буферов и видеопотока:
//! - Последовательность вариантов предобработки (повороты, CLAHE, Оцу, увеличение)
//! - Ранний выход на первом успешном варианте
//! - Live-сканирование с областью интереса и подтверждением по нескольким кадрам
//! - Декодирование через rqrr с fallback на rxing

pub mod config;
pub mod decoding;
pub mod frame;
pub mod live;
pub mod overlay;
pub mod pipeline;
pub mod preprocessing;
pub mod reader;

#[cfg(feature = "camera")]
pub mod camera;

pub use config::ReaderConfig;
pub use decoding::{decode_once, DecodeError, Decoder, QRDecoder};
pub use frame::{Frame, Rect};
pub use live::{
    Clock, Display, HeadlessDisplay, Key, LiveScanConfig, LiveScanController, LiveScanOutcome, LiveScanState,
    StreamError, SystemClock, VideoSource,
};
pub use overlay::ScanStatus;
pub use pipeline::{ScanPipeline, ScanReport, VariantOutcome};
pub use preprocessing::{Enhancement, ImageProcessor, ProcessingConfig, TransformVariant};
pub use reader::{ImageCodec, ImageCrateCodec, QRReader};

#[cfg(feature = "camera")]
pub use camera::CameraSource;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Основные ошибки модуля
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Image not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to decode image: {0}")]
    DecodeImage(String),

    #[error("Empty input buffer")]
    EmptyInput,

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Результат одной попытки: payload'ы в порядке, выданном декодером
pub type ScanResult = Vec<DecodedPayload>;

/// Кодировка для текстового представления payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Latin1,
    Ascii,
}

impl TextEncoding {
    /// Декодирование байтов; `None`, если байты не являются текстом в этой кодировке
    pub fn decode(self, data: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(data).ok().map(str::to_owned),
            TextEncoding::Latin1 => Some(data.iter().map(|&b| b as char).collect()),
            TextEncoding::Ascii => data.is_ascii().then(|| data.iter().map(|&b| b as char).collect()),
        }
    }
}

/// Декодированный QR-код
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedPayload {
    /// Сырые байты содержимого
    data: Vec<u8>,
    /// Кодировка для `text()`
    encoding: TextEncoding,
}

impl DecodedPayload {
    /// Payload из непустой декодированной строки; пустая строка даёт `None`
    pub fn from_text(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        Some(Self {
            data: text.as_bytes().to_vec(),
            encoding: TextEncoding::Utf8,
        })
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Текст в настроенной кодировке
    pub fn text(&self) -> Option<String> {
        self.encoding.decode(&self.data)
    }

    /// Текст в указанной кодировке
    pub fn text_as(&self, encoding: TextEncoding) -> Option<String> {
        encoding.decode(&self.data)
    }
}

/// Первый текст из результата, остальные отбрасываются
pub fn first_text(payloads: &[DecodedPayload]) -> Option<String> {
    payloads.iter().find_map(DecodedPayload::text)
}
