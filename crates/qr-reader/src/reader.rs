//! Чтение QR-кодов из файлов и байтовых буферов

use std::io::ErrorKind;
use std::path::Path;

use image::{ImageError, ImageResult};

use crate::config::ReaderConfig;
use crate::decoding::{Decoder, QRDecoder};
use crate::frame::Frame;
use crate::pipeline::ScanPipeline;
use crate::{first_text, DecodedPayload, ReadError};

/// Кодек изображений: файл или буфер → кадр
pub trait ImageCodec {
    fn decode_file(&self, path: &Path) -> ImageResult<Frame>;
    fn decode_buffer(&self, bytes: &[u8]) -> ImageResult<Frame>;
}

/// Кодек на основе крейта `image` (PNG, JPEG)
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateCodec;

impl ImageCodec for ImageCrateCodec {
    fn decode_file(&self, path: &Path) -> ImageResult<Frame> {
        image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map(Frame::from)
    }

    fn decode_buffer(&self, bytes: &[u8]) -> ImageResult<Frame> {
        image::load_from_memory(bytes).map(Frame::from)
    }
}

/// Главный сканер QR-кодов для одиночных изображений
pub struct QRReader<C = ImageCrateCodec, D = QRDecoder> {
    codec: C,
    pipeline: ScanPipeline<D>,
}

impl Default for QRReader {
    fn default() -> Self {
        Self::new()
    }
}

impl QRReader {
    /// Создание сканера с настройками по умолчанию
    pub fn new() -> Self {
        Self::with_config(&ReaderConfig::default())
    }

    /// Создание сканера с пользовательскими настройками
    pub fn with_config(config: &ReaderConfig) -> Self {
        let pipeline = ScanPipeline::new(config.processing.clone(), QRDecoder::new())
            .with_encoding(config.text_encoding)
            .with_verbose(config.verbose);
        Self::with_parts(ImageCrateCodec, pipeline)
    }
}

impl<C: ImageCodec, D: Decoder> QRReader<C, D> {
    pub fn with_parts(codec: C, pipeline: ScanPipeline<D>) -> Self {
        Self { codec, pipeline }
    }

    pub fn pipeline(&self) -> &ScanPipeline<D> {
        &self.pipeline
    }

    /// Чтение всех QR-кодов из файла
    pub fn read_from_file(&self, path: impl AsRef<Path>) -> Result<Vec<DecodedPayload>, ReadError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ReadError::NotFound(path.to_path_buf()));
        }

        let frame = self.codec.decode_file(path).map_err(|e| match e {
            ImageError::IoError(io) if io.kind() == ErrorKind::NotFound => ReadError::NotFound(path.to_path_buf()),
            other => ReadError::DecodeImage(format!("{}: {}", path.display(), other)),
        })?;

        log::info!("Loaded {} ({}x{})", path.display(), frame.width(), frame.height());
        self.pipeline.scan(&frame)
    }

    /// Чтение всех QR-кодов из байтов изображения (PNG, JPEG)
    pub fn scan_bytes(&self, bytes: &[u8]) -> Result<Vec<DecodedPayload>, ReadError> {
        if bytes.is_empty() {
            return Err(ReadError::EmptyInput);
        }

        let frame = self
            .codec
            .decode_buffer(bytes)
            .map_err(|e| ReadError::DecodeImage(e.to_string()))?;

        self.pipeline.scan(&frame)
    }

    /// Асинхронная форма [`scan_bytes`](Self::scan_bytes).
    ///
    /// Работа выполняется в текущей задаче, без собственных потоков.
    pub async fn read_from_bytes(&self, bytes: &[u8]) -> Result<Vec<DecodedPayload>, ReadError> {
        self.scan_bytes(bytes)
    }

    /// Первый текст из файла (остальные коды отбрасываются)
    pub fn read_text_from_file(&self, path: impl AsRef<Path>) -> Result<Option<String>, ReadError> {
        self.read_from_file(path).map(|payloads| first_text(&payloads))
    }

    /// Первый текст из байтов изображения
    pub async fn read_text_from_bytes(&self, bytes: &[u8]) -> Result<Option<String>, ReadError> {
        self.read_from_bytes(bytes).await.map(|payloads| first_text(&payloads))
    }

    /// Сканирование уже декодированного кадра
    pub fn scan_frame(&self, frame: &Frame) -> Result<Vec<DecodedPayload>, ReadError> {
        self.pipeline.scan(frame)
    }
}
