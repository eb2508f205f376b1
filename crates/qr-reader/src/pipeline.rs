//! Конвейер сканирования
//!
//! Перебирает варианты предобработки по приоритету и останавливается на первом,
//! который дал хотя бы один payload. Ошибка на отдельном варианте не прерывает
//! перебор: вариант считается пустым.

use crate::decoding::{decode_once, DecodeError, Decoder, QRDecoder};
use crate::frame::Frame;
use crate::preprocessing::{ImageProcessor, ProcessingConfig, TransformVariant};
use crate::{DecodedPayload, ReadError, TextEncoding};

/// Итог одной попытки на одном варианте
#[derive(Debug, Clone, PartialEq)]
pub enum VariantOutcome {
    Found(Vec<DecodedPayload>),
    Empty,
    Failed(DecodeError),
}

impl VariantOutcome {
    fn from_attempt(result: Result<Vec<DecodedPayload>, DecodeError>) -> Self {
        match result {
            Ok(payloads) if payloads.is_empty() => VariantOutcome::Empty,
            Ok(payloads) => VariantOutcome::Found(payloads),
            Err(e) => VariantOutcome::Failed(e),
        }
    }
}

/// Сводка сканирования
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    /// Сколько вариантов передано декодеру
    pub attempts: usize,
    /// Вариант, давший результат
    pub matched: Option<TransformVariant>,
    /// Сколько вариантов завершились ошибкой декодера
    pub failures: usize,
}

/// Конвейер: процессор вариантов + декодер
pub struct ScanPipeline<D = QRDecoder> {
    processor: ImageProcessor,
    decoder: D,
    encoding: TextEncoding,
    verbose: bool,
}

impl Default for ScanPipeline<QRDecoder> {
    fn default() -> Self {
        Self::new(ProcessingConfig::default(), QRDecoder::new())
    }
}

impl<D: Decoder> ScanPipeline<D> {
    pub fn new(config: ProcessingConfig, decoder: D) -> Self {
        Self {
            processor: ImageProcessor::new(config),
            decoder,
            encoding: TextEncoding::default(),
            verbose: false,
        }
    }

    /// Кодировка для текстов payload'ов
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Ошибки вариантов пишутся в warn вместо debug
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Уровень логирования для ошибок отдельных вариантов и кадров
    pub fn failure_level(&self) -> log::Level {
        if self.verbose {
            log::Level::Warn
        } else {
            log::Level::Debug
        }
    }

    pub fn processor(&self) -> &ImageProcessor {
        &self.processor
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Сканирование одиночного изображения с перебором поворотов
    pub fn scan(&self, frame: &Frame) -> Result<Vec<DecodedPayload>, ReadError> {
        self.scan_with_report(frame).map(|(payloads, _)| payloads)
    }

    /// То же, что [`scan`](Self::scan), плюс сводка попыток
    pub fn scan_with_report(&self, frame: &Frame) -> Result<(Vec<DecodedPayload>, ScanReport), ReadError> {
        if frame.is_empty() {
            return Err(ReadError::InvalidImage(format!(
                "zero-area frame {}x{}",
                frame.width(),
                frame.height()
            )));
        }

        log::debug!("Starting scan, size: {:?}", frame.dimensions());
        let (payloads, report) = self.scan_variants(self.processor.single_shot_variants(frame));

        match &report.matched {
            Some(variant) => log::info!("Scan complete: {} code(s) via {}", payloads.len(), variant),
            None => log::info!("Scan complete: nothing found after {} variants", report.attempts),
        }
        Ok((payloads, report))
    }

    /// Общий цикл раннего выхода для любой последовательности вариантов
    pub fn scan_variants<I>(&self, variants: I) -> (Vec<DecodedPayload>, ScanReport)
    where
        I: IntoIterator<Item = (TransformVariant, Frame)>,
    {
        let mut report = ScanReport::default();

        for (variant, image) in variants {
            report.attempts += 1;

            match self.attempt(&image) {
                VariantOutcome::Found(payloads) => {
                    report.matched = Some(variant);
                    return (payloads, report);
                }
                VariantOutcome::Empty => log::debug!("Variant {}: nothing found", variant),
                VariantOutcome::Failed(e) => {
                    report.failures += 1;
                    log::log!(self.failure_level(), "Variant {} failed: {}", variant, e);
                }
            }
        }

        (Vec::new(), report)
    }

    /// Одна попытка декодирования
    pub fn attempt(&self, image: &Frame) -> VariantOutcome {
        VariantOutcome::from_attempt(decode_once(&self.decoder, image, self.encoding))
    }
}
