//! Live-сканирование видеопотока
//!
//! Цикл по кадрам с прореживанием (не чаще интервала и через кадр), поиском
//! сначала в области интереса и подтверждением: результат принимается только
//! после нескольких одинаковых чтений подряд.
//!
//! Состояния: RUNNING → CONFIRMED | CANCELLED | STREAM_ERROR.

use std::time::{Duration, Instant};

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ReaderConfig;
use crate::decoding::{Decoder, QRDecoder};
use crate::frame::Frame;
use crate::overlay::{self, ScanStatus};
use crate::pipeline::ScanPipeline;
use crate::{first_text, ProcessingConfig};

/// Ошибки видеопотока
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Failed to open video source: {0}")]
    Open(String),

    #[error("Failed to read frame: {0}")]
    Read(String),

    #[error("Video stream ended")]
    Ended,
}

/// Источник кадров
pub trait VideoSource {
    /// Следующий кадр; `Ok(None)` - конец потока. Блокирует до появления кадра.
    fn read(&mut self) -> Result<Option<Frame>, StreamError>;

    /// Освобождение устройства; вызывается на любом пути выхода
    fn release(&mut self);
}

/// Нажатая клавиша
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
}

/// Вывод кадров пользователю; может быть пустым в headless-режиме
pub trait Display {
    /// Кадр с рамкой от [`overlay::render`] и статус; строку статуса
    /// ([`ScanStatus::message`]) выводит сама реализация.
    fn show(&mut self, frame: &RgbImage, status: &ScanStatus);

    fn poll_key(&mut self) -> Option<Key>;

    /// Удержать последний кадр на экране
    fn hold(&mut self, _duration: Duration) {}

    fn teardown(&mut self);
}

/// Display без вывода
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessDisplay;

impl Display for HeadlessDisplay {
    fn show(&mut self, _frame: &RgbImage, status: &ScanStatus) {
        log::trace!("{}", status.message());
    }

    fn poll_key(&mut self) -> Option<Key> {
        None
    }

    fn teardown(&mut self) {}
}

/// Источник времени для прореживания
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Конфигурация live-сканирования
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveScanConfig {
    /// Минимальный интервал между попытками декодирования
    pub scan_interval_ms: u64,
    /// Сколько одинаковых чтений подряд нужно для подтверждения
    pub confirmation_threshold: u32,
    /// Декодировать не чаще, чем через кадр
    pub alternate_frames: bool,
    /// Сколько держать итоговый кадр на экране
    pub confirmation_hold_ms: u64,
    /// Клавиша отмены (Escape работает всегда)
    pub cancel_key: char,
    /// Индекс камеры
    pub device_index: u32,
}

impl Default for LiveScanConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 100,
            confirmation_threshold: 3,
            alternate_frames: true,
            confirmation_hold_ms: 1500,
            cancel_key: 'q',
            device_index: 0,
        }
    }
}

impl LiveScanConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn confirmation_hold(&self) -> Duration {
        Duration::from_millis(self.confirmation_hold_ms)
    }

    fn is_cancel(&self, key: Key) -> bool {
        match key {
            Key::Escape => true,
            Key::Char(c) => c.eq_ignore_ascii_case(&self.cancel_key),
        }
    }
}

/// Состояние цикла, живёт от старта до выхода из `run`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveScanState {
    candidate: Option<String>,
    matches: u32,
    last_scan: Option<Instant>,
    scan_this_frame: bool,
}

impl Default for LiveScanState {
    fn default() -> Self {
        Self {
            candidate: None,
            matches: 0,
            last_scan: None,
            scan_this_frame: true,
        }
    }
}

impl LiveScanState {
    /// Текущий кандидат
    pub fn candidate(&self) -> Option<&str> {
        self.candidate.as_deref()
    }

    /// Число одинаковых чтений подряд
    pub fn matches(&self) -> u32 {
        self.matches
    }

    pub fn last_scan(&self) -> Option<Instant> {
        self.last_scan
    }

    fn record(&mut self, text: String) -> u32 {
        if self.candidate.as_deref() == Some(text.as_str()) {
            self.matches += 1;
        } else {
            self.candidate = Some(text);
            self.matches = 1;
        }
        self.matches
    }
}

/// Итог live-сканирования
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveScanOutcome {
    Confirmed(String),
    Cancelled,
    StreamError(StreamError),
}

/// Releases the source and tears down the display when dropped.
struct Session<'a, S: VideoSource, W: Display> {
    source: &'a mut S,
    display: &'a mut W,
}

impl<S: VideoSource, W: Display> Drop for Session<'_, S, W> {
    fn drop(&mut self) {
        self.source.release();
        self.display.teardown();
    }
}

/// Контроллер live-сканирования
pub struct LiveScanController<D = QRDecoder, K = SystemClock> {
    pipeline: ScanPipeline<D>,
    config: LiveScanConfig,
    clock: K,
    state: LiveScanState,
}

impl LiveScanController {
    pub fn with_config(config: &ReaderConfig) -> Self {
        let pipeline = ScanPipeline::new(config.processing.clone(), QRDecoder::new())
            .with_encoding(config.text_encoding)
            .with_verbose(config.verbose);
        Self::new(pipeline, config.live.clone(), SystemClock)
    }
}

impl Default for LiveScanController {
    fn default() -> Self {
        Self::with_config(&ReaderConfig::default())
    }
}

impl<D: Decoder, K: Clock> LiveScanController<D, K> {
    pub fn new(pipeline: ScanPipeline<D>, config: LiveScanConfig, clock: K) -> Self {
        Self {
            pipeline,
            config,
            clock,
            state: LiveScanState::default(),
        }
    }

    pub fn state(&self) -> &LiveScanState {
        &self.state
    }

    pub fn config(&self) -> &LiveScanConfig {
        &self.config
    }

    fn threshold(&self) -> u32 {
        self.config.confirmation_threshold.max(1)
    }

    fn processing(&self) -> &ProcessingConfig {
        self.pipeline.processor().config()
    }

    /// Цикл до подтверждения, отмены или ошибки потока.
    ///
    /// Источник и дисплей освобождаются на любом пути выхода.
    pub fn run<S: VideoSource, W: Display>(&mut self, source: &mut S, display: &mut W) -> LiveScanOutcome {
        self.state = LiveScanState::default();
        let session = Session { source, display };
        log::info!("Live scan started");

        loop {
            let frame = match session.source.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::warn!("Live scan stopped: stream ended");
                    return LiveScanOutcome::StreamError(StreamError::Ended);
                }
                Err(e) => {
                    log::error!("Live scan stopped: {}", e);
                    return LiveScanOutcome::StreamError(e);
                }
            };

            let status = self.step(&frame);
            let canvas = overlay::render(&frame, &status, self.processing().roi_fraction);
            session.display.show(&canvas, &status);

            if let ScanStatus::Confirmed(text) = status {
                log::info!("Live scan confirmed: {}", text);
                session.display.hold(self.config.confirmation_hold());
                return LiveScanOutcome::Confirmed(text);
            }

            if let Some(key) = session.display.poll_key() {
                if self.config.is_cancel(key) {
                    log::info!("Live scan cancelled");
                    return LiveScanOutcome::Cancelled;
                }
            }
        }
    }

    /// Одна итерация без ввода-вывода: прореживание, слои, подтверждение
    pub fn step(&mut self, frame: &Frame) -> ScanStatus {
        if self.scan_due() && !frame.is_empty() {
            let (payloads, report) = self.pipeline.scan_variants(self.pipeline.processor().live_variants(frame));

            if let Some(text) = first_text(&payloads) {
                let count = self.state.record(text);
                log::debug!(
                    "Live read {:?} ({}/{}) via {:?}",
                    self.state.candidate,
                    count,
                    self.threshold(),
                    report.matched
                );

                if count >= self.threshold() {
                    return ScanStatus::Confirmed(self.state.candidate.clone().unwrap_or_default());
                }
            }
        }
        self.status()
    }

    /// Статус по текущему состоянию
    pub fn status(&self) -> ScanStatus {
        match &self.state.candidate {
            Some(text) if self.state.matches > 0 => ScanStatus::Progress {
                text: text.clone(),
                count: self.state.matches,
                threshold: self.threshold(),
            },
            _ => ScanStatus::Searching,
        }
    }

    /// Toggles the alternation flag and stamps the attempt time when a scan is due.
    fn scan_due(&mut self) -> bool {
        let now = self.clock.now();
        let allowed = !self.config.alternate_frames || self.state.scan_this_frame;
        self.state.scan_this_frame = !self.state.scan_this_frame;

        let elapsed = self
            .state
            .last_scan
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.scan_interval());

        if allowed && elapsed {
            self.state.last_scan = Some(now);
            true
        } else {
            false
        }
    }
}
