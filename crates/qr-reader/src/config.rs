//! Конфигурация сканера
//!
//! Загружается из TOML-файла или JSON-строки; отсутствующие ключи берутся
//! из значений по умолчанию.
//!
//! ```toml
//! text_encoding = "utf8"
//! verbose = false
//!
//! [processing]
//! rotation_angles = [0.0, 45.0, -45.0, 90.0, -90.0]
//! upscale_factor = 2.0
//!
//! [live]
//! scan_interval_ms = 100
//! confirmation_threshold = 3
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::live::LiveScanConfig;
use crate::preprocessing::ProcessingConfig;
use crate::{ReadError, TextEncoding};

/// Общая конфигурация
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Кодировка текста payload'ов
    pub text_encoding: TextEncoding,
    /// Писать ошибки отдельных попыток в warn
    pub verbose: bool,
    pub processing: ProcessingConfig,
    pub live: LiveScanConfig,
}

impl ReaderConfig {
    /// Загрузка из TOML-файла
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ReadError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ReadError> {
        toml::from_str(content).map_err(|e| ReadError::Config(format!("Invalid TOML config: {}", e)))
    }

    pub fn from_json_str(content: &str) -> Result<Self, ReadError> {
        serde_json::from_str(content).map_err(|e| ReadError::Config(format!("Invalid JSON config: {}", e)))
    }

    /// Сохранение в TOML-файл
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ReadError> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(self).map_err(|e| ReadError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content).map_err(|e| ReadError::Config(format!("Failed to write {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ReaderConfig::from_toml_str(
            r#"
            verbose = true

            [live]
            confirmation_threshold = 5
            "#,
        )
        .unwrap();

        assert!(config.verbose);
        assert_eq!(config.live.confirmation_threshold, 5);
        assert_eq!(config.live.scan_interval(), Duration::from_millis(100));
        assert_eq!(config.processing.rotation_angles.len(), 5);
        assert_eq!(config.text_encoding, TextEncoding::Utf8);
    }

    #[test]
    fn test_json_config() {
        let config = ReaderConfig::from_json_str(r#"{"text_encoding": "latin1", "processing": {"upscale_factor": 1.5}}"#)
            .unwrap();
        assert_eq!(config.text_encoding, TextEncoding::Latin1);
        assert_eq!(config.processing.upscale_factor, 1.5);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            ReaderConfig::from_toml_str("live = 3"),
            Err(ReadError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reader.toml");

        let mut config = ReaderConfig::default();
        config.live.scan_interval_ms = 250;
        config.save(&path).unwrap();

        let loaded = ReaderConfig::load(&path).unwrap();
        assert_eq!(loaded.live.scan_interval_ms, 250);
    }
}
