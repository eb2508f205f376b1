//! WASM bindings для QR-ридера
//!
//! Предоставляет JavaScript API для чтения QR-кодов из байтов изображения
//! и из ImageData canvas.

use qr_reader::{first_text, DecodedPayload, Frame, QRReader, ReaderConfig};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Инициализация panic hook и логирования
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("QR reader WASM module initialized");
}

/// Payload в виде, удобном для JS
#[derive(Serialize)]
struct JsPayload {
    text: Option<String>,
    data: Vec<u8>,
}

impl From<&DecodedPayload> for JsPayload {
    fn from(payload: &DecodedPayload) -> Self {
        Self {
            text: payload.text(),
            data: payload.data().to_vec(),
        }
    }
}

fn to_js(payloads: &[DecodedPayload]) -> Result<JsValue, JsError> {
    let js: Vec<JsPayload> = payloads.iter().map(JsPayload::from).collect();
    serde_wasm_bindgen::to_value(&js).map_err(|e| JsError::new(&e.to_string()))
}

/// JavaScript-доступный ридер QR-кодов
#[wasm_bindgen]
pub struct WasmQRReader {
    reader: QRReader,
}

#[wasm_bindgen]
impl WasmQRReader {
    /// Создание ридера с настройками по умолчанию
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self { reader: QRReader::new() }
    }

    /// Создание ридера из JSON-конфигурации
    ///
    /// @param config_json - например `{"processing": {"upscale_factor": 1.5}}`
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(config_json: &str) -> Result<WasmQRReader, JsError> {
        let config = ReaderConfig::from_json_str(config_json).map_err(|e| JsError::new(&e.to_string()))?;
        Ok(Self {
            reader: QRReader::with_config(&config),
        })
    }

    /// Чтение всех QR-кодов из байтов изображения (PNG, JPEG)
    ///
    /// @param image_data - Uint8Array с данными изображения
    /// @returns Array<{text, data}>
    #[wasm_bindgen(js_name = readBytes)]
    pub fn read_bytes(&self, image_data: &[u8]) -> Result<JsValue, JsError> {
        let payloads = self
            .reader
            .scan_bytes(image_data)
            .map_err(|e| JsError::new(&e.to_string()))?;
        to_js(&payloads)
    }

    /// Первый текст из изображения или null
    #[wasm_bindgen(js_name = readText)]
    pub fn read_text(&self, image_data: &[u8]) -> Result<Option<String>, JsError> {
        self.reader
            .scan_bytes(image_data)
            .map(|payloads| first_text(&payloads))
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Чтение ImageData из Canvas
    ///
    /// @param data - Uint8ClampedArray из canvas.getImageData()
    /// @param width - Ширина изображения
    /// @param height - Высота изображения
    #[wasm_bindgen(js_name = readImageData)]
    pub fn read_image_data(&self, data: &[u8], width: u32, height: u32) -> Result<JsValue, JsError> {
        let rgba = image::RgbaImage::from_raw(width, height, data.to_vec())
            .ok_or_else(|| JsError::new("ImageData size does not match width x height"))?;
        let frame = Frame::from(image::DynamicImage::ImageRgba8(rgba));

        let payloads = self
            .reader
            .scan_frame(&frame)
            .map_err(|e| JsError::new(&e.to_string()))?;
        to_js(&payloads)
    }
}

impl Default for WasmQRReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Удобная функция для быстрого чтения первого текста
#[wasm_bindgen(js_name = quickRead)]
pub fn quick_read(image_data: &[u8]) -> Result<Option<String>, JsError> {
    WasmQRReader::new().read_text(image_data)
}

/// Информация о версии
#[wasm_bindgen(js_name = version)]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_reader_creation() {
        let _reader = WasmQRReader::new();
    }

    #[wasm_bindgen_test]
    fn test_version() {
        let v = version();
        assert!(!v.is_empty());
    }

    #[wasm_bindgen_test]
    fn test_bad_config_is_error() {
        assert!(WasmQRReader::with_config("not json").is_err());
    }
}
