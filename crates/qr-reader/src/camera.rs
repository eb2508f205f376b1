//! Источник кадров с камеры через nokhwa

use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use crate::frame::Frame;
use crate::live::{StreamError, VideoSource};

/// Камера как [`VideoSource`]
pub struct CameraSource {
    camera: Camera,
    device_index: u32,
    streaming: bool,
}

impl CameraSource {
    /// Открытие камеры по индексу и запуск потока
    pub fn open(device_index: u32) -> Result<Self, StreamError> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

        let mut camera = Camera::new(CameraIndex::Index(device_index), requested)
            .map_err(|e| StreamError::Open(format!("camera {}: {}", device_index, e)))?;
        camera
            .open_stream()
            .map_err(|e| StreamError::Open(format!("camera {}: {}", device_index, e)))?;

        log::info!(
            "Camera {} opened: {}x{}",
            device_index,
            camera.resolution().width_x,
            camera.resolution().height_y
        );

        Ok(Self {
            camera,
            device_index,
            streaming: true,
        })
    }

    pub fn device_index(&self) -> u32 {
        self.device_index
    }
}

impl VideoSource for CameraSource {
    fn read(&mut self) -> Result<Option<Frame>, StreamError> {
        if !self.streaming {
            return Ok(None);
        }

        let buffer = self
            .camera
            .frame()
            .map_err(|e| StreamError::Read(format!("Failed to capture frame: {}", e)))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| StreamError::Read(format!("Failed to decode frame: {}", e)))?;

        // Rebuild through raw bytes so nokhwa's `image` version does not leak out
        let (width, height) = decoded.dimensions();
        let rgb = RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| StreamError::Read(format!("Frame buffer does not match {}x{}", width, height)))?;

        Ok(Some(Frame::Rgb(rgb)))
    }

    fn release(&mut self) {
        if self.streaming {
            if let Err(e) = self.camera.stop_stream() {
                log::warn!("Failed to stop camera {}: {}", self.device_index, e);
            }
            self.streaming = false;
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}
