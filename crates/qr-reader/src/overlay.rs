//! Отрисовка подсказок поверх кадра live-сканирования
//!
//! Рамка области интереса и перекрестие в центре, цвет которых передаёт
//! состояние. Текст статуса ([`ScanStatus::message`]) выводит реализация
//! [`Display`](crate::Display): шрифтов здесь нет. На декодирование не влияет.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use serde::{Deserialize, Serialize};

use crate::frame::{Frame, Rect};

const SEARCHING_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const PROGRESS_COLOR: Rgb<u8> = Rgb([255, 200, 0]);
const CONFIRMED_COLOR: Rgb<u8> = Rgb([0, 160, 255]);

/// Состояние сканирования для отображения
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    Searching,
    Progress { text: String, count: u32, threshold: u32 },
    Confirmed(String),
}

impl ScanStatus {
    /// Строка статуса для вывода пользователю
    pub fn message(&self) -> String {
        match self {
            ScanStatus::Searching => "Place the QR code inside the frame".to_string(),
            ScanStatus::Progress { text, count, threshold } => format!("Reading: {} ({}/{})", text, count, threshold),
            ScanStatus::Confirmed(text) => format!("Confirmed: {}", text),
        }
    }

    fn color(&self) -> Rgb<u8> {
        match self {
            ScanStatus::Searching => SEARCHING_COLOR,
            ScanStatus::Progress { .. } => PROGRESS_COLOR,
            ScanStatus::Confirmed(_) => CONFIRMED_COLOR,
        }
    }
}

/// Копия кадра с рамкой и перекрестием.
///
/// От статуса зависит только цвет; текст в кадр не рисуется.
pub fn render(frame: &Frame, status: &ScanStatus, roi_fraction: f32) -> RgbImage {
    let mut canvas = frame.to_rgb();
    let guide = Rect::centered_square(canvas.width(), canvas.height(), roi_fraction);
    if guide.is_empty() {
        return canvas;
    }

    let color = status.color();
    // 3px border, drawn inward
    for inset in 0..3u32 {
        if guide.width <= inset * 2 || guide.height <= inset * 2 {
            break;
        }
        let rect = imageproc::rect::Rect::at((guide.x + inset) as i32, (guide.y + inset) as i32)
            .of_size(guide.width - inset * 2, guide.height - inset * 2);
        draw_hollow_rect_mut(&mut canvas, rect, color);
    }

    let (cx, cy) = guide.center();
    let arm = (guide.width / 10).max(2) as f32;
    let (cx, cy) = (cx as f32, cy as f32);
    draw_line_segment_mut(&mut canvas, (cx - arm, cy), (cx + arm, cy), color);
    draw_line_segment_mut(&mut canvas, (cx, cy - arm), (cx, cy + arm), color);

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn test_render_draws_guide_and_crosshair() {
        let frame = Frame::Luma(GrayImage::new(100, 60));
        let canvas = render(&frame, &ScanStatus::Searching, 0.7);

        assert_eq!(canvas.dimensions(), (100, 60));
        let guide = Rect::centered_square(100, 60, 0.7);
        assert_eq!(canvas.get_pixel(guide.x, guide.y), &SEARCHING_COLOR);
        let (cx, cy) = guide.center();
        assert_eq!(canvas.get_pixel(cx, cy), &SEARCHING_COLOR);
        // Outside the guide stays untouched
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_render_does_not_touch_source() {
        let frame = Frame::Luma(GrayImage::new(50, 50));
        let _ = render(&frame, &ScanStatus::Confirmed("x".into()), 0.7);
        assert!(frame.to_luma().pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_status_text_is_not_drawn() {
        let frame = Frame::Luma(GrayImage::new(80, 80));
        let progress = |text: &str| ScanStatus::Progress {
            text: text.into(),
            count: 1,
            threshold: 3,
        };

        let first = render(&frame, &progress("FIRST"), 0.7);
        let second = render(&frame, &progress("A much longer payload"), 0.7);
        assert_eq!(first, second);

        let guide = Rect::centered_square(80, 80, 0.7);
        assert_eq!(first.get_pixel(guide.x, guide.y), &PROGRESS_COLOR);
        assert_ne!(first, render(&frame, &ScanStatus::Searching, 0.7));
    }

    #[test]
    fn test_progress_message() {
        let status = ScanStatus::Progress {
            text: "HELLO-123".into(),
            count: 2,
            threshold: 3,
        };
        assert_eq!(status.message(), "Reading: HELLO-123 (2/3)");
    }
}
