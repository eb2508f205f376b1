//! Integration tests for QR reading

use std::cell::Cell;
use std::collections::HashSet;
use std::io::Cursor;
use std::rc::Rc;
use std::time::{Duration, Instant};

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use qr_reader::{
    Clock, Decoder, Enhancement, Frame, HeadlessDisplay, ImageProcessor, LiveScanConfig, LiveScanController,
    LiveScanOutcome, ProcessingConfig, QRDecoder, QRReader, ReadError, ScanPipeline, StreamError, VideoSource,
};
use qrcode::QrCode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// Render a QR symbol with `quiet_zone` white modules around it
fn render_qr(content: &str, module_size: u32, quiet_zone: u32) -> GrayImage {
    let qr = QrCode::new(content).unwrap();
    let width = qr.width() as u32;
    let doc_width = (width + quiet_zone * 2) * module_size;
    let mut img = GrayImage::from_pixel(doc_width, doc_width, Luma([255]));

    for y in 0..width {
        for x in 0..width {
            if qr[(x as usize, y as usize)] == qrcode::Color::Dark {
                let px = (quiet_zone + x) * module_size;
                let py = (quiet_zone + y) * module_size;
                for dy in 0..module_size {
                    for dx in 0..module_size {
                        img.put_pixel(px + dx, py + dy, Luma([0]));
                    }
                }
            }
        }
    }
    img
}

fn png_bytes(img: &GrayImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

fn texts(payloads: &[qr_reader::DecodedPayload]) -> Vec<String> {
    payloads.iter().filter_map(|p| p.text()).collect()
}

#[test]
fn test_read_from_file() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.png");
    render_qr("HELLO-123", 6, 4).save(&path).unwrap();

    let reader = QRReader::new();
    let payloads = reader.read_from_file(&path).unwrap();

    assert_eq!(texts(&payloads), vec!["HELLO-123"]);
    assert_eq!(reader.read_text_from_file(&path).unwrap().as_deref(), Some("HELLO-123"));
}

#[test]
fn test_missing_file_is_not_found() {
    let reader = QRReader::new();
    let dir = tempfile::tempdir().unwrap();

    let result = reader.read_from_file(dir.path().join("missing.png"));
    assert!(matches!(result, Err(ReadError::NotFound(_))));
}

#[test]
fn test_corrupt_file_is_decode_image_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"\x89PNG\r\n\x1a\nnot really").unwrap();

    let result = QRReader::new().read_from_file(&path);
    assert!(matches!(result, Err(ReadError::DecodeImage(_))));
}

#[tokio::test]
async fn test_read_from_bytes() {
    let bytes = png_bytes(&render_qr("HELLO-123", 6, 4));
    let reader = QRReader::new();

    let payloads = reader.read_from_bytes(&bytes).await.unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].data(), b"HELLO-123");

    let first = reader.read_text_from_bytes(&bytes).await.unwrap();
    assert_eq!(first.as_deref(), Some("HELLO-123"));
}

#[tokio::test]
async fn test_empty_bytes() {
    let result = QRReader::new().read_from_bytes(&[]).await;
    assert!(matches!(result, Err(ReadError::EmptyInput)));
}

#[test]
fn test_no_qr_tries_every_rotation() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(7);
    let noise = GrayImage::from_fn(160, 160, |_, _| Luma([rng.gen_range(90..170)]));

    let pipeline: ScanPipeline = ScanPipeline::default();
    let (payloads, report) = pipeline.scan_with_report(&Frame::Luma(noise)).unwrap();

    assert!(payloads.is_empty());
    assert_eq!(report.attempts, 5);
    assert_eq!(report.matched, None);
}

#[test]
fn test_right_angle_rotations_round_trip() {
    let upright = render_qr("HELLO-123", 5, 4);
    let reader = QRReader::new();

    for img in [
        upright.clone(),
        image::imageops::rotate90(&upright),
        image::imageops::rotate180(&upright),
    ] {
        let payloads = reader.scan_frame(&Frame::Luma(img)).unwrap();
        assert_eq!(texts(&payloads), vec!["HELLO-123"]);
    }
}

#[test]
fn test_skewed_code() {
    // Wide quiet zone so the rotated symbol stays on the canvas
    let upright = render_qr("SKEWED", 5, 10);
    let skewed = rotate_about_center(&upright, 30f32.to_radians(), Interpolation::Bilinear, Luma([255]));

    let payloads = QRReader::new().scan_frame(&Frame::Luma(skewed)).unwrap();
    assert_eq!(texts(&payloads), vec!["SKEWED"]);
}

#[test]
fn test_low_contrast_code() {
    let mut img = render_qr("LOW-CONTRAST", 5, 4);
    for p in img.pixels_mut() {
        // Map 0..255 to 100..150
        p.0[0] = (100.0 + (p.0[0] as f32 / 255.0) * 50.0) as u8;
    }

    let payloads = QRReader::new().scan_frame(&Frame::Luma(img)).unwrap();
    assert_eq!(texts(&payloads), vec!["LOW-CONTRAST"]);
}

#[test]
fn test_two_codes_in_one_image() {
    let left = render_qr("LEFT", 5, 4);
    let right = render_qr("RIGHT", 5, 4);
    let mut img = GrayImage::from_pixel(left.width() + right.width(), left.height().max(right.height()), Luma([255]));
    image::imageops::replace(&mut img, &left, 0, 0);
    image::imageops::replace(&mut img, &right, left.width() as i64, 0);

    let payloads = QRReader::new().scan_frame(&Frame::Luma(img)).unwrap();
    let found: HashSet<String> = texts(&payloads).into_iter().collect();
    assert_eq!(found, HashSet::from(["LEFT".to_string(), "RIGHT".to_string()]));
}

#[test]
fn test_two_codes_survive_binarized_upright_variant() {
    init_logging();
    let left = render_qr("LEFT", 5, 4);
    let right = render_qr("RIGHT", 5, 4);
    let mut img = GrayImage::from_pixel(left.width() + right.width(), left.height(), Luma([255]));
    image::imageops::replace(&mut img, &left, 0, 0);
    image::imageops::replace(&mut img, &right, left.width() as i64, 0);

    let processor = ImageProcessor::default();
    let upright = processor.single_shot(&Frame::Luma(img), 0.0);
    let texts = QRDecoder::new().detect_and_decode_multi(&Frame::Luma(upright)).unwrap();

    let found: HashSet<String> = texts.into_iter().collect();
    assert_eq!(found, HashSet::from(["LEFT".to_string(), "RIGHT".to_string()]));
}

#[test]
fn test_code_outside_roi_found_by_full_frame_layer() {
    init_logging();
    // ROI of a 640x480 frame is the centered 336 px square starting at (152, 72)
    let code = render_qr("CORNER", 4, 4);
    let mut frame = GrayImage::from_pixel(640, 480, Luma([230]));
    image::imageops::replace(&mut frame, &code, 0, 0);
    let frame = Frame::Luma(frame);

    let pipeline: ScanPipeline = ScanPipeline::default();
    let variants = pipeline.processor().live_variants(&frame);
    assert!(variants.roi().x >= code.width() && variants.roi().y >= code.height());

    let (payloads, report) = pipeline.scan_variants(variants);

    assert_eq!(texts(&payloads), vec!["CORNER"]);
    assert_eq!(report.attempts, 4);
    assert_eq!(report.matched.map(|v| v.enhancement), Some(Enhancement::FullFrameBinary));
}

#[derive(Clone)]
struct SteppedClock(Rc<Cell<Instant>>);

impl Clock for SteppedClock {
    fn now(&self) -> Instant {
        self.0.get()
    }
}

/// Same camera frame over and over, 40 ms apart
struct StillCamera {
    frame: Frame,
    clock: SteppedClock,
    remaining: usize,
}

impl VideoSource for StillCamera {
    fn read(&mut self) -> Result<Option<Frame>, StreamError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.clock.0.set(self.clock.0.get() + Duration::from_millis(40));
        Ok(Some(self.frame.clone()))
    }

    fn release(&mut self) {}
}

#[test]
fn test_live_scan_confirms_code_in_center() {
    init_logging();
    let code = render_qr("LIVE-42", 4, 4);
    let mut canvas = DynamicImage::ImageLuma8(GrayImage::from_pixel(320, 240, Luma([230]))).to_rgb8();
    let code_rgb = DynamicImage::ImageLuma8(code.clone()).to_rgb8();
    image::imageops::replace(
        &mut canvas,
        &code_rgb,
        ((320 - code.width()) / 2) as i64,
        ((240 - code.height()) / 2) as i64,
    );

    let clock = SteppedClock(Rc::new(Cell::new(Instant::now())));
    let mut camera = StillCamera {
        frame: Frame::Rgb(canvas),
        clock: clock.clone(),
        remaining: 30,
    };

    let pipeline = ScanPipeline::new(ProcessingConfig::default(), QRDecoder::new());
    let mut live = LiveScanController::new(pipeline, LiveScanConfig::default(), clock);
    let outcome = live.run(&mut camera, &mut HeadlessDisplay);

    assert_eq!(outcome, LiveScanOutcome::Confirmed("LIVE-42".to_string()));
    assert_eq!(live.state().matches(), 3);
}
