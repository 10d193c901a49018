//! Integration tests for complete background removal workflows
//!
//! These run the full pipeline against the mock backend, so no model file or
//! network access is needed.

use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use ndarray::{s, Array4};
use sticker_bgremove::{
    BackendKind, BackgroundRemover, DisplayPoint, DisplaySize, EditingSession, ImageSource,
    MockBackend, MockSessionLoader, RemovalConfig, SeedPoint, SeedRequest, SessionStatus,
};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

/// Encode a solid test image in the given format
fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 5) as u8, (y * 7) as u8, 90]));
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut buffer), format)
        .unwrap();
    buffer
}

fn mock_config() -> RemovalConfig {
    RemovalConfig::builder()
        .backend(BackendKind::Mock)
        .model_input_size(16)
        .feather_radius(1)
        .build()
        .unwrap()
}

/// 16x16 saliency with a small blob on the left and a larger one on the right
fn two_blob_saliency() -> Array4<f32> {
    let mut saliency = Array4::zeros((1, 1, 16, 16));
    saliency.slice_mut(s![0, 0, 2..8, 1..5]).fill(1.0);
    saliency.slice_mut(s![0, 0, 2..14, 9..15]).fill(1.0);
    saliency
}

fn two_blob_remover() -> BackgroundRemover {
    let loader = MockSessionLoader::new(MockBackend::with_output(16, two_blob_saliency()));
    BackgroundRemover::with_loader(mock_config(), Arc::new(loader)).unwrap()
}

fn alpha_at(image: &image::RgbaImage, x: u32, y: u32) -> u8 {
    image.get_pixel(x, y)[3]
}

#[tokio::test]
async fn test_file_to_png_workflow() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("portrait.jpg");
    std::fs::write(&input, encoded_image(48, 32, ImageFormat::Jpeg)).unwrap();

    let remover = BackgroundRemover::new(mock_config()).unwrap();
    let result = remover
        .remove_background(&ImageSource::Path(input.clone()), None)
        .await
        .unwrap();

    let output = temp.path().join(sticker_bgremove::output_file_name(
        input.file_name().and_then(|n| n.to_str()),
    ));
    result.save_png(&output).unwrap();
    assert!(output.ends_with("portrait-nobg.png"));

    let saved = image::open(&output).unwrap();
    assert_eq!(saved.dimensions(), (48, 32));
    let saved = saved.to_rgba8();
    assert_eq!(alpha_at(&saved, 24, 16), 255);
    assert_eq!(alpha_at(&saved, 0, 0), 0);
    assert_eq!(alpha_at(&saved, 47, 31), 0);

    // Color channels are carried over unchanged where the subject is kept
    let original = result.image.get_pixel(24, 16);
    assert_eq!(saved.get_pixel(24, 16), original);
    assert_eq!(result.metadata.working_dimensions, (48, 32));
    assert_eq!(remover.session_status(), SessionStatus::Ready);
}

#[tokio::test]
async fn test_seed_keeps_the_pressed_region() {
    let remover = two_blob_remover();
    let source = ImageSource::Bytes(encoded_image(32, 32, ImageFormat::Png));

    let seeded = remover
        .remove_background(&source, Some(SeedRequest::Working(SeedPoint::new(6, 10))))
        .await
        .unwrap();
    assert!(seeded.metadata.seed_used);
    assert_eq!(alpha_at(&seeded.image, 6, 10), 255);
    assert_eq!(alpha_at(&seeded.image, 24, 16), 0);

    let unseeded = remover.remove_background(&source, None).await.unwrap();
    assert!(!unseeded.metadata.seed_used);
    assert_eq!(alpha_at(&unseeded.image, 24, 16), 255);
    assert_eq!(alpha_at(&unseeded.image, 6, 10), 0);
}

#[tokio::test]
async fn test_seed_on_background_falls_back_to_largest() {
    let remover = two_blob_remover();
    let source = ImageSource::Bytes(encoded_image(32, 32, ImageFormat::Png));

    let result = remover
        .remove_background(&source, Some(SeedRequest::Working(SeedPoint::new(0, 31))))
        .await
        .unwrap();
    assert_eq!(result.metadata.seed, Some(SeedPoint::new(0, 31)));
    assert!(!result.metadata.seed_used);
    assert_eq!(alpha_at(&result.image, 24, 16), 255);
}

#[tokio::test]
async fn test_display_seed_is_mapped_to_working_pixels() {
    let remover = two_blob_remover();
    let source = ImageSource::Bytes(encoded_image(32, 32, ImageFormat::Png));
    let seed = SeedRequest::Display {
        point: DisplayPoint::new(3.0, 5.0),
        display: DisplaySize::new(16.0, 16.0),
    };

    let result = remover.remove_background(&source, Some(seed)).await.unwrap();
    assert_eq!(result.metadata.seed, Some(SeedPoint::new(6, 10)));
    assert!(result.metadata.seed_used);
    assert_eq!(alpha_at(&result.image, 24, 16), 0);
}

#[tokio::test]
async fn test_large_image_is_bounded_to_max_side() {
    let config = RemovalConfig::builder()
        .backend(BackendKind::Mock)
        .model_input_size(16)
        .max_side(64)
        .build()
        .unwrap();
    let remover = BackgroundRemover::new(config).unwrap();
    let source = ImageSource::Bytes(encoded_image(256, 128, ImageFormat::Png));

    let result = remover.remove_background(&source, None).await.unwrap();
    assert_eq!(result.original_dimensions, (256, 128));
    assert_eq!(result.dimensions(), (64, 32));
    assert_eq!(result.alpha.dimensions(), (64, 32));
}

#[tokio::test]
async fn test_concurrent_requests_share_one_session() {
    let remover = BackgroundRemover::new(mock_config()).unwrap();
    let source = ImageSource::Bytes(encoded_image(20, 20, ImageFormat::Png));

    let runs = (0..8).map(|_| remover.remove_background(&source, None));
    let results = futures::future::join_all(runs).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(remover.session_provider().load_attempts(), 1);
}

#[tokio::test]
async fn test_editing_session_applies_cutout() {
    let remover = two_blob_remover();
    let mut session = EditingSession::new(
        encoded_image(32, 32, ImageFormat::Png),
        Some("dog.webp".to_string()),
    );
    session.set_display_size(DisplaySize::new(320.0, 320.0));
    session.begin_picking();
    assert!(session.pointer_down(DisplayPoint::new(60.0, 100.0)));

    let result = session.apply(&remover).await.unwrap();

    assert_eq!(session.name(), Some("dog-nobg.png"));
    assert_eq!(session.picker().seed(), None);
    assert!(result.metadata.seed_used);

    let cutout = image::load_from_memory(session.image()).unwrap().to_rgba8();
    assert_eq!(alpha_at(&cutout, 6, 10), 255);
    assert_eq!(alpha_at(&cutout, 24, 16), 0);
}
