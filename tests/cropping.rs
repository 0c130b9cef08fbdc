//! End-to-end checks of the public cropping API.

use image::{ImageBuffer, Rgb, RgbImage};
use photocrop::image_processing::cascade::{Cascade, CascadeEvaluator, Feature, Stage, WeightedRectangle};
use photocrop::image_processing::detector::{group_rectangles, Canvas, DetectorParams, ObjectDetector};
use photocrop::image_processing::integral::IntegralTables;
use photocrop::{CropConfig, CropOffset, Cropper, Rectangle, StrategyKind};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Textured photo-like fixture: smooth gradient with a busy block in the lower right
fn create_test_image(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        if x > width * 2 / 3 && y > height / 2 {
            Rgb([
                ((x * 97 + y * 31) % 256) as u8,
                ((x * 13 + y * 71) % 256) as u8,
                ((x * y) % 256) as u8,
            ])
        } else {
            Rgb([(x / 4) as u8, (y / 4) as u8, 128])
        }
    })
}

fn accepting_cascade(width: u32, height: u32) -> Cascade {
    Cascade {
        size: (width, height),
        stages: vec![Stage {
            threshold: 0.0,
            features: vec![Feature {
                threshold: 0.0,
                left_value: 1.0,
                right_value: 1.0,
                rectangles: vec![WeightedRectangle {
                    rect: Rectangle::new(0, 0, width, height),
                    weight: 1.0,
                }],
            }],
        }],
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("photocrop-it-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn every_strategy_produces_the_target_size() {
    for kind in [
        StrategyKind::Center,
        StrategyKind::Entropy,
        StrategyKind::Balanced,
        StrategyKind::Face,
    ] {
        let config = CropConfig::default().with_strategy(kind).with_seed(11);
        let mut cropper = Cropper::with_image(create_test_image(200, 150), config);

        let cropped = cropper.resize_and_crop(100, 100).unwrap();
        assert_eq!(cropped.dimensions(), (100, 100), "{}", kind);
    }
}

#[test]
fn entropy_keeps_the_detailed_side() {
    let config = CropConfig::default().with_strategy(StrategyKind::Entropy);
    let mut cropper = Cropper::with_image(create_test_image(300, 150), config);

    // 300x150 covers 100x100 at 200x100; detail sits in the right third
    let offset = cropper.resized_offset(100, 100).unwrap();
    assert!(offset.x > 50, "offset {:?}", offset);
    assert_eq!(offset.y, 0);
}

#[test]
fn center_offset_matches_the_middle() {
    let config = CropConfig::default().with_strategy(StrategyKind::Center);
    let mut cropper = Cropper::with_image(create_test_image(200, 150), config);
    assert_eq!(cropper.crop_offset(100, 100).unwrap(), CropOffset::new(50, 25));
}

#[test]
fn overlapping_detections_are_grouped() {
    let raw = [
        Rectangle::new(10, 10, 20, 20),
        Rectangle::new(11, 11, 21, 19),
        Rectangle::new(100, 100, 20, 20),
    ];

    let grouped = group_rectangles(&raw, 1, 0.2);
    assert_eq!(
        grouped,
        vec![Rectangle::new(10, 10, 20, 19), Rectangle::new(100, 100, 20, 20)]
    );
}

#[test]
fn unreachable_stage_threshold_detects_nothing() {
    let mut cascade = accepting_cascade(8, 8);
    cascade.stages[0].threshold = f64::INFINITY;

    let canvas = Canvas::from_rgb(&create_test_image(64, 48));
    let detector = ObjectDetector::new(DetectorParams::default());
    assert!(detector.detect(&canvas, &cascade).is_empty());

    let evaluator = CascadeEvaluator::new(&cascade, canvas.tables());
    assert!(!evaluator.evaluate(0, 0, 1.0));
}

#[test]
fn integral_sums_match_brute_force() {
    let data: Vec<f64> = (0..35).map(|v| (v * 7 % 11) as f64).collect();
    let tables = IntegralTables::new(7, 5, &data);

    let expected: f64 = (1..4)
        .flat_map(|y| (2..6).map(move |x| (x, y)))
        .map(|(x, y)| data[y * 7 + x])
        .sum();
    assert_eq!(tables.sum(&Rectangle::new(2, 1, 4, 3)), expected);
    assert_eq!(tables.sum(&Rectangle::new(2, 1, 0, 3)), 0.0);
}

#[test]
fn face_strategy_with_cascade_file() {
    let dir = scratch_dir("face");
    let cascade_path = dir.join("frontal.json");
    fs::write(
        &cascade_path,
        serde_json::to_string(&accepting_cascade(48, 48)).unwrap(),
    )
    .unwrap();

    let config = CropConfig {
        strategy: StrategyKind::Face,
        frontal_cascade: Some(cascade_path),
        max_detection_time: Some(Duration::from_secs(5)),
        ..CropConfig::default()
    };
    let mut cropper = Cropper::with_image(create_test_image(200, 150), config);

    let cropped = cropper.resize_and_crop(100, 100).unwrap();
    assert_eq!(cropped.dimensions(), (100, 100));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn broken_cascade_file_falls_back_to_entropy() {
    let dir = scratch_dir("broken");
    let cascade_path = dir.join("broken.json");
    fs::write(&cascade_path, "{ not json").unwrap();

    let face = CropConfig {
        strategy: StrategyKind::Face,
        frontal_cascade: Some(cascade_path),
        ..CropConfig::default()
    };
    let entropy = CropConfig::default().with_strategy(StrategyKind::Entropy);

    let image = create_test_image(180, 120);
    let mut face_cropper = Cropper::with_image(image.clone(), face);
    let mut entropy_cropper = Cropper::with_image(image, entropy);

    assert_eq!(
        face_cropper.resized_offset(90, 90).unwrap(),
        entropy_cropper.resized_offset(90, 90).unwrap()
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn open_reads_files_from_disk() {
    let dir = scratch_dir("open");
    let path = dir.join("photo.png");
    create_test_image(120, 90).save(&path).unwrap();

    let config = CropConfig::default().with_strategy(StrategyKind::Center);
    let mut cropper = Cropper::open(&path, config).unwrap();
    assert_eq!(cropper.base_dimensions(), Some((120, 90)));
    assert_eq!(cropper.resize_and_crop(60, 60).unwrap().dimensions(), (60, 60));

    assert!(Cropper::open(&dir.join("missing.png"), CropConfig::default()).is_err());

    let _ = fs::remove_dir_all(&dir);
}
