//! Face-aware cropping: detected faces become safe zones for the entropy slicer

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::backend;
use super::cascade::Cascade;
use super::detector::ObjectDetector;
use super::entropy::EntropySlicer;
use super::geometry::{CropOffset, SafeZone};
use super::{CropContext, CropStrategy};
use crate::utils::{verbose_println, warn_println};

/// Load a cascade for face detection.
///
/// A missing or malformed file is reported and treated as no cascade, so the
/// strategy falls back to plain entropy slicing.
pub fn load_cascade(path: &Path) -> Option<Arc<Cascade>> {
    match Cascade::from_file(path) {
        Ok(cascade) => Some(Arc::new(cascade)),
        Err(e) => {
            warn_println(&format!("Ignoring cascade {}: {:#}", path.display(), e));
            None
        }
    }
}

pub struct FaceStrategy {
    frontal: Option<Arc<Cascade>>,
    profile: Option<Arc<Cascade>>,
    detector: ObjectDetector,
    budget: Option<Duration>,
    slicer: EntropySlicer,
    /// Safe zones per working canvas size
    zones: HashMap<(u32, u32), Vec<SafeZone>>,
    verbose: bool,
}

impl FaceStrategy {
    pub fn new(detector: ObjectDetector, slicer: EntropySlicer) -> Self {
        Self {
            frontal: None,
            profile: None,
            detector,
            budget: None,
            slicer,
            zones: HashMap::new(),
            verbose: false,
        }
    }

    pub fn with_cascades(
        mut self,
        frontal: Option<Arc<Cascade>>,
        profile: Option<Arc<Cascade>>,
    ) -> Self {
        self.frontal = frontal;
        self.profile = profile;
        self
    }

    /// The profile pass only runs while less than half of `budget` is spent
    pub fn with_budget(mut self, budget: Option<Duration>) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Number of canvas sizes with memoised safe zones
    pub fn cached_sizes(&self) -> usize {
        self.zones.len()
    }

    /// Safe zones for the working image of `ctx`, detected once per canvas size
    pub fn safe_zones(&mut self, ctx: &CropContext) -> &[SafeZone] {
        let key = ctx.image.dimensions();

        if !self.zones.contains_key(&key) {
            let zones = self.detect_zones(ctx);
            verbose_println(
                self.verbose,
                &format!("{} safe zone(s) for {}x{} canvas", zones.len(), key.0, key.1),
            );
            self.zones.insert(key, zones);
        }

        self.zones.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn detect_zones(&self, ctx: &CropContext) -> Vec<SafeZone> {
        let cascades: Vec<&Cascade> = [&self.frontal, &self.profile]
            .into_iter()
            .flatten()
            .map(|c| c.as_ref())
            .collect();

        let (width, height) = ctx.image.dimensions();
        if cascades.is_empty() || width == 0 || height == 0 {
            return Vec::new();
        }

        // Detection runs on the source; zones are mapped onto the working canvas
        let canvas = self.detector.prepare(ctx.source);
        let detections = self.detector.detect_all(&canvas, &cascades, self.budget);

        let x_ratio = canvas.width() as f64 / width as f64;
        let y_ratio = canvas.height() as f64 / height as f64;

        detections
            .iter()
            .map(|face| SafeZone::from_detection(face, x_ratio, y_ratio))
            .collect()
    }
}

impl CropStrategy for FaceStrategy {
    fn special_offset(
        &mut self,
        ctx: &CropContext,
        target_width: u32,
        target_height: u32,
    ) -> Result<CropOffset> {
        let zones = self.safe_zones(ctx).to_vec();
        let measured = backend::measure_image(ctx.image);
        self.slicer
            .offset(&measured, target_width, target_height, &zones)
    }

    fn reset(&mut self) {
        self.zones.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::cascade::tests::accepting_cascade;
    use crate::image_processing::detector::DetectorParams;
    use image::{ImageBuffer, Rgb, RgbImage};

    fn create_test_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                ((x * 13 + y * 7) % 256) as u8,
                ((x * 3 + y * 29) % 256) as u8,
                ((x * y) % 256) as u8,
            ])
        })
    }

    fn strategy(cascade: Option<Cascade>) -> FaceStrategy {
        FaceStrategy::new(
            ObjectDetector::new(DetectorParams::default()),
            EntropySlicer::default(),
        )
        .with_cascades(cascade.map(Arc::new), None)
    }

    #[test]
    fn test_no_cascade_means_no_zones() {
        let img = create_test_image(60, 40);
        let ctx = CropContext {
            image: &img,
            source: &img,
        };
        let mut face = strategy(None);

        assert!(face.safe_zones(&ctx).is_empty());
    }

    #[test]
    fn test_without_zones_matches_entropy_slicing() {
        let img = create_test_image(90, 60);
        let ctx = CropContext {
            image: &img,
            source: &img,
        };
        let mut face = strategy(None);

        let measured = backend::measure_image(&img);
        let expected = EntropySlicer::default().offset(&measured, 50, 50, &[]).unwrap();
        assert_eq!(face.special_offset(&ctx, 50, 50).unwrap(), expected);
    }

    #[test]
    fn test_zones_are_cached_per_canvas_size() {
        let source = create_test_image(80, 60);
        let working = create_test_image(40, 30);
        let mut face = strategy(Some(accepting_cascade(16, 16)));

        let ctx = CropContext {
            image: &source,
            source: &source,
        };
        let first = face.safe_zones(&ctx).to_vec();
        assert!(!first.is_empty());
        assert_eq!(face.safe_zones(&ctx), first.as_slice());
        assert_eq!(face.cached_sizes(), 1);

        let scaled = CropContext {
            image: &working,
            source: &source,
        };
        let halved = face.safe_zones(&scaled).to_vec();
        assert_eq!(face.cached_sizes(), 2);
        assert_eq!(halved.len(), first.len());

        face.reset();
        assert_eq!(face.cached_sizes(), 0);
    }

    #[test]
    fn test_offset_stays_inside_working_image() {
        let source = create_test_image(120, 80);
        let mut face = strategy(Some(accepting_cascade(12, 12)));
        let ctx = CropContext {
            image: &source,
            source: &source,
        };

        let offset = face.special_offset(&ctx, 80, 80).unwrap();
        assert!(offset.x <= 40);
        assert_eq!(offset.y, 0);
    }

    #[test]
    fn test_missing_cascade_file_is_ignored() {
        assert!(load_cascade(Path::new("/nonexistent/frontal.json")).is_none());
    }
}
