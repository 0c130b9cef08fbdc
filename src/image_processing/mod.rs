pub mod backend;
pub mod balanced;
pub mod batch;
pub mod cascade;
pub mod center;
pub mod detector;
pub mod energy;
pub mod entropy;
pub mod face;
pub mod geometry;
pub mod integral;
pub mod orientation;

use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use strum_macros::{Display, EnumString};

use self::backend::ResizeFilter;
use self::balanced::{BalancedStrategy, QuadrantBalancer};
use self::cascade::Cascade;
use self::center::CenterStrategy;
use self::detector::{DetectorParams, ObjectDetector};
use self::energy::DEFAULT_SAMPLE_RATIO;
use self::entropy::{EntropySlicer, EntropyStrategy, POTENTIAL_RATIO, SLICE_DIVISIONS};
use self::face::{load_cascade, FaceStrategy};
use self::geometry::CropOffset;
use self::orientation::{apply_rotation, read_exif_orientation, ExifOrientation};
use crate::utils::verbose_println;

/// How the crop window is placed inside the resized image
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StrategyKind {
    Center,
    #[default]
    Entropy,
    Balanced,
    Face,
}

#[derive(Debug, Clone)]
pub struct CropConfig {
    pub strategy: StrategyKind,
    pub filter: ResizeFilter,
    pub auto_orient: bool,
    pub detector: DetectorParams,
    pub frontal_cascade: Option<PathBuf>,
    pub profile_cascade: Option<PathBuf>,
    /// Soft budget for face detection; the profile pass is skipped past half of it
    pub max_detection_time: Option<Duration>,
    /// Seed for energy sampling; `None` samples from OS entropy
    pub seed: Option<u64>,
    pub sample_ratio: f64,
    pub potential_ratio: f64,
    pub slice_divisions: u32,
    pub verbose: bool,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            filter: ResizeFilter::default(),
            auto_orient: true,
            detector: DetectorParams::default(),
            frontal_cascade: None,
            profile_cascade: None,
            max_detection_time: None,
            seed: None,
            sample_ratio: DEFAULT_SAMPLE_RATIO,
            potential_ratio: POTENTIAL_RATIO,
            slice_divisions: SLICE_DIVISIONS,
            verbose: false,
        }
    }
}

impl CropConfig {
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn slicer(&self) -> EntropySlicer {
        EntropySlicer::new(self.potential_ratio, self.slice_divisions).with_verbose(self.verbose)
    }

    fn balancer(&self) -> QuadrantBalancer {
        QuadrantBalancer::new(self.sample_ratio, self.seed).with_verbose(self.verbose)
    }

    /// Reject tuning values the strategies cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_ratio.is_finite() && self.sample_ratio > 0.0) {
            return Err(anyhow::anyhow!(
                "Sample ratio must be a positive number, got: {}",
                self.sample_ratio
            ));
        }
        if !(self.potential_ratio.is_finite() && self.potential_ratio > 0.0) {
            return Err(anyhow::anyhow!(
                "Potential ratio must be a positive number, got: {}",
                self.potential_ratio
            ));
        }
        if self.slice_divisions == 0 {
            return Err(anyhow::anyhow!("Slice divisions must be greater than 0"));
        }
        if !(self.detector.canvas_scale.is_finite() && self.detector.canvas_scale > 0.0) {
            return Err(anyhow::anyhow!(
                "Detector canvas scale must be a positive number, got: {}",
                self.detector.canvas_scale
            ));
        }
        Ok(())
    }
}

/// Cascades shared by every cropper of a run
#[derive(Debug, Clone, Default)]
pub struct CascadeSet {
    pub frontal: Option<Arc<Cascade>>,
    pub profile: Option<Arc<Cascade>>,
}

impl CascadeSet {
    /// Load the cascades named by `config`; unreadable files are skipped
    pub fn load(config: &CropConfig) -> Self {
        if config.strategy != StrategyKind::Face {
            return Self::default();
        }

        Self {
            frontal: config.frontal_cascade.as_deref().and_then(load_cascade),
            profile: config.profile_cascade.as_deref().and_then(load_cascade),
        }
    }
}

/// Images a strategy works on for one request
pub struct CropContext<'a> {
    /// Working image the offset applies to
    pub image: &'a RgbImage,
    /// Oriented source before resizing
    pub source: &'a RgbImage,
}

pub trait CropStrategy {
    /// Top-left corner of a `target_width x target_height` window inside `ctx.image`
    fn special_offset(
        &mut self,
        ctx: &CropContext,
        target_width: u32,
        target_height: u32,
    ) -> Result<CropOffset>;

    /// Drop anything memoised for the previous image
    fn reset(&mut self) {}
}

pub fn build_strategy(config: &CropConfig, cascades: &CascadeSet) -> Box<dyn CropStrategy + Send> {
    match config.strategy {
        StrategyKind::Center => Box::new(CenterStrategy),
        StrategyKind::Entropy => Box::new(EntropyStrategy::new(config.slicer())),
        StrategyKind::Balanced => Box::new(BalancedStrategy::new(config.balancer())),
        StrategyKind::Face => {
            let detector = ObjectDetector::new(config.detector).with_verbose(config.verbose);
            Box::new(
                FaceStrategy::new(detector, config.slicer())
                    .with_cascades(cascades.frontal.clone(), cascades.profile.clone())
                    .with_budget(config.max_detection_time)
                    .with_verbose(config.verbose),
            )
        }
    }
}

/// Smallest aspect-preserving size covering the target.
///
/// The constrained side equals the target exactly and the other side is at
/// least as large as its target.
pub fn safe_resize_dimensions(
    source: (u32, u32),
    target_width: u32,
    target_height: u32,
) -> Result<(u32, u32)> {
    let (src_width, src_height) = source;

    if target_width == 0 || target_height == 0 {
        return Err(anyhow::anyhow!(
            "Target dimensions must be non-zero, got {}x{}",
            target_width,
            target_height
        ));
    }
    if src_width == 0 || src_height == 0 {
        return Err(anyhow::anyhow!("Source image is empty"));
    }

    let (sw, sh) = (src_width as u64, src_height as u64);
    let (tw, th) = (target_width as u64, target_height as u64);

    if sw * th < tw * sh {
        Ok((target_width, (sh * tw / sw) as u32))
    } else {
        Ok(((sw * th / sh) as u32, target_height))
    }
}

/// Resize-to-fill pipeline around a crop strategy
pub struct Cropper {
    config: CropConfig,
    strategy: Box<dyn CropStrategy + Send>,
    image: Option<RgbImage>,
    orientation: ExifOrientation,
    base_dimensions: Option<(u32, u32)>,
}

impl Cropper {
    pub fn new(config: CropConfig) -> Self {
        let cascades = CascadeSet::load(&config);
        Self::with_cascades(config, &cascades)
    }

    pub fn with_cascades(config: CropConfig, cascades: &CascadeSet) -> Self {
        let strategy = build_strategy(&config, cascades);
        Self {
            config,
            strategy,
            image: None,
            orientation: ExifOrientation::Undefined,
            base_dimensions: None,
        }
    }

    pub fn with_image(image: RgbImage, config: CropConfig) -> Self {
        let mut cropper = Self::new(config);
        cropper.set_image(image);
        cropper
    }

    /// Decode an image file and pick up its EXIF orientation
    pub fn open(path: &Path, config: CropConfig) -> Result<Self> {
        let mut cropper = Self::new(config);
        cropper.load(path)?;
        Ok(cropper)
    }

    /// Replace the source with a decoded file
    pub fn load(&mut self, path: &Path) -> Result<&mut Self> {
        let img = image::open(path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?
            .to_rgb8();

        let orientation = read_exif_orientation(path).unwrap_or_default();
        verbose_println(
            self.config.verbose,
            &format!(
                "Loaded {} ({}x{}, orientation: {})",
                path.display(),
                img.width(),
                img.height(),
                orientation.description()
            ),
        );

        self.set_image(img);
        self.orientation = orientation;
        Ok(self)
    }

    /// Replace the source image; strategy caches are invalidated
    pub fn set_image(&mut self, image: RgbImage) -> &mut Self {
        self.base_dimensions = Some(image.dimensions());
        self.image = Some(image);
        self.orientation = ExifOrientation::Undefined;
        self.strategy.reset();
        self
    }

    /// Changes the oriented source, so strategy caches are invalidated
    pub fn set_orientation(&mut self, orientation: ExifOrientation) -> &mut Self {
        self.orientation = orientation;
        self.strategy.reset();
        self
    }

    pub fn image(&self) -> Option<&RgbImage> {
        self.image.as_ref()
    }

    /// Dimensions of the source as the strategies see it, after orientation
    pub fn base_dimensions(&self) -> Option<(u32, u32)> {
        self.base_dimensions
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    pub fn filter(&self) -> ResizeFilter {
        self.config.filter
    }

    pub fn set_filter(&mut self, filter: ResizeFilter) -> &mut Self {
        self.config.filter = filter;
        self
    }

    pub fn auto_orient(&self) -> bool {
        self.config.auto_orient
    }

    pub fn set_auto_orient(&mut self, auto_orient: bool) -> &mut Self {
        self.config.auto_orient = auto_orient;
        self.strategy.reset();
        self
    }

    /// Resize to cover the target, then crop it to exactly `target_width x target_height`
    pub fn resize_and_crop(&mut self, target_width: u32, target_height: u32) -> Result<RgbImage> {
        self.resize_and_crop_with_offset(target_width, target_height)
            .map(|(cropped, _)| cropped)
    }

    /// Like `resize_and_crop`, also returning the offset used inside the resized image
    pub fn resize_and_crop_with_offset(
        &mut self,
        target_width: u32,
        target_height: u32,
    ) -> Result<(RgbImage, CropOffset)> {
        let (working, offset) = self.resize_with_offset(target_width, target_height)?;
        let cropped = backend::crop(&working, offset.x, offset.y, target_width, target_height)?;
        Ok((cropped, offset))
    }

    /// Offset `resize_and_crop` would use, in resized image coordinates
    pub fn resized_offset(&mut self, target_width: u32, target_height: u32) -> Result<CropOffset> {
        self.resize_with_offset(target_width, target_height)
            .map(|(_, offset)| offset)
    }

    fn resize_with_offset(
        &mut self,
        target_width: u32,
        target_height: u32,
    ) -> Result<(RgbImage, CropOffset)> {
        let source = self
            .image
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No image set"))?;
        let oriented = orient(source, self.orientation, self.config.auto_orient);
        self.base_dimensions = Some(oriented.dimensions());

        let (resize_width, resize_height) =
            safe_resize_dimensions(oriented.dimensions(), target_width, target_height)?;
        let working = backend::resize(&oriented, resize_width, resize_height, self.config.filter)?;

        verbose_println(
            self.config.verbose,
            &format!(
                "Resized {}x{} -> {}x{} ({})",
                oriented.width(),
                oriented.height(),
                resize_width,
                resize_height,
                self.config.filter
            ),
        );

        let ctx = CropContext {
            image: &working,
            source: &oriented,
        };
        let offset = self.strategy.special_offset(&ctx, target_width, target_height)?;

        verbose_println(
            self.config.verbose,
            &format!("{} offset: ({}, {})", self.config.strategy, offset.x, offset.y),
        );

        Ok((working, offset))
    }

    /// Offset of the crop window directly on the (oriented) source, without resizing
    pub fn crop_offset(&mut self, target_width: u32, target_height: u32) -> Result<CropOffset> {
        let source = self
            .image
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No image set"))?;
        let oriented = orient(source, self.orientation, self.config.auto_orient);
        check_target(&oriented, target_width, target_height)?;
        self.base_dimensions = Some(oriented.dimensions());

        let ctx = CropContext {
            image: &oriented,
            source: &oriented,
        };
        self.strategy.special_offset(&ctx, target_width, target_height)
    }

    /// Quadrant-balanced offset computed on the unfiltered source
    pub fn balanced_offset(&self, target_width: u32, target_height: u32) -> Result<CropOffset> {
        let source = self
            .image
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No image set"))?;
        let oriented = orient(source, self.orientation, self.config.auto_orient);
        check_target(&oriented, target_width, target_height)?;

        let mut balancer = self.config.balancer();
        Ok(balancer.offset(&*oriented, target_width, target_height))
    }
}

/// Source with EXIF orientation applied when enabled
fn orient(source: &RgbImage, orientation: ExifOrientation, enabled: bool) -> Cow<'_, RgbImage> {
    if enabled && orientation.needs_transform() {
        Cow::Owned(apply_rotation(source, orientation))
    } else {
        Cow::Borrowed(source)
    }
}

fn check_target(image: &RgbImage, target_width: u32, target_height: u32) -> Result<()> {
    let (width, height) = image.dimensions();
    if target_width == 0 || target_height == 0 || target_width > width || target_height > height {
        return Err(anyhow::anyhow!(
            "Target {}x{} does not fit inside {}x{} image",
            target_width,
            target_height,
            width,
            height
        ));
    }
    Ok(())
}
