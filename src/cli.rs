use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::config_file::Tuning;
use crate::image_processing::backend::ResizeFilter;
use crate::image_processing::{CropConfig, StrategyKind};

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum StrategyArg {
    /// Centre the crop window
    #[value(name = "center")]
    Center,
    /// Keep the most detailed part of the image
    #[value(name = "entropy")]
    Entropy,
    /// Centre on the energy of the four quadrants
    #[value(name = "balanced")]
    Balanced,
    /// Keep detected faces inside the crop
    #[value(name = "face")]
    Face,
}

impl From<StrategyArg> for StrategyKind {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::Center => StrategyKind::Center,
            StrategyArg::Entropy => StrategyKind::Entropy,
            StrategyArg::Balanced => StrategyKind::Balanced,
            StrategyArg::Face => StrategyKind::Face,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FilterArg {
    #[value(name = "nearest")]
    Nearest,
    #[value(name = "bilinear")]
    Bilinear,
    /// Cubic filter, sharp and fast
    #[value(name = "catmull-rom")]
    CatmullRom,
    #[value(name = "lanczos3")]
    Lanczos3,
}

impl From<FilterArg> for ResizeFilter {
    fn from(filter: FilterArg) -> Self {
        match filter {
            FilterArg::Nearest => ResizeFilter::Nearest,
            FilterArg::Bilinear => ResizeFilter::Bilinear,
            FilterArg::CatmullRom => ResizeFilter::CatmullRom,
            FilterArg::Lanczos3 => ResizeFilter::Lanczos3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "photocrop",
    about = "Content-aware resize and crop for photos",
    long_about = "
photocrop - content-aware thumbnail cropping

Resizes each image so it covers the target size, then picks the crop window
that keeps the interesting part of the picture.

Strategies:
• center    plain centre crop
• entropy   slices away the low-detail edges
• balanced  centres on the brightest edges of each quadrant
• face      entropy slicing that never cuts through detected faces

Example Usage:
  # Square thumbnails of a whole directory
  photocrop -i ~/Photos -o ~/thumbs -s 256x256

  # Face-aware crops with a detection time budget
  photocrop -i ~/Photos -o ~/thumbs -s 400x300 --strategy face \\
    --cascade frontal.json --profile-cascade profile.json --max-detection-ms 800

  # Only print the offsets as JSON lines
  photocrop -i IMG_001.jpg -s 100x100 --offset-only --json"
)]
pub struct Args {
    /// Input directories or single image files (can be specified multiple times)
    #[arg(short = 'i', long = "input", value_name = "DIR|FILE")]
    pub input_paths: Vec<PathBuf>,

    /// Output directory for cropped images
    #[arg(short = 'o', long = "output", value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Target size (format: WIDTHxHEIGHT, e.g., 200x200)
    #[arg(
        short = 's',
        long = "size",
        default_value = "200x200",
        value_name = "WIDTHxHEIGHT"
    )]
    pub size: String,

    /// Crop strategy
    #[arg(long = "strategy", default_value = "entropy")]
    pub strategy: StrategyArg,

    /// Resize filter
    #[arg(long = "filter", default_value = "catmull-rom")]
    pub filter: FilterArg,

    /// Ignore the EXIF orientation tag
    #[arg(long = "no-auto-orient")]
    pub no_auto_orient: bool,

    /// Frontal face cascade (JSON)
    #[arg(long = "cascade", value_name = "FILE")]
    pub cascade: Option<PathBuf>,

    /// Profile face cascade (JSON)
    #[arg(long = "profile-cascade", value_name = "FILE")]
    pub profile_cascade: Option<PathBuf>,

    /// Face detection budget in milliseconds; the profile pass is skipped past half of it
    #[arg(long = "max-detection-ms", value_name = "MS")]
    pub max_detection_ms: Option<u64>,

    /// Seed for the balanced strategy sampler
    #[arg(long = "seed", value_name = "N")]
    pub seed: Option<u64>,

    /// Print crop offsets without writing images
    #[arg(long = "offset-only")]
    pub offset_only: bool,

    /// Emit one JSON object per image instead of styled output
    #[arg(long = "json")]
    pub json: bool,

    /// Number of parallel processing jobs (0 = auto-detect CPU cores)
    #[arg(short = 'j', long = "jobs", default_value = "0", value_name = "N")]
    pub jobs: usize,

    /// Comma-separated list of image extensions to process
    #[arg(long = "extensions", default_value = "jpg,jpeg,png,webp,tiff")]
    pub extensions_str: String,

    /// JSON configuration file; command-line arguments take precedence
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Engine constants from the configuration file
    #[arg(skip)]
    pub tuning: Tuning,
}

impl Args {
    /// Parse the size string into width and height
    pub fn parse_size(&self) -> anyhow::Result<(u32, u32)> {
        crate::utils::parse_size(&self.size)
    }

    /// Parse the extensions string into a vector
    pub fn parse_extensions(&self) -> Vec<String> {
        self.extensions_str
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn parallel_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }

    /// Library configuration for the selected options
    pub fn to_crop_config(&self) -> CropConfig {
        let mut config = CropConfig {
            strategy: self.strategy.into(),
            filter: self.filter.into(),
            auto_orient: !self.no_auto_orient,
            frontal_cascade: self.cascade.clone(),
            profile_cascade: self.profile_cascade.clone(),
            max_detection_time: self.max_detection_ms.map(Duration::from_millis),
            seed: self.seed,
            verbose: self.verbose && !self.json,
            ..CropConfig::default()
        };
        self.tuning.apply(&mut config);
        config
    }
}


// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            input_paths: vec![],
            output_dir: PathBuf::from("."),
            size: "200x200".to_string(),
            strategy: StrategyArg::Entropy,
            filter: FilterArg::CatmullRom,
            no_auto_orient: false,
            cascade: None,
            profile_cascade: None,
            max_detection_ms: None,
            seed: None,
            offset_only: false,
            json: false,
            jobs: 0,
            extensions_str: "jpg,png".to_string(),
            config_file: None,
            verbose: false,
            tuning: Tuning::default(),
        }
    }
}
