use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use super::geometry::CropOffset;
use super::{CascadeSet, CropConfig, Cropper};
use crate::utils::{has_valid_extension, verbose_println};

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub crop: CropConfig,
    pub target_width: u32,
    pub target_height: u32,
    pub extensions: Vec<String>,
    pub parallel_jobs: usize,
    /// Compute offsets without writing images
    pub offset_only: bool,
    pub verbose: bool,
}

/// Outcome of one processed file
#[derive(Debug, Clone)]
pub struct CropResult {
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    /// Offset inside the resized image
    pub offset: CropOffset,
    pub duration: Duration,
}

pub struct ProcessingEngine {
    config: BatchConfig,
    cascades: CascadeSet,
    pool: rayon::ThreadPool,
}

impl ProcessingEngine {
    pub fn new(config: BatchConfig) -> Result<Self> {
        config.crop.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_jobs)
            .build()
            .context("Failed to initialize thread pool")?;

        // Cascades are parsed once and shared by every file
        let cascades = CascadeSet::load(&config.crop);

        Ok(Self {
            config,
            cascades,
            pool,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Discover all image files below the input paths
    pub fn discover_images(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut image_files = Vec::new();

        for input in inputs {
            if input.is_file() {
                image_files.push(input.clone());
                continue;
            }

            verbose_println(
                self.config.verbose,
                &format!("Scanning directory: {}", input.display()),
            );

            let walker = WalkDir::new(input).follow_links(false).max_depth(10);

            for entry in walker {
                let entry = entry.context("Failed to read directory entry")?;
                let path = entry.path();

                if path.is_file() && has_valid_extension(path, &self.config.extensions) {
                    image_files.push(path.to_path_buf());
                }
            }
        }

        // Sort for consistent processing order
        image_files.sort();
        image_files.dedup();

        verbose_println(
            self.config.verbose,
            &format!("Found {} image files", image_files.len()),
        );
        Ok(image_files)
    }

    /// Process a batch of images with progress callback
    pub fn process_batch<F>(
        &self,
        image_files: &[PathBuf],
        output_dir: &Path,
        progress_callback: F,
    ) -> Vec<Result<CropResult>>
    where
        F: Fn(usize, &Path) + Send + Sync,
    {
        let processed_count = AtomicUsize::new(0);

        self.pool.install(|| {
            image_files
                .par_iter()
                .map(|image_path| {
                    let result = self.process_single_image(image_path, output_dir);

                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    progress_callback(count, image_path);

                    result
                })
                .collect()
        })
    }

    /// Crop one file, writing `<stem>_<W>x<H>.<ext>` unless only offsets are wanted
    pub fn process_single_image(&self, input_path: &Path, output_dir: &Path) -> Result<CropResult> {
        let start = Instant::now();
        let (width, height) = (self.config.target_width, self.config.target_height);

        let mut cropper = Cropper::with_cascades(self.config.crop.clone(), &self.cascades);
        cropper.load(input_path)?;

        let (offset, output_path) = if self.config.offset_only {
            (cropper.resized_offset(width, height)?, None)
        } else {
            let (cropped, offset) = cropper.resize_and_crop_with_offset(width, height)?;
            let output_path = output_path_for(input_path, output_dir, width, height);
            cropped
                .save(&output_path)
                .with_context(|| format!("Failed to save {}", output_path.display()))?;
            (offset, Some(output_path))
        };

        Ok(CropResult {
            input_path: input_path.to_path_buf(),
            output_path,
            width,
            height,
            offset,
            duration: start.elapsed(),
        })
    }
}

/// `<output_dir>/<stem>_<W>x<H>.<ext>`, keeping the input extension
pub fn output_path_for(input_path: &Path, output_dir: &Path, width: u32, height: u32) -> PathBuf {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let extension = input_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "png".to_string());

    output_dir.join(format!("{}_{}x{}.{}", stem, width, height, extension))
}
