use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::{Args, FilterArg, StrategyArg};
use crate::image_processing::detector::DetectorParams;
use crate::image_processing::CropConfig;

/// JSON configuration file; every field is optional
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub input: Option<Vec<PathBuf>>,
    pub output: Option<PathBuf>,
    pub size: Option<String>,
    pub strategy: Option<String>,
    pub filter: Option<String>,
    pub auto_orient: Option<bool>,
    pub cascade: Option<PathBuf>,
    pub profile_cascade: Option<PathBuf>,
    pub max_detection_ms: Option<u64>,
    pub seed: Option<u64>,
    pub offset_only: Option<bool>,
    pub json: Option<bool>,
    pub jobs: Option<usize>,
    pub extensions: Option<String>,
    pub verbose: Option<bool>,
    #[serde(flatten)]
    pub tuning: Tuning,
}

/// Engine constants that have no command-line switch
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tuning {
    pub detector: Option<DetectorParams>,
    pub sample_ratio: Option<f64>,
    pub potential_ratio: Option<f64>,
    pub slice_divisions: Option<u32>,
}

impl Tuning {
    pub fn apply(&self, config: &mut CropConfig) {
        if let Some(detector) = self.detector {
            config.detector = detector;
        }
        if let Some(sample_ratio) = self.sample_ratio {
            config.sample_ratio = sample_ratio;
        }
        if let Some(potential_ratio) = self.potential_ratio {
            config.potential_ratio = potential_ratio;
        }
        if let Some(slice_divisions) = self.slice_divisions {
            config.slice_divisions = slice_divisions;
        }
    }
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

/// Whether any of `flags` was given explicitly, as `--flag value` or `--flag=value`
fn given(cli_args: &[String], flags: &[&str]) -> bool {
    cli_args.iter().any(|arg| {
        flags.iter().any(|flag| {
            arg == flag
                || arg
                    .strip_prefix(flag)
                    .is_some_and(|rest| rest.starts_with('='))
        })
    })
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line arguments
    /// Command-line arguments take precedence over config file values
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        if let Some(config_path) = self.config_file.clone() {
            let config = ConfigFile::load(&config_path)?;
            let args_from_cli = std::env::args().collect::<Vec<_>>();

            self.merge_from_config(config, &args_from_cli)?;

            if self.verbose && !self.json {
                eprintln!("Loaded configuration from: {:?}", config_path);
            }
        }
        Ok(())
    }

    pub fn merge_from_config(&mut self, config: ConfigFile, cli_args: &[String]) -> Result<()> {
        if !given(cli_args, &["-i", "--input"]) {
            if let Some(input) = config.input {
                self.input_paths = input;
            }
        }

        if !given(cli_args, &["-o", "--output"]) {
            if let Some(output) = config.output {
                self.output_dir = output;
            }
        }

        if !given(cli_args, &["-s", "--size"]) {
            if let Some(size) = config.size {
                self.size = size;
            }
        }

        if !given(cli_args, &["--strategy"]) {
            if let Some(strategy) = config.strategy {
                self.strategy = StrategyArg::from_str(&strategy, true)
                    .map_err(|e| anyhow::anyhow!("Invalid strategy in config file: {}", e))?;
            }
        }

        if !given(cli_args, &["--filter"]) {
            if let Some(filter) = config.filter {
                self.filter = FilterArg::from_str(&filter, true)
                    .map_err(|e| anyhow::anyhow!("Invalid filter in config file: {}", e))?;
            }
        }

        if !given(cli_args, &["--no-auto-orient"]) {
            if let Some(auto_orient) = config.auto_orient {
                self.no_auto_orient = !auto_orient;
            }
        }

        if !given(cli_args, &["--cascade"]) && config.cascade.is_some() {
            self.cascade = config.cascade;
        }

        if !given(cli_args, &["--profile-cascade"]) && config.profile_cascade.is_some() {
            self.profile_cascade = config.profile_cascade;
        }

        if !given(cli_args, &["--max-detection-ms"]) && config.max_detection_ms.is_some() {
            self.max_detection_ms = config.max_detection_ms;
        }

        if !given(cli_args, &["--seed"]) && config.seed.is_some() {
            self.seed = config.seed;
        }

        if !given(cli_args, &["-j", "--jobs"]) {
            if let Some(jobs) = config.jobs {
                self.jobs = jobs;
            }
        }

        if !given(cli_args, &["--extensions"]) {
            if let Some(extensions) = config.extensions {
                self.extensions_str = extensions;
            }
        }

        // Switches can only be turned on from the file
        self.offset_only |= config.offset_only.unwrap_or(false);
        self.json |= config.json.unwrap_or(false);
        self.verbose |= config.verbose.unwrap_or(false);

        self.tuning = config.tuning;

        Ok(())
    }
}
