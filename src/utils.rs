use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use crate::cli::Args;

/// Create a styled progress bar
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(bar_style) = ProgressStyle::with_template(
        "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})",
    ) {
        pb.set_style(bar_style.progress_chars("#>-"));
    }
    pb
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Parse a `WIDTHxHEIGHT` string
pub fn parse_size(size: &str) -> Result<(u32, u32)> {
    let parts: Vec<&str> = size.trim().split(['x', 'X']).collect();
    if parts.len() != 2 {
        return Err(anyhow::anyhow!(
            "Invalid size format '{}'. Use WIDTHxHEIGHT (e.g., 800x480)",
            size
        ));
    }

    let width = parts[0]
        .parse::<u32>()
        .map_err(|_| anyhow::anyhow!("Invalid width: '{}'", parts[0]))?;
    let height = parts[1]
        .parse::<u32>()
        .map_err(|_| anyhow::anyhow!("Invalid height: '{}'", parts[1]))?;

    if width == 0 || height == 0 {
        return Err(anyhow::anyhow!("Width and height must be greater than 0"));
    }

    Ok((width, height))
}

/// Validate command line arguments
pub fn validate_inputs(args: &Args) -> Result<()> {
    if args.input_paths.is_empty() {
        return Err(anyhow::anyhow!("No input paths given"));
    }

    for input_path in &args.input_paths {
        if !input_path.exists() {
            return Err(anyhow::anyhow!(
                "Input path does not exist: {}",
                input_path.display()
            ));
        }
        if !input_path.is_dir() && !input_path.is_file() {
            return Err(anyhow::anyhow!(
                "Input path is neither a file nor a directory: {}",
                input_path.display()
            ));
        }
    }

    parse_size(&args.size)?;

    if args.parse_extensions().is_empty() {
        return Err(anyhow::anyhow!("No valid extensions specified"));
    }

    if args.jobs > 64 {
        return Err(anyhow::anyhow!(
            "Job count too high (max 64), got: {}",
            args.jobs
        ));
    }

    for cascade in [&args.cascade, &args.profile_cascade].into_iter().flatten() {
        if !cascade.is_file() {
            return Err(anyhow::anyhow!(
                "Cascade file does not exist: {}",
                cascade.display()
            ));
        }
    }

    args.to_crop_config()
        .validate()
        .context("Invalid tuning in config file")?;

    Ok(())
}

/// Get file extension in lowercase
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a file has one of the specified extensions
pub fn has_valid_extension(path: &Path, extensions: &[String]) -> bool {
    if let Some(ext) = get_file_extension(path) {
        extensions.contains(&ext)
    } else {
        false
    }
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        println!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    eprintln!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}

/// Calculate processing statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_duration: Duration,
}

impl ProcessingStats {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self, duration: Duration) {
        self.successful += 1;
        self.total_duration += duration;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.successful as f64 / self.total_files as f64) * 100.0
        }
    }

    pub fn average_duration(&self) -> Duration {
        if self.successful == 0 {
            Duration::new(0, 0)
        } else {
            self.total_duration / self.successful as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(1)), "1.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("800x480").unwrap(), (800, 480));
        assert_eq!(parse_size("100X100").unwrap(), (100, 100));
        assert!(parse_size("800").is_err());
        assert!(parse_size("0x480").is_err());
        assert!(parse_size("axb").is_err());
        assert!(parse_size("1x2x3").is_err());
    }

    #[test]
    fn test_has_valid_extension() {
        let extensions = vec!["jpg".to_string(), "png".to_string()];
        assert!(has_valid_extension(&PathBuf::from("a/photo.JPG"), &extensions));
        assert!(has_valid_extension(&PathBuf::from("b.png"), &extensions));
        assert!(!has_valid_extension(&PathBuf::from("c.webp"), &extensions));
        assert!(!has_valid_extension(&PathBuf::from("noext"), &extensions));
    }

    #[test]
    fn test_processing_stats() {
        let mut stats = ProcessingStats::new(4);
        stats.record_success(Duration::from_millis(100));
        stats.record_success(Duration::from_millis(300));
        stats.record_failure();

        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.success_rate(), 50.0);
        assert_eq!(stats.average_duration(), Duration::from_millis(200));
        assert_eq!(ProcessingStats::new(0).success_rate(), 0.0);
    }

    #[test]
    fn test_validate_inputs_rejects_missing_paths() {
        let args = Args {
            input_paths: vec![PathBuf::from("/nonexistent/photos")],
            ..Default::default()
        };
        assert!(validate_inputs(&args).is_err());

        let args = Args {
            input_paths: vec![std::env::temp_dir()],
            size: "bad".to_string(),
            ..Default::default()
        };
        assert!(validate_inputs(&args).is_err());

        let args = Args {
            input_paths: vec![std::env::temp_dir()],
            ..Default::default()
        };
        assert!(validate_inputs(&args).is_ok());
    }
}
