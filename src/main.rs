use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::time::Instant;

use photocrop::image_processing::batch::{BatchConfig, CropResult, ProcessingEngine};
use photocrop::json_output::JsonMessage;
use photocrop::utils::{
    create_progress_bar, error_println, format_duration, validate_inputs, verbose_println,
    ProcessingStats,
};
use photocrop::Args;

fn print_configuration(config: &BatchConfig, args: &Args) {
    println!("{}", style("Configuration:").bold());
    println!(
        "  Target size: {}x{}",
        config.target_width, config.target_height
    );
    println!("  Strategy: {}", config.crop.strategy);
    println!("  Resize filter: {}", config.crop.filter);
    println!("  Auto orient: {}", config.crop.auto_orient);
    println!("  Parallel jobs: {}", config.parallel_jobs);
    println!("  Extensions: {:?}", config.extensions);
    if let Some(cascade) = &args.cascade {
        println!("  Frontal cascade: {}", cascade.display());
    }
    if let Some(cascade) = &args.profile_cascade {
        println!("  Profile cascade: {}", cascade.display());
    }
    if let Some(budget) = config.crop.max_detection_time {
        println!("  Detection budget: {}", format_duration(budget));
    }
    if let Some(seed) = config.crop.seed {
        println!("  Seed: {}", seed);
    }
    if config.offset_only {
        println!("  Offset only: no files will be written");
    }
    println!();
}

fn print_result(result: &CropResult) {
    let filename = result
        .input_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unknown");

    let destination = match &result.output_path {
        Some(path) => style(path.display().to_string()).dim(),
        None => style("offset only".to_string()).dim(),
    };

    println!(
        "  {} {} at ({}, {}) {} {}",
        style("✓").green(),
        style(filename).bold(),
        result.offset.x,
        result.offset.y,
        destination,
        style(format!("[{}]", format_duration(result.duration))).dim()
    );
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let mut args = Args::parse();
    args.load_and_merge_config()?;

    validate_inputs(&args)?;

    let (target_width, target_height) = args.parse_size()?;
    let config = BatchConfig {
        crop: args.to_crop_config(),
        target_width,
        target_height,
        extensions: args.parse_extensions(),
        parallel_jobs: args.parallel_jobs(),
        offset_only: args.offset_only,
        verbose: args.verbose && !args.json,
    };

    if !args.json {
        println!("{}", style("photocrop - content-aware cropping").bold().blue());
        println!();
        if config.verbose {
            print_configuration(&config, &args);
        }
    }

    if !config.offset_only {
        std::fs::create_dir_all(&args.output_dir).context("Failed to create output directory")?;
    }

    let engine = ProcessingEngine::new(config)?;
    let image_files = engine.discover_images(&args.input_paths)?;

    if image_files.is_empty() {
        if args.json {
            JsonMessage::summary(0, 0, 0, start_time.elapsed().as_secs_f64()).emit();
        } else {
            println!(
                "{}",
                style("No images found with specified extensions").red()
            );
        }
        return Ok(());
    }

    let progress = if args.json || engine.config().verbose {
        None
    } else {
        let pb = create_progress_bar(image_files.len() as u64);
        pb.set_message("Cropping images");
        Some(pb)
    };

    let results = engine.process_batch(&image_files, &args.output_dir, |_, path| {
        if let Some(pb) = &progress {
            pb.inc(1);
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                pb.set_message(name.to_string());
            }
        }
        verbose_println(
            engine.config().verbose,
            &format!("Finished {}", path.display()),
        );
    });

    if let Some(pb) = &progress {
        pb.finish_with_message("✓ Processing complete!");
        println!();
    }

    let mut stats = ProcessingStats::new(image_files.len());
    for (path, result) in image_files.iter().zip(&results) {
        match result {
            Ok(crop) => {
                stats.record_success(crop.duration);
                if args.json {
                    JsonMessage::crop(crop).emit();
                } else {
                    print_result(crop);
                }
            }
            Err(e) => {
                stats.record_failure();
                if args.json {
                    JsonMessage::failed(path, format!("{:#}", e)).emit();
                } else {
                    error_println(&format!("{}: {:#}", path.display(), e));
                }
            }
        }
    }

    let total_time = start_time.elapsed();
    if args.json {
        JsonMessage::summary(
            stats.total_files,
            stats.successful,
            stats.failed,
            total_time.as_secs_f64(),
        )
        .emit();
        return Ok(());
    }

    println!();
    println!("{}", style("Results Summary:").bold().green());
    println!(
        "  Successfully processed: {}",
        style(stats.successful).bold().green()
    );
    if stats.failed > 0 {
        println!("  Failed: {}", style(stats.failed).bold().red());
    }
    println!("  Success rate: {:.1}%", stats.success_rate());
    if stats.successful > 0 {
        println!(
            "  Average time per image: {}",
            format_duration(stats.average_duration())
        );
    }
    println!(
        "  Total time: {}",
        style(format_duration(total_time)).bold()
    );

    Ok(())
}
