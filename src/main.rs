//! Video expression analysis: emotions, pose actions and movement anomalies.

use anyhow::Result;
use clap::Parser;
use expression_analysis::app::{AppConfig, ExpressionApp};
use expression_analysis::config::Config;
use log::info;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(author, version, about = "Annotates a video with facial emotions, pose actions and movement anomalies", long_about = None)]
struct Args {
    /// Input video file to analyze
    input: String,

    /// Output video file (defaults to <input stem>_annotated.mp4)
    #[arg(short, long)]
    output: Option<String>,

    /// Face detection backend (scrfd_500m, scrfd_2.5g, scrfd_10g)
    #[arg(short, long)]
    backend: Option<String>,

    /// Average-displacement threshold for anomalous movement
    #[arg(short = 't', long)]
    anomaly_threshold: Option<f32>,

    /// Treat frames without a detectable face as perception failures
    #[arg(long)]
    enforce_detection: bool,

    /// Align face crops by the eye line before emotion classification
    #[arg(long)]
    align: bool,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Expression Analysis");

    // Load configuration if provided, then apply CLI overrides
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {config_path}");
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("Failed to load config file: {e}. Using defaults.");
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    if let Some(backend) = args.backend {
        config.detection.detector_backend = backend;
    }
    if let Some(threshold) = args.anomaly_threshold {
        config.anomaly.threshold = threshold;
    }
    if args.enforce_detection {
        config.detection.enforce_detection = true;
    }
    if args.align {
        config.detection.align = true;
    }

    let output = args.output.unwrap_or_else(|| default_output_path(&args.input));

    let app_config = AppConfig {
        input: args.input,
        output,
        config,
    };

    let app = ExpressionApp::new(&app_config)?;
    let stats = app.run()?;

    println!("{stats}");

    Ok(())
}

/// Derive `<input stem>_annotated.mp4` next to the input file
fn default_output_path(input: &str) -> String {
    let path = Path::new(input);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            parent.join(format!("{stem}_annotated.mp4")).display().to_string()
        }
        _ => format!("{stem}_annotated.mp4"),
    }
}
