//! Expression analysis library for frame-by-frame video understanding.
//!
//! This library analyzes a video stream to detect:
//! - Facial emotion per detected face, via an `ONNX` face detector and a
//!   7-class emotion classifier
//! - Discrete body pose actions (arm up, squat, jump, head tilts, ...)
//!   derived from 33 skeletal landmarks
//! - Anomalous movement, flagged when the mean frame-to-frame landmark
//!   displacement exceeds a threshold
//!
//! Each frame is annotated with the detections and written to an output
//! video; aggregate counts are reported at the end of the run.
//!
//! # Examples
//!
//! ## Processing a video file
//!
//! ```no_run
//! use expression_analysis::app::{AppConfig, ExpressionApp};
//! use expression_analysis::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let app_config = AppConfig {
//!     input: "input_video.mp4".to_string(),
//!     output: "annotated.mp4".to_string(),
//!     config: Config::default(),
//! };
//!
//! let app = ExpressionApp::new(&app_config)?;
//! let stats = app.run()?;
//! println!("{stats}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Classifying pose actions directly
//!
//! ```
//! use expression_analysis::actions::classify;
//!
//! // No landmarks means no actions
//! let actions = classify(None);
//! assert!(!actions.any());
//! ```
//!
//! ## Checking for anomalous movement
//!
//! ```
//! use expression_analysis::anomaly::MotionAnomalyDetector;
//!
//! let detector = MotionAnomalyDetector::new(0.2);
//! // Without a previous landmark set there is never an anomaly
//! # use expression_analysis::landmarks::{Landmark, LandmarkSet};
//! # let current = LandmarkSet::new([Landmark::default(); 33]);
//! let result = detector.check(None, &current);
//! assert!(!result.is_anomalous);
//! ```

/// Pose action classification from landmark geometry
pub mod actions;

/// Frame annotation drawing
pub mod annotate;

/// Anomalous movement detection between consecutive landmark sets
pub mod anomaly;

/// Pipeline controller and application wiring
pub mod app;

/// Configuration management
pub mod config;

/// Constants used throughout the application
pub mod constants;

/// Face detection and dominant-emotion classification
pub mod emotion;

/// Error types and result handling
pub mod error;

/// Body pose landmark types and skeleton topology
pub mod landmarks;

/// Body pose landmark extraction
pub mod pose;

/// Running aggregate statistics and the summary report
pub mod stats;

/// Frame source and sink abstractions over video I/O
pub mod video;

pub use error::{Error, Result};
