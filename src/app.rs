//! Pipeline controller and application wiring.
//!
//! One run is one pass over the frame sequence: read, perceive, classify,
//! annotate, write, tally. Perception failures are recovered per frame;
//! only source exhaustion ends the run and only startup failures are fatal.

use crate::actions::{classify, ActionSet};
use crate::annotate::annotate_frame;
use crate::anomaly::{AnomalyResult, MotionAnomalyDetector};
use crate::config::Config;
use crate::constants::{PERCEPTION_BUDGET_MS, PROGRESS_LOG_INTERVAL};
use crate::emotion::{EmotionAnalyzer, FaceDetection, OnnxEmotionAnalyzer};
use crate::error::Result;
use crate::landmarks::LandmarkSet;
use crate::pose::{OnnxPoseExtractor, PoseExtractor};
use crate::stats::RunStatistics;
use crate::video::{FrameSink, FrameSource, VideoFileSink, VideoFileSource};
use log::{debug, info, warn};
use opencv::core::Mat;
use std::time::Instant;

/// Carried pose state across frames.
///
/// A pose miss leaves the state untouched, so the next anomaly check
/// compares against the last frame that did have a successful reading.
/// The expected displacement therefore scales with the gap length.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseHistory {
    last: Option<LandmarkSet>,
}

impl PoseHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last successful landmark reading, if any
    #[must_use]
    pub fn previous(&self) -> Option<&LandmarkSet> {
        self.last.as_ref()
    }

    /// Record a successful landmark reading
    pub fn observe(&mut self, landmarks: LandmarkSet) {
        self.last = Some(landmarks);
    }
}

/// Frame-analysis pipeline over injectable perception collaborators.
///
/// Owns the carried pose state and the running statistics for exactly one
/// run; [`Pipeline::run`] consumes the pipeline and returns the final
/// statistics.
pub struct Pipeline<E, P> {
    emotion: E,
    pose: P,
    anomaly: MotionAnomalyDetector,
    history: PoseHistory,
    stats: RunStatistics,
}

impl<E: EmotionAnalyzer, P: PoseExtractor> Pipeline<E, P> {
    /// Create a pipeline with the given collaborators and anomaly threshold
    pub fn new(emotion: E, pose: P, anomaly_threshold: f32) -> Self {
        Self {
            emotion,
            pose,
            anomaly: MotionAnomalyDetector::new(anomaly_threshold),
            history: PoseHistory::new(),
            stats: RunStatistics::new(),
        }
    }

    /// Run one full pass: read every frame from the source, process it and
    /// write it to the sink, then return the final statistics.
    ///
    /// # Errors
    ///
    /// Returns an error on sink or annotation failure; perception failures
    /// are recovered per frame and never abort the run.
    pub fn run(mut self, source: &mut dyn FrameSource, sink: &mut dyn FrameSink) -> Result<RunStatistics> {
        let properties = source.properties();
        info!(
            "Starting analysis: {}x{} @ {:.2} fps",
            properties.width, properties.height, properties.fps
        );

        while let Some(mut frame) = source.read_frame()? {
            self.process_frame(&mut frame)?;
            sink.write_frame(&frame)?;

            let frames = self.stats.frames();
            debug!("Processed frame {frames}");
            if frames % PROGRESS_LOG_INTERVAL == 0 {
                if properties.frame_count > 0 {
                    let percent = 100.0 * frames as f64 / properties.frame_count as f64;
                    info!("Processed {frames}/{} frames ({percent:.0}%)", properties.frame_count);
                } else {
                    info!("Processed {frames} frames");
                }
            }
        }

        info!(
            "Analysis complete: {} frames, {} anomalies",
            self.stats.frames(),
            self.stats.anomalies()
        );
        Ok(self.stats)
    }

    /// Analyze and annotate a single frame in place
    fn process_frame(&mut self, frame: &mut Mat) -> Result<()> {
        let faces = self.detect_faces(frame);
        let landmarks = self.detect_pose(frame);

        let actions = classify(landmarks.as_ref());
        let anomaly = self.check_anomaly(landmarks.as_ref());

        annotate_frame(frame, &faces, landmarks.as_ref(), &actions, anomaly.is_anomalous)?;
        self.record(&faces, &actions, &anomaly);

        Ok(())
    }

    /// Invoke the face/emotion collaborator with local failure recovery:
    /// a failed frame contributes no face annotations or emotion tallies
    /// but continues through pose and anomaly processing.
    fn detect_faces(&mut self, frame: &Mat) -> Vec<FaceDetection> {
        let started = Instant::now();
        let result = self.emotion.analyze(frame);
        warn_if_slow("face/emotion analysis", started);

        match result {
            Ok(faces) => faces,
            Err(e) => {
                warn!("Face analysis failed on frame {}: {e}", self.stats.frames() + 1);
                Vec::new()
            }
        }
    }

    /// Invoke the pose collaborator; a failure counts as "no pose detected"
    fn detect_pose(&mut self, frame: &Mat) -> Option<LandmarkSet> {
        let started = Instant::now();
        let result = self.pose.extract(frame);
        warn_if_slow("pose extraction", started);

        match result {
            Ok(landmarks) => landmarks,
            Err(e) => {
                warn!("Pose extraction failed on frame {}: {e}", self.stats.frames() + 1);
                None
            }
        }
    }

    /// Check the current landmarks against the carried pose state and
    /// advance the state on a successful reading
    fn check_anomaly(&mut self, landmarks: Option<&LandmarkSet>) -> AnomalyResult {
        let Some(current) = landmarks else {
            return AnomalyResult::default();
        };

        let result = self.anomaly.check(self.history.previous(), current);
        if result.is_anomalous {
            debug!(
                "Anomalous movement: mean displacement {:.3} > {:.3}",
                result.mean_displacement,
                self.anomaly.threshold()
            );
        }
        self.history.observe(*current);
        result
    }

    fn record(&mut self, faces: &[FaceDetection], actions: &ActionSet, anomaly: &AnomalyResult) {
        self.stats.record(faces, actions, anomaly.is_anomalous);
    }
}

fn warn_if_slow(what: &str, started: Instant) {
    let elapsed = started.elapsed().as_millis();
    if elapsed > PERCEPTION_BUDGET_MS {
        warn!("{what} took {elapsed} ms, over the {PERCEPTION_BUDGET_MS} ms budget");
    }
}

/// Application configuration assembled from the CLI and the config file
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Input video path
    pub input: String,
    /// Output video path
    pub output: String,
    /// Detection, anomaly and model settings
    pub config: Config,
}

/// Fully wired application: file source and sink around an ONNX-backed
/// pipeline
pub struct ExpressionApp {
    source: VideoFileSource,
    sink: VideoFileSink,
    pipeline: Pipeline<OnnxEmotionAnalyzer, OnnxPoseExtractor>,
}

impl ExpressionApp {
    /// Open the source, load the models and create the sink.
    ///
    /// The source is opened first and the sink created last, so a startup
    /// failure never leaves a partial output file behind.
    ///
    /// # Errors
    ///
    /// Returns an error when the input cannot be opened, a model cannot be
    /// loaded or the output writer cannot be created. All are fatal before
    /// any frame is processed.
    pub fn new(app_config: &AppConfig) -> Result<Self> {
        let config = &app_config.config;
        config.validate()?;

        let source = VideoFileSource::open(&app_config.input)?;

        let backend = config.detector_backend()?;
        info!("Using face detector backend: {backend}");
        let emotion = OnnxEmotionAnalyzer::new(
            config.models.face_detector_path(backend),
            config.models.emotion_classifier_path(),
            &config.detection,
        )?;
        let pose = OnnxPoseExtractor::new(config.models.pose_landmarks_path())?;

        let properties = source.properties();
        let sink = VideoFileSink::create(&app_config.output, &config.output.fourcc, &properties)?;

        let pipeline = Pipeline::new(emotion, pose, config.anomaly.threshold);

        Ok(Self {
            source,
            sink,
            pipeline,
        })
    }

    /// Process the whole video and return the final statistics
    ///
    /// # Errors
    ///
    /// Returns an error on sink or annotation failure mid-run.
    pub fn run(self) -> Result<RunStatistics> {
        let Self {
            mut source,
            mut sink,
            pipeline,
        } = self;
        pipeline.run(&mut source, &mut sink)
    }
}
