//! Constants used throughout the application

/// Number of body pose landmarks per detected person
pub const NUM_POSE_LANDMARKS: usize = 33;

/// Default average-displacement threshold for anomalous movement,
/// in normalized-coordinate units
pub const DEFAULT_ANOMALY_THRESHOLD: f32 = 0.2;

/// Normalized ankle height below which both ankles count as a jump
pub const JUMP_ANKLE_Y_THRESHOLD: f32 = 0.5;

/// Number of emotion classes produced by the classifier head
pub const NUM_EMOTION_CLASSES: usize = 7;

/// Emotion classifier input side length (square grayscale crop)
pub const EMOTION_INPUT_SIZE: i32 = 64;

/// Pose network input side length (square RGB frame)
pub const POSE_INPUT_SIZE: i32 = 256;

/// Pose landmark presence score below which the whole set is discarded
pub const POSE_PRESENCE_THRESHOLD: f32 = 0.5;

/// Image normalization constants for face detection
pub const IMAGE_NORMALIZATION_OFFSET: f32 = 127.5;
pub const IMAGE_NORMALIZATION_SCALE: f32 = 128.0;

/// Default frames per second assumed when the container reports none
pub const DEFAULT_FPS: f64 = 30.0;

/// How often the pipeline logs coarse progress, in frames
pub const PROGRESS_LOG_INTERVAL: u64 = 100;

/// Wall-clock budget for a single perception call before a warning is logged
pub const PERCEPTION_BUDGET_MS: u128 = 2_000;
