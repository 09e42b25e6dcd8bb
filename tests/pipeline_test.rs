//! Pipeline controller tests with scripted perception collaborators.

use expression_analysis::actions::Action;
use expression_analysis::app::Pipeline;
use expression_analysis::constants::NUM_POSE_LANDMARKS;
use expression_analysis::emotion::{Emotion, EmotionAnalyzer, FaceDetection};
use expression_analysis::landmarks::{
    Landmark, LandmarkSet, LEFT_ANKLE, LEFT_EAR, LEFT_HIP, LEFT_KNEE, LEFT_SHOULDER, LEFT_WRIST,
    NOSE, RIGHT_ANKLE, RIGHT_EAR, RIGHT_HIP, RIGHT_KNEE, RIGHT_SHOULDER, RIGHT_WRIST,
};
use expression_analysis::pose::PoseExtractor;
use expression_analysis::video::{FrameSink, FrameSource, VideoProperties};
use expression_analysis::{Error, Result};
use opencv::core::{Mat, Rect, CV_8UC3};
use opencv::prelude::*;
use std::collections::VecDeque;

/// Produces a fixed number of blank frames
struct SyntheticSource {
    remaining: usize,
    properties: VideoProperties,
}

impl SyntheticSource {
    fn new(frames: usize) -> Self {
        Self {
            remaining: frames,
            properties: VideoProperties {
                width: 64,
                height: 64,
                fps: 30.0,
                frame_count: frames as i64,
            },
        }
    }
}

impl FrameSource for SyntheticSource {
    fn properties(&self) -> VideoProperties {
        self.properties
    }

    fn read_frame(&mut self) -> Result<Option<Mat>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let frame = Mat::zeros(64, 64, CV_8UC3)?.to_mat()?;
        Ok(Some(frame))
    }
}

/// Counts writes without keeping the frames
#[derive(Default)]
struct CountingSink {
    written: usize,
}

impl FrameSink for CountingSink {
    fn write_frame(&mut self, _frame: &Mat) -> Result<()> {
        self.written += 1;
        Ok(())
    }
}

/// Replays a scripted response per frame, then empty results
struct ScriptedEmotion {
    responses: VecDeque<Result<Vec<FaceDetection>>>,
}

impl ScriptedEmotion {
    fn empty() -> Self {
        Self {
            responses: VecDeque::new(),
        }
    }

    fn with(responses: Vec<Result<Vec<FaceDetection>>>) -> Self {
        Self {
            responses: responses.into(),
        }
    }
}

impl EmotionAnalyzer for ScriptedEmotion {
    fn analyze(&mut self, _frame: &Mat) -> Result<Vec<FaceDetection>> {
        self.responses.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Replays a scripted landmark set per frame, then absence
struct ScriptedPose {
    responses: VecDeque<Option<LandmarkSet>>,
}

impl ScriptedPose {
    fn absent() -> Self {
        Self {
            responses: VecDeque::new(),
        }
    }

    fn with(responses: Vec<Option<LandmarkSet>>) -> Self {
        Self {
            responses: responses.into(),
        }
    }
}

impl PoseExtractor for ScriptedPose {
    fn extract(&mut self, _frame: &Mat) -> Result<Option<LandmarkSet>> {
        Ok(self.responses.pop_front().unwrap_or(None))
    }
}

fn face(emotion: Emotion) -> FaceDetection {
    FaceDetection {
        region: Rect::new(10, 10, 30, 30),
        score: 0.9,
        keypoints: None,
        dominant_emotion: emotion,
        emotion_confidence: 0.8,
    }
}

/// A pose with the left arm raised and nothing else triggered
fn arm_up_pose() -> LandmarkSet {
    let mut points = [Landmark::default(); NUM_POSE_LANDMARKS];
    points[NOSE] = Landmark::new(0.5, 0.1, 0.0);
    points[LEFT_EAR] = Landmark::new(0.4, 0.1, 0.0);
    points[RIGHT_EAR] = Landmark::new(0.6, 0.1, 0.0);
    points[LEFT_SHOULDER] = Landmark::new(0.45, 0.5, 0.0);
    points[RIGHT_SHOULDER] = Landmark::new(0.55, 0.5, 0.0);
    points[LEFT_WRIST] = Landmark::new(0.4, 0.1, 0.0);
    points[RIGHT_WRIST] = Landmark::new(0.6, 0.6, 0.0);
    points[LEFT_HIP] = Landmark::new(0.47, 0.6, 0.0);
    points[RIGHT_HIP] = Landmark::new(0.53, 0.6, 0.0);
    points[LEFT_KNEE] = Landmark::new(0.47, 0.7, 0.0);
    points[RIGHT_KNEE] = Landmark::new(0.53, 0.7, 0.0);
    points[LEFT_ANKLE] = Landmark::new(0.47, 0.9, 0.0);
    points[RIGHT_ANKLE] = Landmark::new(0.53, 0.9, 0.0);
    LandmarkSet::new(points)
}

fn shifted_y(set: &LandmarkSet, dy: f32) -> LandmarkSet {
    let mut points: [Landmark; NUM_POSE_LANDMARKS] = set.points().try_into().expect("complete set");
    for point in &mut points {
        point.y += dy;
    }
    LandmarkSet::new(points)
}

#[test]
fn test_empty_run_counts_frames_only() {
    let mut source = SyntheticSource::new(4);
    let mut sink = CountingSink::default();
    let pipeline = Pipeline::new(ScriptedEmotion::empty(), ScriptedPose::absent(), 0.2);

    let stats = pipeline.run(&mut source, &mut sink).expect("run");

    assert_eq!(stats.frames(), 4);
    assert_eq!(stats.anomalies(), 0);
    assert!(stats.emotion_counts().is_empty());
    assert!(stats.action_counts().is_empty());
    assert_eq!(sink.written, 4, "exactly one write per processed frame");
}

#[test]
fn test_three_frame_scenario() {
    // Frame 1: no pose. Frame 2: left arm raised. Frame 3: same pose
    // uniformly shifted down by 0.3 in y.
    let base = arm_up_pose();
    let shifted = shifted_y(&base, 0.3);

    let mut source = SyntheticSource::new(3);
    let mut sink = CountingSink::default();
    let pose = ScriptedPose::with(vec![None, Some(base), Some(shifted)]);
    let pipeline = Pipeline::new(ScriptedEmotion::empty(), pose, 0.2);

    let stats = pipeline.run(&mut source, &mut sink).expect("run");

    assert_eq!(stats.frames(), 3);
    // Frame 2 has no prior pose, frame 3 moves by 0.3 > 0.2
    assert_eq!(stats.anomalies(), 1);
    // The uniform shift leaves relative offsets unchanged
    assert_eq!(stats.action_count(Action::ArmUp), 2);
    assert_eq!(stats.action_count(Action::BothArmsUp), 0);
    assert!(stats.emotion_counts().is_empty());
    assert_eq!(sink.written, 3);
}

#[test]
fn test_perception_failure_does_not_halt_the_run() {
    let mut source = SyntheticSource::new(3);
    let mut sink = CountingSink::default();
    let emotion = ScriptedEmotion::with(vec![
        Ok(vec![face(Emotion::Happy)]),
        Err(Error::NoFaceDetected),
        Ok(vec![face(Emotion::Happy)]),
    ]);
    let pipeline = Pipeline::new(emotion, ScriptedPose::absent(), 0.2);

    let stats = pipeline.run(&mut source, &mut sink).expect("run");

    // The failed frame is still counted and written; it just contributes
    // no emotion tallies
    assert_eq!(stats.frames(), 3);
    assert_eq!(sink.written, 3);
    assert_eq!(stats.emotion_count(Emotion::Happy), 2);
}

#[test]
fn test_emotion_tally_is_per_face() {
    let mut source = SyntheticSource::new(2);
    let mut sink = CountingSink::default();
    let emotion = ScriptedEmotion::with(vec![
        Ok(vec![face(Emotion::Happy), face(Emotion::Sad)]),
        Ok(vec![face(Emotion::Happy)]),
    ]);
    let pipeline = Pipeline::new(emotion, ScriptedPose::absent(), 0.2);

    let stats = pipeline.run(&mut source, &mut sink).expect("run");

    assert_eq!(stats.emotion_count(Emotion::Happy), 2);
    assert_eq!(stats.emotion_count(Emotion::Sad), 1);
    assert_eq!(stats.emotion_count(Emotion::Neutral), 0);
}

#[test]
fn test_pose_gap_preserves_carried_state() {
    // A miss on frame 2 must not clear the carried pose: frame 3 is
    // compared against frame 1's reading, across the gap.
    let base = arm_up_pose();
    let shifted = shifted_y(&base, 0.3);

    let mut source = SyntheticSource::new(3);
    let mut sink = CountingSink::default();
    let pose = ScriptedPose::with(vec![Some(base), None, Some(shifted)]);
    let pipeline = Pipeline::new(ScriptedEmotion::empty(), pose, 0.2);

    let stats = pipeline.run(&mut source, &mut sink).expect("run");

    assert_eq!(stats.frames(), 3);
    assert_eq!(stats.anomalies(), 1, "comparison must span the pose gap");
}

#[test]
fn test_identical_consecutive_poses_are_not_anomalous() {
    let base = arm_up_pose();

    let mut source = SyntheticSource::new(2);
    let mut sink = CountingSink::default();
    let pose = ScriptedPose::with(vec![Some(base), Some(base)]);
    let pipeline = Pipeline::new(ScriptedEmotion::empty(), pose, 0.2);

    let stats = pipeline.run(&mut source, &mut sink).expect("run");

    assert_eq!(stats.anomalies(), 0);
    assert_eq!(stats.action_count(Action::ArmUp), 2);
}
