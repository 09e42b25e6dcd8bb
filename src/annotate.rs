//! Frame annotation drawing.
//!
//! A stateless draw pass over one frame: face boxes with emotion labels
//! first, then the pose skeleton and action line, then the anomaly marker.
//! The three groups occupy disjoint screen regions, so later draws never
//! occlude earlier ones.

use crate::actions::ActionSet;
use crate::emotion::FaceDetection;
use crate::landmarks::{LandmarkSet, POSE_CONNECTIONS};
use crate::Result;
use opencv::core::{Mat, Point, Scalar};
use opencv::imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8};
use opencv::prelude::*;

/// Face box and emotion label color (green)
fn face_box_color() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}

/// Emotion text color
fn emotion_text_color() -> Scalar {
    Scalar::new(36.0, 255.0, 12.0, 0.0)
}

/// Skeleton bone color (white)
fn bone_color() -> Scalar {
    Scalar::new(255.0, 255.0, 255.0, 0.0)
}

/// Skeleton joint color (blue)
fn joint_color() -> Scalar {
    Scalar::new(255.0, 0.0, 0.0, 0.0)
}

/// Action line color (yellow)
fn action_text_color() -> Scalar {
    Scalar::new(0.0, 255.0, 255.0, 0.0)
}

/// Anomaly marker color (red)
fn anomaly_color() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}

/// Draw all detections for one frame onto the frame in place.
///
/// Order is deterministic: faces, then skeleton and action labels, then the
/// anomaly marker.
pub fn annotate_frame(
    frame: &mut Mat,
    faces: &[FaceDetection],
    landmarks: Option<&LandmarkSet>,
    actions: &ActionSet,
    anomalous: bool,
) -> Result<()> {
    draw_faces(frame, faces)?;

    if let Some(lm) = landmarks {
        draw_skeleton(frame, lm)?;
        draw_action_line(frame, actions)?;
    }

    if anomalous {
        draw_anomaly_marker(frame)?;
    }

    Ok(())
}

/// Draw each face as a half-size rectangle centered on the detected region,
/// with the dominant emotion written directly above it
fn draw_faces(frame: &mut Mat, faces: &[FaceDetection]) -> Result<()> {
    for face in faces {
        let region = face.region;

        // Inset to half the detected width/height, centered on the region
        let inner_w = region.width / 2;
        let inner_h = region.height / 2;
        let inner_x = region.x + region.width / 4;
        let inner_y = region.y + region.height / 4;

        imgproc::rectangle(
            frame,
            opencv::core::Rect::new(inner_x, inner_y, inner_w, inner_h),
            face_box_color(),
            2,
            LINE_8,
            0,
        )?;

        imgproc::put_text(
            frame,
            face.dominant_emotion.label(),
            Point::new(inner_x, inner_y - 10),
            FONT_HERSHEY_SIMPLEX,
            0.9,
            emotion_text_color(),
            2,
            LINE_8,
            false,
        )?;
    }

    Ok(())
}

/// Draw the full skeletal connection graph plus joint markers
fn draw_skeleton(frame: &mut Mat, landmarks: &LandmarkSet) -> Result<()> {
    let width = frame.cols() as f32;
    let height = frame.rows() as f32;

    let to_pixel = |index: usize| {
        let point = landmarks.point(index);
        Point::new((point.x * width) as i32, (point.y * height) as i32)
    };

    for (a, b) in POSE_CONNECTIONS {
        imgproc::line(frame, to_pixel(a), to_pixel(b), bone_color(), 2, LINE_8, 0)?;
    }

    for index in 0..landmarks.points().len() {
        imgproc::circle(frame, to_pixel(index), 3, joint_color(), -1, LINE_8, 0)?;
    }

    Ok(())
}

/// Write the comma-joined list of currently-true action names
fn draw_action_line(frame: &mut Mat, actions: &ActionSet) -> Result<()> {
    if !actions.any() {
        return Ok(());
    }

    imgproc::put_text(
        frame,
        &actions.active_labels(),
        Point::new(50, 50),
        FONT_HERSHEY_SIMPLEX,
        0.9,
        action_text_color(),
        2,
        LINE_8,
        false,
    )?;

    Ok(())
}

/// Write the anomaly warning marker, below the action line
fn draw_anomaly_marker(frame: &mut Mat) -> Result<()> {
    imgproc::put_text(
        frame,
        "ANOMALOUS MOVEMENT",
        Point::new(50, 90),
        FONT_HERSHEY_SIMPLEX,
        0.9,
        anomaly_color(),
        2,
        LINE_8,
        false,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Rect, CV_8UC3};

    fn blank_frame() -> Mat {
        Mat::zeros(480, 640, CV_8UC3)
            .expect("zeros")
            .to_mat()
            .expect("to_mat")
    }

    #[test]
    fn test_annotate_empty_detections_leaves_frame_valid() {
        let mut frame = blank_frame();
        annotate_frame(&mut frame, &[], None, &ActionSet::default(), false).expect("annotate");
        assert_eq!(frame.cols(), 640);
        assert_eq!(frame.rows(), 480);
    }

    #[test]
    fn test_annotate_with_face_draws_pixels() {
        use crate::emotion::{Emotion, FaceDetection};

        let mut frame = blank_frame();
        let faces = vec![FaceDetection {
            region: Rect::new(100, 100, 200, 200),
            score: 0.95,
            keypoints: None,
            dominant_emotion: Emotion::Happy,
            emotion_confidence: 0.7,
        }];

        annotate_frame(&mut frame, &faces, None, &ActionSet::default(), true).expect("annotate");

        // The inset rectangle edge must have been painted
        let probe = frame
            .at_2d::<opencv::core::Vec3b>(150, 150)
            .expect("probe pixel");
        assert!(probe[1] > 0, "expected green box edge at the inset corner");
    }
}
