//! Face detection and dominant-emotion classification.
//!
//! The face/emotion collaborator is a two-stage ONNX pipeline: an
//! anchor-free SCRFD face detector (backend-selectable model variant)
//! followed by a 7-class emotion classifier head run on each face crop.
//! "No face in frame" is a routine outcome and is reported as an empty
//! detection list, not an error, unless `enforce_detection` is set.

use crate::config::DetectionConfig;
use crate::constants::{
    EMOTION_INPUT_SIZE, IMAGE_NORMALIZATION_OFFSET, IMAGE_NORMALIZATION_SCALE, NUM_EMOTION_CLASSES,
};
use crate::error::Error;
use crate::Result;
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Point2f, Rect, Scalar, Size, BORDER_REPLICATE, CV_32F, CV_8UC3};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Fixed emotion vocabulary, in classifier output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// All emotions in classifier output order
    pub const ALL: [Emotion; NUM_EMOTION_CLASSES] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    /// Stable lowercase label used in annotations and the summary report
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }

    /// Emotion for a classifier output index
    #[must_use]
    pub fn from_index(index: usize) -> Option<Emotion> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Face-detection model variant used by the collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorBackend {
    /// Smallest SCRFD variant, fastest
    Scrfd500m,
    /// Mid-size SCRFD variant
    Scrfd2_5g,
    /// Largest SCRFD variant, most accurate
    Scrfd10g,
}

impl DetectorBackend {
    /// Model file name within the configured model directory
    #[must_use]
    pub fn model_file(self) -> &'static str {
        match self {
            DetectorBackend::Scrfd500m => "scrfd_500m_kps.onnx",
            DetectorBackend::Scrfd2_5g => "scrfd_2.5g_kps.onnx",
            DetectorBackend::Scrfd10g => "scrfd_10g_kps.onnx",
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DetectorBackend::Scrfd500m => "scrfd_500m",
            DetectorBackend::Scrfd2_5g => "scrfd_2.5g",
            DetectorBackend::Scrfd10g => "scrfd_10g",
        }
    }
}

impl fmt::Display for DetectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DetectorBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scrfd_500m" => Ok(DetectorBackend::Scrfd500m),
            "scrfd_2.5g" | "scrfd_2_5g" => Ok(DetectorBackend::Scrfd2_5g),
            "scrfd_10g" => Ok(DetectorBackend::Scrfd10g),
            other => Err(Error::ConfigError(format!(
                "Unknown detector backend: {other} (expected scrfd_500m, scrfd_2.5g or scrfd_10g)"
            ))),
        }
    }
}

/// One detected face with its dominant emotion
#[derive(Debug, Clone)]
pub struct FaceDetection {
    /// Bounding box in pixel coordinates
    pub region: Rect,
    /// Detector confidence for the face itself
    pub score: f32,
    /// Optional 5 facial keypoints (eyes, nose, mouth corners)
    pub keypoints: Option<Vec<Point2f>>,
    /// Highest-confidence emotion label for this face
    pub dominant_emotion: Emotion,
    /// Classifier confidence for the dominant emotion
    pub emotion_confidence: f32,
}

/// Face/emotion collaborator interface used by the pipeline
pub trait EmotionAnalyzer {
    /// Analyze one frame and return all detected faces with emotions.
    ///
    /// A faceless frame is `Ok(vec![])`; an `Err` is a recoverable
    /// perception failure for that frame only.
    fn analyze(&mut self, frame: &Mat) -> Result<Vec<FaceDetection>>;
}

/// A face candidate before emotion classification
struct RawFace {
    bbox: Rect,
    score: f32,
    keypoints: Option<Vec<Point2f>>,
}

/// Candidate box in input-tensor coordinates, prior to NMS
struct Candidate {
    score: f32,
    bbox: [f32; 4],
    keypoints: Option<Vec<(f32, f32)>>,
}

/// SCRFD face detector using `ONNX` Runtime
pub struct FaceDetector {
    session: Session,
    input_size: (i32, i32),
    conf_threshold: f32,
    nms_threshold: f32,
    strides: Vec<i32>,
    num_anchors: usize,
    offset: usize,
    with_kps: bool,
}

impl FaceDetector {
    /// Create a new face detector from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or has no inputs.
    pub fn new<P: AsRef<Path>>(model_path: P, conf_threshold: f32, nms_threshold: f32) -> Result<Self> {
        log::info!("Loading face detector: {}", model_path.as_ref().display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("face_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        let input_meta = session
            .inputs
            .first()
            .ok_or_else(|| Error::ModelInputError("Face detector has no inputs".to_string()))?;
        let input_shape = &input_meta.dimensions;
        let input_size = if input_shape.len() >= 4 {
            let height = input_shape[2].unwrap_or(640) as i32;
            let width = input_shape[3].unwrap_or(640) as i32;
            (width, height)
        } else {
            (640, 640)
        };

        // The SCRFD family shares a decode scheme; output count tells the
        // stride set apart and whether keypoint branches are present.
        let num_outputs = session.outputs.len();
        let (offset, strides, num_anchors, with_kps) = match num_outputs {
            6 => (3, vec![8, 16, 32], 2, false),
            9 => (3, vec![8, 16, 32], 2, true),
            10 => (5, vec![8, 16, 32, 64, 128], 1, false),
            15 => (5, vec![8, 16, 32, 64, 128], 1, true),
            _ => {
                log::warn!("Unknown detector configuration with {num_outputs} outputs, using defaults");
                (3, vec![8, 16, 32], 2, false)
            }
        };

        Ok(Self {
            session,
            input_size,
            conf_threshold,
            nms_threshold,
            strides,
            num_anchors,
            offset,
            with_kps,
        })
    }

    /// Detect faces in a frame
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails.
    fn detect(&self, image: &Mat) -> Result<Vec<RawFace>> {
        let img_width = image.cols();
        let img_height = image.rows();

        // Letterbox the frame into the model input, top-left anchored
        let (input_width, input_height) = self.input_size;
        let ratio_img = img_height as f32 / img_width as f32;
        let ratio_model = input_height as f32 / input_width as f32;
        let (new_width, new_height) = if ratio_img > ratio_model {
            (((input_height as f32) / ratio_img) as i32, input_height)
        } else {
            (input_width, ((input_width as f32) * ratio_img) as i32)
        };
        let det_scale = new_height as f32 / img_height as f32;

        let mut resized = Mat::default();
        imgproc::resize(
            image,
            &mut resized,
            Size::new(new_width, new_height),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut det_img =
            Mat::new_rows_cols_with_default(input_height, input_width, CV_8UC3, Scalar::all(0.0))?;
        let mut roi = det_img.roi_mut(Rect::new(0, 0, new_width, new_height))?;
        resized.copy_to(&mut roi)?;
        drop(roi);

        let inputs = self.preprocess(&det_img)?;
        let candidates = self.forward(inputs)?;
        let kept = self.nms(candidates);

        // Scale back to original image coordinates and clamp
        let mut faces = Vec::with_capacity(kept.len());
        for candidate in kept {
            let [x1, y1, x2, y2] = candidate.bbox;
            let bbox = clamp_region(
                Rect::new(
                    (x1 / det_scale) as i32,
                    (y1 / det_scale) as i32,
                    ((x2 - x1) / det_scale) as i32,
                    ((y2 - y1) / det_scale) as i32,
                ),
                img_width,
                img_height,
            );
            if bbox.width <= 0 || bbox.height <= 0 {
                continue;
            }
            let keypoints = candidate.keypoints.map(|kps| {
                kps.iter()
                    .map(|(x, y)| Point2f::new(x / det_scale, y / det_scale))
                    .collect()
            });
            faces.push(RawFace {
                bbox,
                score: candidate.score,
                keypoints,
            });
        }

        Ok(faces)
    }

    /// Convert a BGR frame to a normalized NCHW tensor
    fn preprocess(&self, image: &Mat) -> Result<Array4<f32>> {
        let mut rgb_image = Mat::default();
        imgproc::cvt_color(image, &mut rgb_image, imgproc::COLOR_BGR2RGB, 0)?;

        let mut float_image = Mat::default();
        rgb_image.convert_to(&mut float_image, CV_32F, 1.0, 0.0)?;

        let height = float_image.rows() as usize;
        let width = float_image.cols() as usize;
        let mut data = vec![0.0f32; 3 * height * width];

        for row in 0..height {
            for col in 0..width {
                let pixel = float_image.at_2d::<opencv::core::Vec3f>(row as i32, col as i32)?;
                for ch in 0..3 {
                    let idx = ch * height * width + row * width + col;
                    data[idx] = (pixel[ch] - IMAGE_NORMALIZATION_OFFSET) / IMAGE_NORMALIZATION_SCALE;
                }
            }
        }

        Array4::from_shape_vec((1, 3, height, width), data)
            .map_err(|e| Error::ModelDataFormatError(format!("Failed to build input tensor: {e}")))
    }

    /// Run inference and decode per-stride outputs into candidates
    fn forward(&self, inputs: Array4<f32>) -> Result<Vec<Candidate>> {
        let input_width = inputs.shape()[3] as i32;

        let cow_array = CowArray::from(inputs.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let mut candidates = Vec::new();

        for (idx, &stride) in self.strides.iter().enumerate() {
            let scores_output = outputs[idx].try_extract::<f32>()?;
            let scores_view = scores_output.view();
            let scores = scores_view
                .as_slice()
                .ok_or_else(|| Error::ModelOutputError("Score output is not contiguous".to_string()))?;

            let bbox_output = outputs[idx + self.offset].try_extract::<f32>()?;
            let bbox_view = bbox_output.view();
            let bboxes = bbox_view
                .as_slice()
                .ok_or_else(|| Error::ModelOutputError("Bbox output is not contiguous".to_string()))?;

            let kps_data: Option<Vec<f32>> = if self.with_kps {
                let kps_output = outputs[idx + self.offset * 2].try_extract::<f32>()?;
                let kps_view = kps_output.view();
                let kps_slice = kps_view.as_slice().ok_or_else(|| {
                    Error::ModelOutputError("Keypoint output is not contiguous".to_string())
                })?;
                Some(kps_slice.to_vec())
            } else {
                None
            };
            let kps = kps_data.as_deref();

            let grid_width = (input_width / stride) as usize;

            for (anchor, &score) in scores.iter().enumerate() {
                if score < self.conf_threshold {
                    continue;
                }

                // Anchor center for this flat index
                let cell = anchor / self.num_anchors;
                let cx = ((cell % grid_width) as i32 * stride) as f32;
                let cy = ((cell / grid_width) as i32 * stride) as f32;

                // Distances are predicted in stride units
                let d = &bboxes[anchor * 4..anchor * 4 + 4];
                let bbox = [
                    cx - d[0] * stride as f32,
                    cy - d[1] * stride as f32,
                    cx + d[2] * stride as f32,
                    cy + d[3] * stride as f32,
                ];

                let keypoints = kps.map(|kps| {
                    (0..5)
                        .map(|j| {
                            let base = anchor * 10 + j * 2;
                            (
                                cx + kps[base] * stride as f32,
                                cy + kps[base + 1] * stride as f32,
                            )
                        })
                        .collect()
                });

                candidates.push(Candidate {
                    score,
                    bbox,
                    keypoints,
                });
            }
        }

        Ok(candidates)
    }

    /// Greedy non-maximum suppression over score-sorted candidates
    fn nms(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let mut kept: Vec<Candidate> = Vec::new();
        for candidate in candidates {
            let suppressed = kept
                .iter()
                .any(|k| iou(&k.bbox, &candidate.bbox) > self.nms_threshold);
            if !suppressed {
                kept.push(candidate);
            }
        }
        kept
    }
}

/// Intersection-over-union for `[x1, y1, x2, y2]` boxes
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;

    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Clamp a rect to image bounds
fn clamp_region(region: Rect, max_width: i32, max_height: i32) -> Rect {
    let x = region.x.clamp(0, max_width);
    let y = region.y.clamp(0, max_height);
    let width = region.width.min(max_width - x);
    let height = region.height.min(max_height - y);
    Rect::new(x, y, width, height)
}

/// 7-class emotion classifier head using `ONNX` Runtime
pub struct EmotionClassifier {
    session: Session,
}

impl EmotionClassifier {
    /// Create a new emotion classifier from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!("Loading emotion classifier: {}", model_path.as_ref().display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("emotion_classifier")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        Ok(Self { session })
    }

    /// Classify the dominant emotion of a face crop
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails, or the output
    /// does not carry one score per emotion class.
    pub fn classify(&self, face: &Mat) -> Result<(Emotion, f32)> {
        let inputs = self.preprocess(face)?;

        let cow_array = CowArray::from(inputs.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let scores_output = outputs
            .first()
            .ok_or_else(|| Error::ModelOutputError("Emotion model produced no output".to_string()))?
            .try_extract::<f32>()?;
        let scores_view = scores_output.view();
        let logits = scores_view
            .as_slice()
            .ok_or_else(|| Error::ModelOutputError("Emotion output is not contiguous".to_string()))?;

        if logits.len() != NUM_EMOTION_CLASSES {
            return Err(Error::ModelOutputError(format!(
                "Expected {NUM_EMOTION_CLASSES} emotion scores, got {}",
                logits.len()
            )));
        }

        let probabilities = softmax(logits);
        let (index, confidence) = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, &p)| (i, p))
            .ok_or_else(|| Error::ModelOutputError("Empty emotion output".to_string()))?;

        let emotion = Emotion::from_index(index)
            .ok_or_else(|| Error::ModelOutputError(format!("Emotion index {index} out of range")))?;
        Ok((emotion, confidence))
    }

    /// Grayscale, resize and scale a face crop into the model tensor
    fn preprocess(&self, face: &Mat) -> Result<Array4<f32>> {
        let mut resized = Mat::default();
        imgproc::resize(
            face,
            &mut resized,
            Size::new(EMOTION_INPUT_SIZE, EMOTION_INPUT_SIZE),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut gray = Mat::default();
        imgproc::cvt_color(&resized, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

        let mut float_image = Mat::default();
        gray.convert_to(&mut float_image, CV_32F, 1.0 / 255.0, 0.0)?;

        let size = EMOTION_INPUT_SIZE as usize;
        let mut data = vec![0.0f32; size * size];
        for row in 0..size {
            for col in 0..size {
                data[row * size + col] = *float_image.at_2d::<f32>(row as i32, col as i32)?;
            }
        }

        Array4::from_shape_vec((1, 1, size, size), data)
            .map_err(|e| Error::ModelDataFormatError(format!("Failed to build input tensor: {e}")))
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

/// ONNX-backed face/emotion collaborator
pub struct OnnxEmotionAnalyzer {
    detector: FaceDetector,
    classifier: EmotionClassifier,
    enforce_detection: bool,
    align: bool,
}

impl OnnxEmotionAnalyzer {
    /// Create the analyzer from model files and detection settings
    ///
    /// # Errors
    ///
    /// Returns an error if either model cannot be loaded.
    pub fn new<P: AsRef<Path>>(
        detector_model: P,
        classifier_model: P,
        detection: &DetectionConfig,
    ) -> Result<Self> {
        let detector = FaceDetector::new(
            detector_model,
            detection.confidence_threshold,
            detection.nms_threshold,
        )?;
        let classifier = EmotionClassifier::new(classifier_model)?;

        Ok(Self {
            detector,
            classifier,
            enforce_detection: detection.enforce_detection,
            align: detection.align,
        })
    }

    /// Rotate a face crop so the eye line is horizontal.
    ///
    /// The eye keypoints come in full-frame coordinates, but only the
    /// inter-eye vector matters for the angle.
    fn align_by_eyes(face: Mat, keypoints: Option<&[Point2f]>) -> Result<Mat> {
        let Some(kps) = keypoints else {
            return Ok(face);
        };
        if kps.len() < 2 {
            return Ok(face);
        }

        let dy = f64::from(kps[1].y - kps[0].y);
        let dx = f64::from(kps[1].x - kps[0].x);
        let angle = dy.atan2(dx).to_degrees();

        let center = Point2f::new(face.cols() as f32 / 2.0, face.rows() as f32 / 2.0);
        let rotation = imgproc::get_rotation_matrix_2d(center, angle, 1.0)?;

        let mut aligned = Mat::default();
        imgproc::warp_affine(
            &face,
            &mut aligned,
            &rotation,
            face.size()?,
            InterpolationFlags::INTER_LINEAR as i32,
            BORDER_REPLICATE,
            Scalar::all(0.0),
        )?;
        Ok(aligned)
    }
}

impl EmotionAnalyzer for OnnxEmotionAnalyzer {
    fn analyze(&mut self, frame: &Mat) -> Result<Vec<FaceDetection>> {
        let raw_faces = self.detector.detect(frame)?;

        if raw_faces.is_empty() {
            if self.enforce_detection {
                return Err(Error::NoFaceDetected);
            }
            return Ok(Vec::new());
        }

        let mut detections = Vec::with_capacity(raw_faces.len());
        for face in raw_faces {
            let crop = Mat::roi(frame, face.bbox)?.try_clone()?;
            let crop = if self.align {
                Self::align_by_eyes(crop, face.keypoints.as_deref())?
            } else {
                crop
            };

            let (dominant_emotion, emotion_confidence) = self.classifier.classify(&crop)?;
            detections.push(FaceDetection {
                region: face.bbox,
                score: face.score,
                keypoints: face.keypoints,
                dominant_emotion,
                emotion_confidence,
            });
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_label_roundtrip() {
        for (index, emotion) in Emotion::ALL.iter().enumerate() {
            assert_eq!(Emotion::from_index(index), Some(*emotion));
        }
        assert_eq!(Emotion::from_index(NUM_EMOTION_CLASSES), None);
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!(
            "scrfd_500m".parse::<DetectorBackend>().unwrap(),
            DetectorBackend::Scrfd500m
        );
        assert_eq!(
            "scrfd_2.5g".parse::<DetectorBackend>().unwrap(),
            DetectorBackend::Scrfd2_5g
        );
        assert!("mtcnn".parse::<DetectorBackend>().is_err());
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_iou() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);

        let disjoint = [20.0, 20.0, 30.0, 30.0];
        assert_eq!(iou(&a, &disjoint), 0.0);

        let half = [0.0, 0.0, 10.0, 5.0];
        assert!((iou(&a, &half) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_clamp_region() {
        let clamped = clamp_region(Rect::new(-10, -10, 50, 50), 100, 100);
        assert_eq!(clamped.x, 0);
        assert_eq!(clamped.y, 0);

        let clamped = clamp_region(Rect::new(90, 90, 50, 50), 100, 100);
        assert_eq!(clamped.x + clamped.width, 100);
        assert_eq!(clamped.y + clamped.height, 100);
    }
}
