//! Body pose landmark extraction.
//!
//! The pose collaborator wraps a BlazePose-style full-body network: one
//! person per frame, 33 landmarks with x/y/z plus visibility and presence
//! scores. A presence gate turns a low-confidence reading into "no pose
//! detected", so the pipeline only ever sees complete landmark sets.

use crate::constants::{NUM_POSE_LANDMARKS, POSE_INPUT_SIZE, POSE_PRESENCE_THRESHOLD};
use crate::error::Error;
use crate::landmarks::{Landmark, LandmarkSet};
use crate::Result;
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Size, CV_32F};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Values per landmark in the network output (x, y, z, visibility, presence)
const VALUES_PER_LANDMARK: usize = 5;

/// Pose collaborator interface used by the pipeline
pub trait PoseExtractor {
    /// Extract the landmark set for one frame.
    ///
    /// `Ok(None)` means no pose was detected this frame, a routine outcome.
    /// Sets are complete or absent, never partial.
    fn extract(&mut self, frame: &Mat) -> Result<Option<LandmarkSet>>;
}

/// BlazePose-style landmark extractor using `ONNX` Runtime
pub struct OnnxPoseExtractor {
    session: Session,
    input_size: i32,
    presence_threshold: f32,
}

impl OnnxPoseExtractor {
    /// Create a new pose extractor from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!("Loading pose model: {}", model_path.as_ref().display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("pose_extractor")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        Ok(Self {
            session,
            input_size: POSE_INPUT_SIZE,
            presence_threshold: POSE_PRESENCE_THRESHOLD,
        })
    }

    /// Resize and scale a BGR frame into the model tensor
    fn preprocess(&self, frame: &Mat) -> Result<Array4<f32>> {
        let mut resized = Mat::default();
        imgproc::resize(
            frame,
            &mut resized,
            Size::new(self.input_size, self.input_size),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut rgb_image = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb_image, imgproc::COLOR_BGR2RGB, 0)?;

        let mut float_image = Mat::default();
        rgb_image.convert_to(&mut float_image, CV_32F, 1.0 / 255.0, 0.0)?;

        let size = self.input_size as usize;
        let mut data = vec![0.0f32; size * size * 3];
        for row in 0..size {
            for col in 0..size {
                let pixel = float_image.at_2d::<opencv::core::Vec3f>(row as i32, col as i32)?;
                for ch in 0..3 {
                    data[(row * size + col) * 3 + ch] = pixel[ch];
                }
            }
        }

        // The network takes NHWC input
        Array4::from_shape_vec((1, size, size, 3), data)
            .map_err(|e| Error::ModelDataFormatError(format!("Failed to build input tensor: {e}")))
    }

    /// Decode the raw landmark tensor into a normalized set
    fn postprocess(&self, values: &[f32]) -> Result<LandmarkSet> {
        let expected = NUM_POSE_LANDMARKS * VALUES_PER_LANDMARK;
        if values.len() < expected {
            return Err(Error::ModelOutputError(format!(
                "Expected {expected} landmark values, got {}",
                values.len()
            )));
        }

        // Coordinates come in input-pixel units; normalize to [0, 1]
        let scale = self.input_size as f32;
        let mut points = [Landmark::default(); NUM_POSE_LANDMARKS];
        for (index, point) in points.iter_mut().enumerate() {
            let base = index * VALUES_PER_LANDMARK;
            *point = Landmark::new(values[base] / scale, values[base + 1] / scale, values[base + 2] / scale);
        }

        Ok(LandmarkSet::new(points))
    }
}

impl PoseExtractor for OnnxPoseExtractor {
    fn extract(&mut self, frame: &Mat) -> Result<Option<LandmarkSet>> {
        let inputs = self.preprocess(frame)?;

        let cow_array = CowArray::from(inputs.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        if outputs.len() < 2 {
            return Err(Error::ModelOutputError(format!(
                "Pose model produced {} outputs, expected landmarks and presence",
                outputs.len()
            )));
        }

        // Presence gate: below threshold the whole set is discarded
        let presence_output = outputs[1].try_extract::<f32>()?;
        let presence_view = presence_output.view();
        let presence = presence_view
            .iter()
            .next()
            .copied()
            .ok_or_else(|| Error::ModelOutputError("Empty presence output".to_string()))?;
        if presence < self.presence_threshold {
            log::debug!("No pose this frame (presence {presence:.3})");
            return Ok(None);
        }

        let landmarks_output = outputs[0].try_extract::<f32>()?;
        let landmarks_view = landmarks_output.view();
        let values = landmarks_view
            .as_slice()
            .ok_or_else(|| Error::ModelOutputError("Landmark output is not contiguous".to_string()))?;

        self.postprocess(values).map(Some)
    }
}
