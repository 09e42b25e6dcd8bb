//! Running aggregate statistics across one pipeline run.

use crate::actions::{Action, ActionSet};
use crate::emotion::{Emotion, FaceDetection};
use std::collections::BTreeMap;
use std::fmt;

/// Counters accumulated once per processed frame.
///
/// Owned by the pipeline controller for the duration of one run: initialized
/// empty, mutated exactly once per frame, read once at run end for the
/// summary report. No decrements, no resets mid-run.
#[derive(Debug, Clone, Default)]
pub struct RunStatistics {
    frames: u64,
    anomalies: u64,
    emotions: BTreeMap<Emotion, u64>,
    actions: BTreeMap<Action, u64>,
}

impl RunStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally one processed frame.
    ///
    /// The frame counter advances unconditionally, including frames where
    /// perception failed. A frame with N faces contributes N emotion
    /// increments; each currently-true action contributes one increment.
    pub fn record(&mut self, faces: &[FaceDetection], actions: &ActionSet, anomalous: bool) {
        self.frames += 1;

        for face in faces {
            *self.emotions.entry(face.dominant_emotion).or_insert(0) += 1;
        }

        for action in actions.active() {
            *self.actions.entry(action).or_insert(0) += 1;
        }

        if anomalous {
            self.anomalies += 1;
        }
    }

    /// Total frames consumed
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Total frames flagged as anomalous movement
    #[must_use]
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    /// Occurrences of a given emotion across all detected faces
    #[must_use]
    pub fn emotion_count(&self, emotion: Emotion) -> u64 {
        self.emotions.get(&emotion).copied().unwrap_or(0)
    }

    /// Occurrences of a given action across all frames
    #[must_use]
    pub fn action_count(&self, action: Action) -> u64 {
        self.actions.get(&action).copied().unwrap_or(0)
    }

    /// Per-emotion counts in deterministic order
    #[must_use]
    pub fn emotion_counts(&self) -> &BTreeMap<Emotion, u64> {
        &self.emotions
    }

    /// Per-action counts in deterministic order
    #[must_use]
    pub fn action_counts(&self) -> &BTreeMap<Action, u64> {
        &self.actions
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Analysis summary ===")?;
        writeln!(f, "Frames analyzed:  {}", self.frames)?;
        writeln!(f, "Anomalous frames: {}", self.anomalies)?;

        writeln!(f, "Emotions:")?;
        if self.emotions.is_empty() {
            writeln!(f, "  (none detected)")?;
        } else {
            for (emotion, count) in &self.emotions {
                writeln!(f, "  {emotion}: {count}")?;
            }
        }

        writeln!(f, "Actions:")?;
        if self.actions.is_empty() {
            writeln!(f, "  (none detected)")?;
        } else {
            for (action, count) in &self.actions {
                writeln!(f, "  {action}: {count}")?;
            }
        }

        Ok(())
    }
}
