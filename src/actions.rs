//! Pose action classification from landmark geometry.
//!
//! Each frame's landmark set is reduced to a fixed vocabulary of boolean
//! actions. The rules are per-frame geometric checks on named landmarks;
//! actions are independent and may co-occur.

use crate::constants::JUMP_ANKLE_Y_THRESHOLD;
use crate::landmarks::LandmarkSet;
use std::fmt;

/// Fixed vocabulary of detectable pose actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    ArmUp,
    LegUp,
    BothArmsUp,
    Squat,
    Jump,
    HeadTiltLeft,
    HeadTiltRight,
}

impl Action {
    /// All actions in reporting order
    pub const ALL: [Action; 7] = [
        Action::ArmUp,
        Action::LegUp,
        Action::BothArmsUp,
        Action::Squat,
        Action::Jump,
        Action::HeadTiltLeft,
        Action::HeadTiltRight,
    ];

    /// Stable snake_case label used in annotations and the summary report
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Action::ArmUp => "arm_up",
            Action::LegUp => "leg_up",
            Action::BothArmsUp => "both_arms_up",
            Action::Squat => "squat",
            Action::Jump => "jump",
            Action::HeadTiltLeft => "head_tilt_left",
            Action::HeadTiltRight => "head_tilt_right",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The boolean action flags derived from one frame's landmarks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionSet {
    pub arm_up: bool,
    pub leg_up: bool,
    pub both_arms_up: bool,
    pub squat: bool,
    pub jump: bool,
    pub head_tilt_left: bool,
    pub head_tilt_right: bool,
}

impl ActionSet {
    /// Whether a given action is flagged
    #[must_use]
    pub fn is_set(&self, action: Action) -> bool {
        match action {
            Action::ArmUp => self.arm_up,
            Action::LegUp => self.leg_up,
            Action::BothArmsUp => self.both_arms_up,
            Action::Squat => self.squat,
            Action::Jump => self.jump,
            Action::HeadTiltLeft => self.head_tilt_left,
            Action::HeadTiltRight => self.head_tilt_right,
        }
    }

    /// Actions currently flagged, in reporting order
    pub fn active(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL.into_iter().filter(|a| self.is_set(*a))
    }

    /// Comma-joined labels of the flagged actions
    #[must_use]
    pub fn active_labels(&self) -> String {
        self.active().map(Action::label).collect::<Vec<_>>().join(", ")
    }

    /// Whether any action is flagged
    #[must_use]
    pub fn any(&self) -> bool {
        Action::ALL.iter().any(|a| self.is_set(*a))
    }
}

/// Classify the pose actions for one frame.
///
/// Absent landmarks yield the all-false default. Smaller y is higher in
/// frame (image-coordinate convention), so "above" comparisons use `<`.
#[must_use]
pub fn classify(landmarks: Option<&LandmarkSet>) -> ActionSet {
    let mut actions = ActionSet::default();

    let Some(lm) = landmarks else {
        return actions;
    };

    // Either wrist above its same-side shoulder raises the arm flag
    let left_arm_up = lm.left_wrist().y < lm.left_shoulder().y;
    let right_arm_up = lm.right_wrist().y < lm.right_shoulder().y;
    actions.arm_up = left_arm_up || right_arm_up;
    actions.both_arms_up = left_arm_up && right_arm_up;

    actions.leg_up = lm.left_ankle().y < lm.left_hip().y || lm.right_ankle().y < lm.right_hip().y;

    // Crude proxy: both hips lower on screen than the corresponding knees.
    // Known to misfire on partial occlusion.
    actions.squat = lm.left_hip().y > lm.left_knee().y && lm.right_hip().y > lm.right_knee().y;

    // Absolute-position heuristic, not velocity-based: a person standing
    // near the top of frame also triggers this.
    actions.jump =
        lm.left_ankle().y < JUMP_ANKLE_Y_THRESHOLD && lm.right_ankle().y < JUMP_ANKLE_Y_THRESHOLD;

    actions.head_tilt_left = lm.nose().x < lm.left_ear().x;
    actions.head_tilt_right = lm.nose().x > lm.right_ear().x;

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{
        Landmark, LEFT_ANKLE, LEFT_EAR, LEFT_HIP, LEFT_KNEE, LEFT_SHOULDER, LEFT_WRIST, NOSE,
        RIGHT_ANKLE, RIGHT_EAR, RIGHT_HIP, RIGHT_KNEE, RIGHT_SHOULDER, RIGHT_WRIST,
    };
    use crate::constants::NUM_POSE_LANDMARKS;

    /// A standing pose that triggers no actions
    fn neutral_pose() -> LandmarkSet {
        let mut points = [Landmark::default(); NUM_POSE_LANDMARKS];
        points[NOSE] = Landmark::new(0.5, 0.1, 0.0);
        points[LEFT_EAR] = Landmark::new(0.45, 0.1, 0.0);
        points[RIGHT_EAR] = Landmark::new(0.55, 0.1, 0.0);
        points[LEFT_SHOULDER] = Landmark::new(0.45, 0.3, 0.0);
        points[RIGHT_SHOULDER] = Landmark::new(0.55, 0.3, 0.0);
        points[LEFT_WRIST] = Landmark::new(0.4, 0.5, 0.0);
        points[RIGHT_WRIST] = Landmark::new(0.6, 0.5, 0.0);
        points[LEFT_HIP] = Landmark::new(0.47, 0.55, 0.0);
        points[RIGHT_HIP] = Landmark::new(0.53, 0.55, 0.0);
        points[LEFT_KNEE] = Landmark::new(0.47, 0.7, 0.0);
        points[RIGHT_KNEE] = Landmark::new(0.53, 0.7, 0.0);
        points[LEFT_ANKLE] = Landmark::new(0.47, 0.9, 0.0);
        points[RIGHT_ANKLE] = Landmark::new(0.53, 0.9, 0.0);
        LandmarkSet::new(points)
    }

    fn with_point(set: LandmarkSet, index: usize, point: Landmark) -> LandmarkSet {
        let mut points: [Landmark; NUM_POSE_LANDMARKS] =
            set.points().try_into().expect("complete set");
        points[index] = point;
        LandmarkSet::new(points)
    }

    #[test]
    fn test_absent_landmarks_yield_all_false() {
        let actions = classify(None);
        assert_eq!(actions, ActionSet::default());
        assert!(!actions.any());
    }

    #[test]
    fn test_neutral_pose_triggers_nothing() {
        let actions = classify(Some(&neutral_pose()));
        assert!(!actions.any(), "unexpected actions: {}", actions.active_labels());
    }

    #[test]
    fn test_single_arm_up_either_side() {
        let left = with_point(neutral_pose(), LEFT_WRIST, Landmark::new(0.4, 0.1, 0.0));
        let actions = classify(Some(&left));
        assert!(actions.arm_up);
        assert!(!actions.both_arms_up);

        let right = with_point(neutral_pose(), RIGHT_WRIST, Landmark::new(0.6, 0.1, 0.0));
        let actions = classify(Some(&right));
        assert!(actions.arm_up);
        assert!(!actions.both_arms_up);
    }

    #[test]
    fn test_both_arms_up_implies_arm_up() {
        let mut pose = with_point(neutral_pose(), LEFT_WRIST, Landmark::new(0.4, 0.1, 0.0));
        pose = with_point(pose, RIGHT_WRIST, Landmark::new(0.6, 0.1, 0.0));

        let actions = classify(Some(&pose));
        assert!(actions.both_arms_up);
        assert!(actions.arm_up, "both_arms_up must imply arm_up");
    }

    #[test]
    fn test_leg_up() {
        let pose = with_point(neutral_pose(), RIGHT_ANKLE, Landmark::new(0.53, 0.5, 0.0));
        let actions = classify(Some(&pose));
        assert!(actions.leg_up);
    }

    #[test]
    fn test_squat_requires_both_sides() {
        let one_side = with_point(neutral_pose(), LEFT_HIP, Landmark::new(0.47, 0.75, 0.0));
        assert!(!classify(Some(&one_side)).squat);

        let both = with_point(one_side, RIGHT_HIP, Landmark::new(0.53, 0.75, 0.0));
        assert!(classify(Some(&both)).squat);
    }

    #[test]
    fn test_jump_requires_both_ankles_high() {
        let one = with_point(neutral_pose(), LEFT_ANKLE, Landmark::new(0.47, 0.4, 0.0));
        assert!(!classify(Some(&one)).jump);

        // Raising the second ankle above a hip also raises leg_up, which is
        // fine: actions are independent and may co-occur.
        let both = with_point(one, RIGHT_ANKLE, Landmark::new(0.53, 0.4, 0.0));
        let actions = classify(Some(&both));
        assert!(actions.jump);
        assert!(actions.leg_up);
    }

    #[test]
    fn test_head_tilts() {
        let left = with_point(neutral_pose(), NOSE, Landmark::new(0.4, 0.1, 0.0));
        let actions = classify(Some(&left));
        assert!(actions.head_tilt_left);
        assert!(!actions.head_tilt_right);

        let right = with_point(neutral_pose(), NOSE, Landmark::new(0.6, 0.1, 0.0));
        let actions = classify(Some(&right));
        assert!(actions.head_tilt_right);
        assert!(!actions.head_tilt_left);
    }

    #[test]
    fn test_active_labels_reporting_order() {
        let mut pose = with_point(neutral_pose(), LEFT_WRIST, Landmark::new(0.4, 0.1, 0.0));
        pose = with_point(pose, RIGHT_WRIST, Landmark::new(0.6, 0.1, 0.0));

        let actions = classify(Some(&pose));
        assert_eq!(actions.active_labels(), "arm_up, both_arms_up");
    }
}
