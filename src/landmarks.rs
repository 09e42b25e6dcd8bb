//! Body pose landmark types and skeleton topology.
//!
//! Landmarks follow the 33-point full-body convention: normalized image
//! coordinates with y increasing downward and z as relative depth.

use crate::constants::NUM_POSE_LANDMARKS;

/// Nose landmark index
pub const NOSE: usize = 0;
/// Left ear landmark index
pub const LEFT_EAR: usize = 7;
/// Right ear landmark index
pub const RIGHT_EAR: usize = 8;
/// Left shoulder landmark index
pub const LEFT_SHOULDER: usize = 11;
/// Right shoulder landmark index
pub const RIGHT_SHOULDER: usize = 12;
/// Left wrist landmark index
pub const LEFT_WRIST: usize = 15;
/// Right wrist landmark index
pub const RIGHT_WRIST: usize = 16;
/// Left hip landmark index
pub const LEFT_HIP: usize = 23;
/// Right hip landmark index
pub const RIGHT_HIP: usize = 24;
/// Left knee landmark index
pub const LEFT_KNEE: usize = 25;
/// Right knee landmark index
pub const RIGHT_KNEE: usize = 26;
/// Left ankle landmark index
pub const LEFT_ANKLE: usize = 27;
/// Right ankle landmark index
pub const RIGHT_ANKLE: usize = 28;

/// Skeleton connection graph over landmark indices, drawn by the annotator
pub const POSE_CONNECTIONS: [(usize, usize); 35] = [
    // Face
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 7),
    (0, 4),
    (4, 5),
    (5, 6),
    (6, 8),
    (9, 10),
    // Arms
    (11, 13),
    (13, 15),
    (15, 17),
    (15, 19),
    (15, 21),
    (17, 19),
    (12, 14),
    (14, 16),
    (16, 18),
    (16, 20),
    (16, 22),
    (18, 20),
    // Torso
    (11, 12),
    (11, 23),
    (12, 24),
    (23, 24),
    // Legs
    (23, 25),
    (24, 26),
    (25, 27),
    (26, 28),
    (27, 29),
    (28, 30),
    (29, 31),
    (30, 32),
    (27, 31),
    (28, 32),
];

/// A single tracked skeletal keypoint in normalized 3D coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    /// Horizontal position, typically in `[0, 1]`
    pub x: f32,
    /// Vertical position, typically in `[0, 1]`; smaller is higher in frame
    pub y: f32,
    /// Relative depth, unbounded sign
    pub z: f32,
}

impl Landmark {
    /// Create a new landmark
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another landmark in 3D
    #[must_use]
    pub fn distance_to(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// The full fixed-size landmark collection for one detected person in one
/// frame. A set is always complete: the pose collaborator yields
/// `Option<LandmarkSet>`, never a partial set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkSet {
    points: [Landmark; NUM_POSE_LANDMARKS],
}

impl LandmarkSet {
    /// Create a set from a complete point array
    #[must_use]
    pub fn new(points: [Landmark; NUM_POSE_LANDMARKS]) -> Self {
        Self { points }
    }

    /// Create a set from a slice, or `None` if the slice is not exactly
    /// [`NUM_POSE_LANDMARKS`] long
    #[must_use]
    pub fn from_slice(points: &[Landmark]) -> Option<Self> {
        let points: [Landmark; NUM_POSE_LANDMARKS] = points.try_into().ok()?;
        Some(Self { points })
    }

    /// All points in index order
    #[must_use]
    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// Point at a fixed landmark index
    #[must_use]
    pub fn point(&self, index: usize) -> &Landmark {
        &self.points[index]
    }

    #[must_use]
    pub fn nose(&self) -> &Landmark {
        &self.points[NOSE]
    }

    #[must_use]
    pub fn left_ear(&self) -> &Landmark {
        &self.points[LEFT_EAR]
    }

    #[must_use]
    pub fn right_ear(&self) -> &Landmark {
        &self.points[RIGHT_EAR]
    }

    #[must_use]
    pub fn left_shoulder(&self) -> &Landmark {
        &self.points[LEFT_SHOULDER]
    }

    #[must_use]
    pub fn right_shoulder(&self) -> &Landmark {
        &self.points[RIGHT_SHOULDER]
    }

    #[must_use]
    pub fn left_wrist(&self) -> &Landmark {
        &self.points[LEFT_WRIST]
    }

    #[must_use]
    pub fn right_wrist(&self) -> &Landmark {
        &self.points[RIGHT_WRIST]
    }

    #[must_use]
    pub fn left_hip(&self) -> &Landmark {
        &self.points[LEFT_HIP]
    }

    #[must_use]
    pub fn right_hip(&self) -> &Landmark {
        &self.points[RIGHT_HIP]
    }

    #[must_use]
    pub fn left_knee(&self) -> &Landmark {
        &self.points[LEFT_KNEE]
    }

    #[must_use]
    pub fn right_knee(&self) -> &Landmark {
        &self.points[RIGHT_KNEE]
    }

    #[must_use]
    pub fn left_ankle(&self) -> &Landmark {
        &self.points[LEFT_ANKLE]
    }

    #[must_use]
    pub fn right_ankle(&self) -> &Landmark {
        &self.points[RIGHT_ANKLE]
    }
}
