//! Pose analysis result: body landmarks with in-frame likelihoods.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The 33 body landmarks reported by the pose model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkKind {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    LeftMouth,
    RightMouth,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl LandmarkKind {
    pub const ALL: [LandmarkKind; 33] = [
        LandmarkKind::Nose,
        LandmarkKind::LeftEyeInner,
        LandmarkKind::LeftEye,
        LandmarkKind::LeftEyeOuter,
        LandmarkKind::RightEyeInner,
        LandmarkKind::RightEye,
        LandmarkKind::RightEyeOuter,
        LandmarkKind::LeftEar,
        LandmarkKind::RightEar,
        LandmarkKind::LeftMouth,
        LandmarkKind::RightMouth,
        LandmarkKind::LeftShoulder,
        LandmarkKind::RightShoulder,
        LandmarkKind::LeftElbow,
        LandmarkKind::RightElbow,
        LandmarkKind::LeftWrist,
        LandmarkKind::RightWrist,
        LandmarkKind::LeftPinky,
        LandmarkKind::RightPinky,
        LandmarkKind::LeftIndex,
        LandmarkKind::RightIndex,
        LandmarkKind::LeftThumb,
        LandmarkKind::RightThumb,
        LandmarkKind::LeftHip,
        LandmarkKind::RightHip,
        LandmarkKind::LeftKnee,
        LandmarkKind::RightKnee,
        LandmarkKind::LeftAnkle,
        LandmarkKind::RightAnkle,
        LandmarkKind::LeftHeel,
        LandmarkKind::RightHeel,
        LandmarkKind::LeftFootIndex,
        LandmarkKind::RightFootIndex,
    ];

    /// Model output index of this landmark.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Parses the snake_case name used in config files and CLI flags.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            LandmarkKind::Nose => "nose",
            LandmarkKind::LeftEyeInner => "left_eye_inner",
            LandmarkKind::LeftEye => "left_eye",
            LandmarkKind::LeftEyeOuter => "left_eye_outer",
            LandmarkKind::RightEyeInner => "right_eye_inner",
            LandmarkKind::RightEye => "right_eye",
            LandmarkKind::RightEyeOuter => "right_eye_outer",
            LandmarkKind::LeftEar => "left_ear",
            LandmarkKind::RightEar => "right_ear",
            LandmarkKind::LeftMouth => "left_mouth",
            LandmarkKind::RightMouth => "right_mouth",
            LandmarkKind::LeftShoulder => "left_shoulder",
            LandmarkKind::RightShoulder => "right_shoulder",
            LandmarkKind::LeftElbow => "left_elbow",
            LandmarkKind::RightElbow => "right_elbow",
            LandmarkKind::LeftWrist => "left_wrist",
            LandmarkKind::RightWrist => "right_wrist",
            LandmarkKind::LeftPinky => "left_pinky",
            LandmarkKind::RightPinky => "right_pinky",
            LandmarkKind::LeftIndex => "left_index",
            LandmarkKind::RightIndex => "right_index",
            LandmarkKind::LeftThumb => "left_thumb",
            LandmarkKind::RightThumb => "right_thumb",
            LandmarkKind::LeftHip => "left_hip",
            LandmarkKind::RightHip => "right_hip",
            LandmarkKind::LeftKnee => "left_knee",
            LandmarkKind::RightKnee => "right_knee",
            LandmarkKind::LeftAnkle => "left_ankle",
            LandmarkKind::RightAnkle => "right_ankle",
            LandmarkKind::LeftHeel => "left_heel",
            LandmarkKind::RightHeel => "right_heel",
            LandmarkKind::LeftFootIndex => "left_foot_index",
            LandmarkKind::RightFootIndex => "right_foot_index",
        }
    }
}

impl fmt::Display for LandmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Image-space position; `z` is depth relative to the hips (0 when unknown).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseLandmark {
    pub kind: LandmarkKind,
    pub position: Point3,
    /// Probability in [0, 1] that the landmark is inside the frame.
    pub in_frame_likelihood: f32,
}

impl PoseLandmark {
    pub fn new(kind: LandmarkKind, position: Point3, in_frame_likelihood: f32) -> Self {
        Self {
            kind,
            position,
            in_frame_likelihood: if in_frame_likelihood.is_nan() {
                0.0
            } else {
                in_frame_likelihood.clamp(0.0, 1.0)
            },
        }
    }
}

/// Landmarks detected in one frame. Empty means no subject was found.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    landmarks: Vec<PoseLandmark>,
}

impl Pose {
    pub fn new(landmarks: Vec<PoseLandmark>) -> Self {
        Self { landmarks }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn landmarks(&self) -> &[PoseLandmark] {
        &self.landmarks
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn landmark(&self, kind: LandmarkKind) -> Option<&PoseLandmark> {
        self.landmarks.iter().find(|l| l.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_all_landmarks_indexed_in_order() {
        for (i, kind) in LandmarkKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[rstest]
    #[case("nose", LandmarkKind::Nose)]
    #[case("left_shoulder", LandmarkKind::LeftShoulder)]
    #[case("right_foot_index", LandmarkKind::RightFootIndex)]
    fn test_from_name(#[case] name: &str, #[case] expected: LandmarkKind) {
        assert_eq!(LandmarkKind::from_name(name), Some(expected));
        assert_eq!(expected.to_string(), name);
    }

    #[test]
    fn test_from_name_unknown() {
        assert_eq!(LandmarkKind::from_name("tail"), None);
    }

    #[test]
    fn test_name_matches_serde() {
        for kind in LandmarkKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
        }
    }

    #[rstest]
    #[case(1.5, 1.0)]
    #[case(-0.2, 0.0)]
    #[case(0.42, 0.42)]
    #[case(f32::NAN, 0.0)]
    #[case(f32::INFINITY, 1.0)]
    fn test_likelihood_clamped(#[case] raw: f32, #[case] expected: f32) {
        let lm = PoseLandmark::new(LandmarkKind::Nose, Point3::default(), raw);
        assert_relative_eq!(lm.in_frame_likelihood, expected);
    }

    #[test]
    fn test_empty_pose() {
        let pose = Pose::empty();
        assert!(pose.is_empty());
        assert!(pose.landmark(LandmarkKind::Nose).is_none());
    }

    #[test]
    fn test_landmark_lookup() {
        let pose = Pose::new(vec![
            PoseLandmark::new(LandmarkKind::Nose, Point3::new(10.0, 20.0, 0.0), 0.9),
            PoseLandmark::new(LandmarkKind::LeftWrist, Point3::new(5.0, 50.0, 0.0), 0.3),
        ]);
        let wrist = pose.landmark(LandmarkKind::LeftWrist).unwrap();
        assert_relative_eq!(wrist.position.y, 50.0);
        assert!(pose.landmark(LandmarkKind::RightWrist).is_none());
    }
}
