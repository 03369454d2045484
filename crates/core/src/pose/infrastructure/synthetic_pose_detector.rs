use std::time::Duration;

use crate::pose::domain::pose::{LandmarkKind, Point3, Pose, PoseLandmark};
use crate::pose::domain::pose_detector::{AnalysisError, DetectorMode, PoseDetector};
use crate::shared::constants::{SUBJECT_BRIGHTNESS_THRESHOLD, TRACKING_ALPHA};
use crate::shared::frame::{Frame, Rotation};

/// Skeleton offsets from the nose, in fractions of the upright frame height.
const SKELETON: [(LandmarkKind, f32, f32); 9] = [
    (LandmarkKind::Nose, 0.0, 0.0),
    (LandmarkKind::LeftEye, -0.03, -0.03),
    (LandmarkKind::RightEye, 0.03, -0.03),
    (LandmarkKind::LeftEar, -0.06, -0.01),
    (LandmarkKind::RightEar, 0.06, -0.01),
    (LandmarkKind::LeftShoulder, -0.15, 0.18),
    (LandmarkKind::RightShoulder, 0.15, 0.18),
    (LandmarkKind::LeftHip, -0.10, 0.55),
    (LandmarkKind::RightHip, 0.10, 0.55),
];

/// Stand-in pose model driven by image brightness.
///
/// The brightest pixel is taken as the nose and the rest of a coarse upper
/// body skeleton hangs off it. Likelihood scales with that pixel's brightness
/// and drops to zero for landmarks that fall outside the frame. Frames darker
/// than [`SUBJECT_BRIGHTNESS_THRESHOLD`] yield an empty pose.
pub struct SyntheticPoseDetector {
    mode: DetectorMode,
    latency: Duration,
    tracked_nose: Option<(f64, f64)>,
}

impl SyntheticPoseDetector {
    pub fn new(mode: DetectorMode) -> Self {
        Self {
            mode,
            latency: Duration::ZERO,
            tracked_nose: None,
        }
    }

    /// Simulates a slow model by sleeping for `latency` on every frame.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn track(&mut self, observed: (f64, f64)) -> (f64, f64) {
        if self.mode == DetectorMode::SingleImage {
            return observed;
        }
        let smoothed = match self.tracked_nose {
            Some((px, py)) => (
                px + TRACKING_ALPHA * (observed.0 - px),
                py + TRACKING_ALPHA * (observed.1 - py),
            ),
            None => observed,
        };
        self.tracked_nose = Some(smoothed);
        smoothed
    }
}

impl PoseDetector for SyntheticPoseDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Pose, AnalysisError> {
        if frame.channels() != 1 && frame.channels() != 3 {
            return Err(AnalysisError::Detector(format!(
                "unsupported channel count {}",
                frame.channels()
            )));
        }
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let Some((x, y, brightness)) = brightest_pixel(frame) else {
            self.tracked_nose = None;
            return Ok(Pose::empty());
        };
        if brightness < SUBJECT_BRIGHTNESS_THRESHOLD {
            self.tracked_nose = None;
            return Ok(Pose::empty());
        }

        let (upright_w, upright_h) = upright_size(frame);
        let (nx, ny) = upright_point(x, y, frame.width(), frame.height(), frame.rotation());
        let (nx, ny) = self.track((nx as f64, ny as f64));
        let confidence = brightness as f32 / 255.0;
        let scale = upright_h as f32;

        let landmarks = SKELETON
            .iter()
            .map(|&(kind, dx, dy)| {
                let px = nx as f32 + dx * scale;
                let py = ny as f32 + dy * scale;
                let inside = px >= 0.0 && py >= 0.0 && px < upright_w as f32 && py < scale;
                let likelihood = if inside { confidence } else { 0.0 };
                PoseLandmark::new(kind, Point3::new(px, py, 0.0), likelihood)
            })
            .collect();

        Ok(Pose::new(landmarks))
    }
}

/// Returns `(x, y, luma)` of the brightest pixel, first match on ties.
fn brightest_pixel(frame: &Frame) -> Option<(u32, u32, u8)> {
    let pixels = frame.as_ndarray();
    let mut best: Option<(u32, u32, u8)> = None;
    for ((row, col, _), _) in pixels.indexed_iter().filter(|((_, _, c), _)| *c == 0) {
        let luma = if frame.channels() == 3 {
            let r = pixels[[row, col, 0]] as u32;
            let g = pixels[[row, col, 1]] as u32;
            let b = pixels[[row, col, 2]] as u32;
            ((299 * r + 587 * g + 114 * b) / 1000) as u8
        } else {
            pixels[[row, col, 0]]
        };
        if best.map_or(true, |(_, _, l)| luma > l) {
            best = Some((col as u32, row as u32, luma));
        }
    }
    best
}

fn upright_size(frame: &Frame) -> (u32, u32) {
    match frame.rotation() {
        Rotation::Deg0 | Rotation::Deg180 => (frame.width(), frame.height()),
        Rotation::Deg90 | Rotation::Deg270 => (frame.height(), frame.width()),
    }
}

/// Maps buffer coordinates into the upright image after clockwise rotation.
fn upright_point(x: u32, y: u32, width: u32, height: u32, rotation: Rotation) -> (u32, u32) {
    match rotation {
        Rotation::Deg0 => (x, y),
        Rotation::Deg90 => (height - 1 - y, x),
        Rotation::Deg180 => (width - 1 - x, height - 1 - y),
        Rotation::Deg270 => (y, width - 1 - x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn frame_with_dot(width: u32, height: u32, dot: Option<(u32, u32, u8)>) -> Frame {
        let mut data = vec![10u8; (width * height * 3) as usize];
        if let Some((x, y, v)) = dot {
            let idx = ((y * width + x) * 3) as usize;
            data[idx..idx + 3].copy_from_slice(&[v, v, v]);
        }
        Frame::new(data, width, height, 3, 0)
    }

    #[test]
    fn test_dark_frame_yields_empty_pose() {
        let mut detector = SyntheticPoseDetector::new(DetectorMode::SingleImage);
        let pose = detector.detect(&frame_with_dot(8, 8, None)).unwrap();
        assert!(pose.is_empty());
    }

    #[test]
    fn test_bright_dot_becomes_nose() {
        let mut detector = SyntheticPoseDetector::new(DetectorMode::SingleImage);
        let pose = detector
            .detect(&frame_with_dot(100, 100, Some((40, 30, 255))))
            .unwrap();
        let nose = pose.landmark(LandmarkKind::Nose).unwrap();
        assert_relative_eq!(nose.position.x, 40.0);
        assert_relative_eq!(nose.position.y, 30.0);
        assert_relative_eq!(nose.in_frame_likelihood, 1.0);
        assert_eq!(pose.landmarks().len(), SKELETON.len());
    }

    #[test]
    fn test_landmarks_outside_frame_have_zero_likelihood() {
        let mut detector = SyntheticPoseDetector::new(DetectorMode::SingleImage);
        // Nose near the bottom edge: hips land below the frame.
        let pose = detector
            .detect(&frame_with_dot(100, 100, Some((50, 90, 200))))
            .unwrap();
        let hip = pose.landmark(LandmarkKind::LeftHip).unwrap();
        assert_relative_eq!(hip.in_frame_likelihood, 0.0);
        let nose = pose.landmark(LandmarkKind::Nose).unwrap();
        assert_relative_eq!(nose.in_frame_likelihood, 200.0 / 255.0);
    }

    #[test]
    fn test_stream_mode_smooths_position() {
        let mut detector = SyntheticPoseDetector::new(DetectorMode::Stream);
        detector
            .detect(&frame_with_dot(100, 100, Some((20, 50, 255))))
            .unwrap();
        let pose = detector
            .detect(&frame_with_dot(100, 100, Some((60, 50, 255))))
            .unwrap();
        let nose = pose.landmark(LandmarkKind::Nose).unwrap();
        assert_relative_eq!(nose.position.x, 40.0);
    }

    #[test]
    fn test_stream_mode_resets_when_subject_lost() {
        let mut detector = SyntheticPoseDetector::new(DetectorMode::Stream);
        detector
            .detect(&frame_with_dot(100, 100, Some((20, 50, 255))))
            .unwrap();
        detector.detect(&frame_with_dot(100, 100, None)).unwrap();
        let pose = detector
            .detect(&frame_with_dot(100, 100, Some((60, 50, 255))))
            .unwrap();
        assert_relative_eq!(pose.landmark(LandmarkKind::Nose).unwrap().position.x, 60.0);
    }

    #[test]
    fn test_unsupported_channels_is_error() {
        let mut detector = SyntheticPoseDetector::new(DetectorMode::Stream);
        let frame = Frame::new(vec![0u8; 8], 1, 2, 4, 0);
        assert!(matches!(
            detector.detect(&frame),
            Err(AnalysisError::Detector(_))
        ));
    }

    #[rstest]
    #[case(Rotation::Deg0, (1, 0))]
    #[case(Rotation::Deg90, (1, 1))]
    #[case(Rotation::Deg180, (2, 1))]
    #[case(Rotation::Deg270, (0, 2))]
    fn test_upright_point(#[case] rotation: Rotation, #[case] expected: (u32, u32)) {
        // 4 wide, 2 tall buffer; point (1, 0).
        assert_eq!(upright_point(1, 0, 4, 2, rotation), expected);
    }
}
