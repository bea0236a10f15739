//! Per-tick drawing decisions: which markers, in which colors, and whether the
//! contour lines are affordable at the measured frame rate.

use crate::detection::domain::face_mesh::FaceMesh;
use crate::history::domain::keypoint_index::KeypointIndex;
use crate::shared::constants::CONTOUR_FPS_THRESHOLD;

pub type Rgb = [u8; 3];

pub const POINT_COLOR: Rgb = [32, 220, 96];
pub const HIGHLIGHT_COLOR: Rgb = [255, 48, 48];
pub const CONTOUR_COLOR: Rgb = [230, 230, 230];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointMarker {
    pub x: f64,
    pub y: f64,
    pub color: Rgb,
}

/// Everything the renderer draws for one tick.
///
/// Points are always present for a detected face. Contours are only filled in
/// when the loop is running fast enough; below the threshold the per-vertex
/// line work is shed so a slow loop doesn't get slower.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderPlan {
    pub points: Vec<PointMarker>,
    pub contours: Vec<Vec<(f64, f64)>>,
}

impl RenderPlan {
    /// Clear-only plan for ticks without a face.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds markers and, if `fps` allows, contours from the same face record.
    pub fn build(face: Option<&FaceMesh>, fps: u32, selected: Option<KeypointIndex>) -> Self {
        let Some(face) = face else {
            return Self::empty();
        };

        let highlighted = selected.map(KeypointIndex::get);
        let points = face
            .keypoints
            .iter()
            .enumerate()
            .map(|(i, kp)| PointMarker {
                x: kp.x,
                y: kp.y,
                color: if highlighted == Some(i) {
                    HIGHLIGHT_COLOR
                } else {
                    POINT_COLOR
                },
            })
            .collect();

        let contours = if draws_contours(fps) {
            face.contour_paths()
                .into_iter()
                .map(|path| path.into_iter().map(|kp| (kp.x, kp.y)).collect())
                .collect()
        } else {
            Vec::new()
        };

        Self { points, contours }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.contours.is_empty()
    }
}

/// Contour lines are drawn only while the measured rate is above the threshold.
pub fn draws_contours(fps: u32) -> bool {
    fps > CONTOUR_FPS_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::test_keypoints;
    use crate::detection::domain::face_contours;
    use rstest::rstest;

    fn face() -> FaceMesh {
        FaceMesh {
            keypoints: test_keypoints(0.0),
            mesh_polylines: face_contours::polylines(),
            confidence: 0.95,
        }
    }

    #[rstest]
    #[case(0, false)]
    #[case(15, false)]
    #[case(16, true)]
    #[case(60, true)]
    fn test_contour_threshold(#[case] fps: u32, #[case] expected: bool) {
        assert_eq!(draws_contours(fps), expected);
    }

    #[test]
    fn test_no_face_yields_empty_plan() {
        let plan = RenderPlan::build(None, 60, None);
        assert!(plan.is_empty());
    }

    #[rstest]
    #[case(15)]
    #[case(16)]
    fn test_points_drawn_at_any_rate(#[case] fps: u32) {
        let plan = RenderPlan::build(Some(&face()), fps, None);
        assert_eq!(plan.points.len(), 468);
        assert!(plan.points.iter().all(|p| p.color == POINT_COLOR));
    }

    #[test]
    fn test_contours_shed_at_threshold() {
        let plan = RenderPlan::build(Some(&face()), 15, None);
        assert!(plan.contours.is_empty());
    }

    #[test]
    fn test_contours_follow_same_face_record() {
        let face = face();
        let plan = RenderPlan::build(Some(&face), 16, None);

        assert_eq!(plan.contours.len(), face_contours::ALL.len());
        let first_index = face_contours::FACE_OVAL[0];
        let expected = (face.keypoints[first_index].x, face.keypoints[first_index].y);
        assert_eq!(plan.contours[0][0], expected);
    }

    #[test]
    fn test_selected_keypoint_is_highlighted_alone() {
        let selected = KeypointIndex::new(33usize);
        let plan = RenderPlan::build(Some(&face()), 30, selected);

        let highlighted: Vec<usize> = plan
            .points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.color == HIGHLIGHT_COLOR)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(highlighted, vec![33]);
        assert_ne!(HIGHLIGHT_COLOR, POINT_COLOR);
    }
}
