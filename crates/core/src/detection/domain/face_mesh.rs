use crate::detection::domain::detection::Keypoint;

/// Raw per-face record returned by a [`LandmarkEstimator`].
///
/// `mesh_polylines` are paths of keypoint indices; the renderer draws them as
/// contour lines, so they are always resolved against this face's own keypoints.
///
/// [`LandmarkEstimator`]: crate::detection::domain::landmark_estimator::LandmarkEstimator
#[derive(Clone, Debug, PartialEq)]
pub struct FaceMesh {
    pub keypoints: Vec<Keypoint>,
    pub mesh_polylines: Vec<Vec<usize>>,
    pub confidence: f64,
}

impl FaceMesh {
    /// Resolves each polyline to points, skipping indices this face doesn't have.
    pub fn contour_paths(&self) -> Vec<Vec<Keypoint>> {
        self.mesh_polylines
            .iter()
            .map(|path| {
                path.iter()
                    .filter_map(|&i| self.keypoints.get(i).copied())
                    .collect::<Vec<_>>()
            })
            .filter(|points| points.len() >= 2)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(points: usize, polylines: Vec<Vec<usize>>) -> FaceMesh {
        FaceMesh {
            keypoints: (0..points)
                .map(|i| Keypoint::new(i as f64, 0.0, 0.0))
                .collect(),
            mesh_polylines: polylines,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_contour_paths_resolve_indices() {
        let face = mesh(4, vec![vec![0, 2, 3]]);
        let paths = face.contour_paths();
        assert_eq!(paths.len(), 1);
        let xs: Vec<f64> = paths[0].iter().map(|k| k.x).collect();
        assert_eq!(xs, vec![0.0, 2.0, 3.0]);
    }

    #[test]
    fn test_contour_paths_drop_out_of_range_and_degenerate() {
        let face = mesh(3, vec![vec![0, 9], vec![1, 2, 50]]);
        let paths = face.contour_paths();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].len(), 2);
    }
}
