use crate::detection::domain::face_mesh::FaceMesh;
use crate::shared::frame::Frame;
use crate::shared::live_config::EstimatorConfig;

/// Maps one frame to zero or more face meshes.
///
/// May be stateful across frames, hence `&mut self`. An empty result means no
/// face was found and is not an error.
pub trait LandmarkEstimator: Send {
    fn estimate(&mut self, frame: &Frame) -> Result<Vec<FaceMesh>, Box<dyn std::error::Error>>;
}

/// Builds an estimator for a given input configuration.
///
/// Loading happens once, before the frame loop starts.
pub trait EstimatorLoader {
    fn load(
        &self,
        config: &EstimatorConfig,
    ) -> Result<Box<dyn LandmarkEstimator>, Box<dyn std::error::Error + Send + Sync>>;
}

impl<F> EstimatorLoader for F
where
    F: Fn(
        &EstimatorConfig,
    ) -> Result<Box<dyn LandmarkEstimator>, Box<dyn std::error::Error + Send + Sync>>,
{
    fn load(
        &self,
        config: &EstimatorConfig,
    ) -> Result<Box<dyn LandmarkEstimator>, Box<dyn std::error::Error + Send + Sync>> {
        self(config)
    }
}
