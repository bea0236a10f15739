/// 468-point face-mesh estimator using ONNX Runtime via `ort`.
///
/// Runs a single-face landmark model on the whole frame: resize to the
/// configured input resolution, normalize to [0,1] NCHW, then map the
/// predicted landmarks back into frame pixels.
use std::path::{Path, PathBuf};

use crate::detection::domain::detection::Keypoint;
use crate::detection::domain::face_contours;
use crate::detection::domain::face_mesh::FaceMesh;
use crate::detection::domain::landmark_estimator::{EstimatorLoader, LandmarkEstimator};
use crate::shared::constants::KEYPOINT_COUNT;
use crate::shared::frame::Frame;
use crate::shared::live_config::EstimatorConfig;

use super::execution_provider::preferred_execution_providers;

/// Values per landmark in the model output (x, y, z).
const VALUES_PER_KEYPOINT: usize = 3;

/// Face-mesh estimator backed by an ONNX Runtime session.
///
/// Expected model signature:
/// - input: `[1, 3, H, W]` float32 RGB in [0,1]
/// - output 0: `[1, 1404]` landmarks in input pixel units
/// - output 1 (optional): `[1, 1]` face-presence logit
pub struct OnnxFaceMeshEstimator {
    session: ort::session::Session,
    config: EstimatorConfig,
    contours: Vec<Vec<usize>>,
}

impl OnnxFaceMeshEstimator {
    pub fn new(
        model_path: &Path,
        config: EstimatorConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;
        log::info!(
            "Loaded face mesh model {} ({}x{} input)",
            model_path.display(),
            config.input_width,
            config.input_height
        );
        Ok(Self {
            session,
            config,
            contours: face_contours::polylines(),
        })
    }
}

impl LandmarkEstimator for OnnxFaceMeshEstimator {
    fn estimate(&mut self, frame: &Frame) -> Result<Vec<FaceMesh>, Box<dyn std::error::Error>> {
        let input_tensor = preprocess(frame, self.config.input_width, self.config.input_height);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        if outputs.len() < 1 {
            return Err("Face mesh model produced no outputs".into());
        }

        let landmarks: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        let score = if outputs.len() > 1 {
            let flag = outputs[1].try_extract_array::<f32>()?;
            let logit = flag.iter().next().copied().ok_or("Empty face flag output")?;
            sigmoid(logit) as f64
        } else {
            1.0
        };

        if score < self.config.min_face_confidence {
            return Ok(Vec::new());
        }

        let keypoints = decode_keypoints(&landmarks, frame.dimensions(), &self.config)?;
        Ok(vec![FaceMesh {
            keypoints,
            mesh_polylines: self.contours.clone(),
            confidence: score,
        }])
    }
}

/// Loads [`OnnxFaceMeshEstimator`] instances from a fixed model file.
pub struct OnnxFaceMeshLoader {
    model_path: PathBuf,
}

impl OnnxFaceMeshLoader {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
        }
    }
}

impl EstimatorLoader for OnnxFaceMeshLoader {
    fn load(
        &self,
        config: &EstimatorConfig,
    ) -> Result<Box<dyn LandmarkEstimator>, Box<dyn std::error::Error + Send + Sync>> {
        let estimator = OnnxFaceMeshEstimator::new(&self.model_path, config.clone())
            .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { e.to_string().into() })?;
        Ok(Box::new(estimator))
    }
}

// ---------------------------------------------------------------------------
// Pre/post-processing
// ---------------------------------------------------------------------------

/// Nearest-neighbour resize to `width × height`, normalized to [0,1] NCHW float32.
fn preprocess(frame: &Frame, width: u32, height: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let (w, h) = (width as usize, height as usize);

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, h, w));
    if src_w == 0 || src_h == 0 {
        return tensor;
    }

    for y in 0..h {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / h as f64) as usize).min(src_h - 1);
        for x in 0..w {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / w as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    tensor
}

/// Maps flat `[x, y, z, …]` landmarks from input pixels to scaled frame pixels.
///
/// `z` shares the x-axis scale so depth stays proportional to width.
fn decode_keypoints(
    raw: &[f32],
    (frame_w, frame_h): (u32, u32),
    config: &EstimatorConfig,
) -> Result<Vec<Keypoint>, Box<dyn std::error::Error>> {
    let needed = KEYPOINT_COUNT * VALUES_PER_KEYPOINT;
    if raw.len() < needed {
        return Err(format!(
            "Face mesh output has {} values, expected at least {needed}",
            raw.len()
        )
        .into());
    }

    let sx = frame_w as f64 / config.input_width as f64 * config.scale;
    let sy = frame_h as f64 / config.input_height as f64 * config.scale;

    Ok(raw[..needed]
        .chunks_exact(VALUES_PER_KEYPOINT)
        .map(|v| Keypoint::new(v[0] as f64 * sx, v[1] as f64 * sy, v[2] as f64 * sx))
        .collect())
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
