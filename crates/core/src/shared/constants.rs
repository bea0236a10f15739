pub const FACE_MESH_MODEL_NAME: &str = "face_landmark.onnx";

/// Landmarks produced per face by the mesh estimator.
pub const KEYPOINT_COUNT: usize = 468;

/// Detections retained by the history before the oldest is evicted.
pub const HISTORY_CAPACITY: usize = 10;

/// Contour lines are drawn only above this measured rate.
pub const CONTOUR_FPS_THRESHOLD: u32 = 15;

pub const FPS_SAMPLE_WINDOW_MS: f64 = 1000.0;

pub const DEFAULT_REFRESH_HZ: f64 = 60.0;
/// Accepted refresh rates, in Hz.
pub const REFRESH_HZ_RANGE: std::ops::RangeInclusive<f64> = 1.0..=1000.0;

/// Native input resolution of the 468-point face landmark model.
pub const DEFAULT_INPUT_SIZE: u32 = 192;

pub const DEFAULT_MIN_FACE_CONFIDENCE: f64 = 0.5;

pub const APP_DIR_NAME: &str = "FaceMeshLive";
