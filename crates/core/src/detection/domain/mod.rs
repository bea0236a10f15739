pub mod detection;
pub mod face_contours;
pub mod face_mesh;
pub mod landmark_estimator;
