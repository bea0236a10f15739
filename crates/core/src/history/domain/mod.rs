pub mod history_store;
pub mod keypoint_index;
