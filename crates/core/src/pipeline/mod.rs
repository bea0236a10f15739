pub mod detection_pipeline;
pub mod frame_scheduler;
pub mod infrastructure;
pub mod live_loop;
pub mod pipeline_logger;
pub mod session_state;
