pub mod frame_renderer;
pub mod render_plan;
