pub mod overlay_renderer;
pub mod snapshot_writer;
