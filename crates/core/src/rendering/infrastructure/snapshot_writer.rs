use std::path::Path;

use crate::shared::frame::Frame;

/// Saves a composed overlay frame to disk; the format follows the extension.
pub struct SnapshotWriter;

impl SnapshotWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if frame.channels() != 3 {
            return Err(format!("Snapshot needs RGB frames, got {} channels", frame.channels()).into());
        }

        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("Failed to create image from frame data")?;
        img.save(path)?;
        log::info!(
            "Wrote {}x{} snapshot to {}",
            frame.width(),
            frame.height(),
            path.display()
        );
        Ok(())
    }
}

impl Default for SnapshotWriter {
    fn default() -> Self {
        Self::new()
    }
}
