use crate::rendering::domain::render_plan::RenderPlan;
use crate::shared::frame::Frame;

/// Presents one tick's drawing over its frame.
///
/// Each call replaces the previous drawing entirely; nothing carries over
/// between ticks.
pub trait FrameRenderer: Send {
    fn render(&mut self, frame: &Frame, plan: &RenderPlan) -> Result<(), Box<dyn std::error::Error>>;
}

/// Discards every plan. For headless runs and tests.
pub struct NullRenderer;

impl FrameRenderer for NullRenderer {
    fn render(&mut self, _frame: &Frame, _plan: &RenderPlan) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
