use std::sync::Arc;
use std::time::Instant;

use crate::capture::domain::capture_source::CaptureSource;
use crate::detection::domain::landmark_estimator::LandmarkEstimator;
use crate::pipeline::detection_pipeline::DetectionPipeline;
use crate::pipeline::frame_scheduler::Tick;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::session_state::SessionState;
use crate::rendering::domain::frame_renderer::FrameRenderer;
use crate::rendering::domain::render_plan::RenderPlan;

/// Per-tick work of a live session: detect, draw, record.
///
/// Owns every collaborator the tick touches. The only thing shared with the
/// host is [`SessionState`].
pub struct LiveLoop {
    capture: Box<dyn CaptureSource>,
    estimator: Box<dyn LandmarkEstimator>,
    renderer: Box<dyn FrameRenderer>,
    logger: Box<dyn PipelineLogger>,
    pipeline: DetectionPipeline,
    state: Arc<SessionState>,
}

impl LiveLoop {
    pub fn new(
        capture: Box<dyn CaptureSource>,
        estimator: Box<dyn LandmarkEstimator>,
        renderer: Box<dyn FrameRenderer>,
        logger: Box<dyn PipelineLogger>,
        state: Arc<SessionState>,
    ) -> Self {
        Self {
            capture,
            estimator,
            renderer,
            logger,
            pipeline: DetectionPipeline::new(),
            state,
        }
    }

    pub fn with_pipeline(mut self, pipeline: DetectionPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Applies one tick.
    ///
    /// Nothing is drawn while the source has no new frame. The detection is
    /// recorded even if rendering fails; the render error is then returned so
    /// the scheduler can log it.
    pub fn on_tick(&mut self, tick: &Tick) -> Result<(), Box<dyn std::error::Error>> {
        if tick.fps_updated {
            self.state.publish_fps(tick.fps);
            self.logger.fps_sample(tick.fps);
        }

        let Some(processed) = self.pipeline.process_frame(
            self.capture.as_mut(),
            self.estimator.as_mut(),
            self.logger.as_mut(),
        ) else {
            return Ok(());
        };

        let plan = RenderPlan::build(
            processed.face.as_ref(),
            tick.fps,
            self.state.selected_keypoint(),
        );

        let t0 = Instant::now();
        let rendered = self.renderer.render(&processed.frame, &plan);
        self.logger.timing("render", t0.elapsed().as_secs_f64() * 1000.0);

        self.state.append_detection(processed.detection);
        rendered
    }

    /// Emits the logger summary. Call once the scheduler has stopped.
    pub fn finish(&mut self) {
        self.logger.info(&format!(
            "Live loop finished ({} estimator failures)",
            self.pipeline.estimation_failures()
        ));
        self.logger.summary();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::pipeline::detection_pipeline::test_support::{FakeCapture, Scripted, ScriptedEstimator};
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::rendering::domain::render_plan::HIGHLIGHT_COLOR;
    use crate::history::domain::keypoint_index::KeypointIndex;
    use crate::shared::frame::Frame;

    /// Keeps every plan it was asked to draw.
    struct RecordingRenderer {
        plans: Arc<Mutex<Vec<RenderPlan>>>,
        fail: bool,
    }

    impl FrameRenderer for RecordingRenderer {
        fn render(&mut self, _frame: &Frame, plan: &RenderPlan) -> Result<(), Box<dyn std::error::Error>> {
            self.plans.lock().unwrap().push(plan.clone());
            if self.fail {
                return Err("display gone".into());
            }
            Ok(())
        }
    }

    struct Harness {
        live: LiveLoop,
        state: Arc<SessionState>,
        plans: Arc<Mutex<Vec<RenderPlan>>>,
    }

    fn harness(capture: FakeCapture, estimator: ScriptedEstimator, fail_render: bool) -> Harness {
        let state = Arc::new(SessionState::default());
        state.set_recording(true);
        let plans = Arc::new(Mutex::new(Vec::new()));
        let renderer = RecordingRenderer {
            plans: plans.clone(),
            fail: fail_render,
        };
        let live = LiveLoop::new(
            Box::new(capture),
            Box::new(estimator),
            Box::new(renderer),
            Box::new(NullPipelineLogger),
            state.clone(),
        )
        .with_pipeline(DetectionPipeline::new().with_timestamp_source(|| 42));
        Harness { live, state, plans }
    }

    fn tick(index: u64, fps: u32, fps_updated: bool) -> Tick {
        Tick {
            index,
            time_ms: index as f64 * 16.0,
            delta_ms: 16.0,
            fps,
            fps_updated,
        }
    }

    #[test]
    fn test_tick_renders_and_records() {
        let mut h = harness(FakeCapture::ready(), ScriptedEstimator::always_one_face(), false);

        h.live.on_tick(&tick(0, 30, false)).unwrap();

        assert_eq!(h.state.history_len(), 1);
        let plans = h.plans.lock().unwrap();
        assert_eq!(plans[0].points.len(), 468);
        assert!(!plans[0].contours.is_empty());
    }

    #[test]
    fn test_no_face_clears_overlay_and_skips_history() {
        let mut h = harness(
            FakeCapture::ready(),
            ScriptedEstimator::new([Scripted::Faces(0)]),
            false,
        );

        h.live.on_tick(&tick(0, 30, false)).unwrap();
        h.live.on_tick(&tick(1, 30, false)).unwrap();

        let plans = h.plans.lock().unwrap();
        assert!(plans[0].is_empty());
        assert!(!plans[1].is_empty());
        assert_eq!(h.state.history_len(), 1);
    }

    #[test]
    fn test_estimator_failure_leaves_history_unchanged() {
        let mut h = harness(
            FakeCapture::ready(),
            ScriptedEstimator::new([Scripted::Faces(1), Scripted::Fail]),
            false,
        );

        h.live.on_tick(&tick(0, 30, false)).unwrap();
        let before = h.state.history_entries();
        h.live.on_tick(&tick(1, 30, false)).unwrap();

        assert_eq!(h.state.history_entries(), before);
    }

    #[test]
    fn test_malformed_face_is_neither_drawn_nor_recorded() {
        let mut h = harness(
            FakeCapture::ready(),
            ScriptedEstimator::new([Scripted::WrongKeypointCount]),
            false,
        );

        h.live.on_tick(&tick(0, 30, false)).unwrap();

        let plans = h.plans.lock().unwrap();
        assert!(plans[0].is_empty());
        assert_eq!(h.state.history_len(), 0);
    }

    #[test]
    fn test_not_ready_source_skips_tick() {
        let mut capture = FakeCapture::ready();
        capture.ready = false;
        let mut h = harness(capture, ScriptedEstimator::always_one_face(), false);

        h.live.on_tick(&tick(0, 30, false)).unwrap();

        assert!(h.plans.lock().unwrap().is_empty());
        assert_eq!(h.state.history_len(), 0);
    }

    #[test]
    fn test_low_fps_sheds_contours() {
        let mut h = harness(FakeCapture::ready(), ScriptedEstimator::always_one_face(), false);

        h.live.on_tick(&tick(0, 15, false)).unwrap();

        let plans = h.plans.lock().unwrap();
        assert_eq!(plans[0].points.len(), 468);
        assert!(plans[0].contours.is_empty());
    }

    #[test]
    fn test_fps_sample_is_published() {
        let mut h = harness(FakeCapture::ready(), ScriptedEstimator::always_one_face(), false);

        h.live.on_tick(&tick(0, 0, false)).unwrap();
        assert_eq!(h.state.current_fps(), 0);
        h.live.on_tick(&tick(1, 57, true)).unwrap();
        assert_eq!(h.state.current_fps(), 57);
    }

    #[test]
    fn test_selected_keypoint_is_highlighted() {
        let mut h = harness(FakeCapture::ready(), ScriptedEstimator::always_one_face(), false);
        h.state.set_selected_keypoint(KeypointIndex::new(10usize));

        h.live.on_tick(&tick(0, 30, false)).unwrap();

        let plans = h.plans.lock().unwrap();
        assert_eq!(plans[0].points[10].color, HIGHLIGHT_COLOR);
        assert_ne!(plans[0].points[11].color, HIGHLIGHT_COLOR);
    }

    #[test]
    fn test_render_failure_is_returned_after_recording() {
        let mut h = harness(FakeCapture::ready(), ScriptedEstimator::always_one_face(), true);

        let result = h.live.on_tick(&tick(0, 30, false));

        assert!(result.is_err());
        assert_eq!(h.state.history_len(), 1);
    }
}
