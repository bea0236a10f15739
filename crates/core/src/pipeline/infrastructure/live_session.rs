use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;

use crate::capture::domain::capture_source::CaptureSource;
use crate::detection::domain::landmark_estimator::EstimatorLoader;
use crate::pipeline::frame_scheduler::{CancelHandle, FrameScheduler, RefreshClock, SchedulerReport};
use crate::pipeline::infrastructure::interval_refresh_clock::IntervalRefreshClock;
use crate::pipeline::live_loop::LiveLoop;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::session_state::SessionState;
use crate::rendering::domain::frame_renderer::FrameRenderer;
use crate::shared::live_config::LiveConfig;

#[derive(Error, Debug)]
pub enum LiveError {
    #[error("failed to load landmark estimator: {0}")]
    Load(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to spawn live loop thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("live loop thread panicked")]
    WorkerPanicked,
}

/// A running live loop on its own worker thread.
///
/// The estimator is loaded on the caller's thread before anything is spawned,
/// so a model that fails to load never produces a tick. Dropping the session
/// cancels the loop and waits for the in-flight tick.
pub struct LiveSession {
    state: Arc<SessionState>,
    cancel: CancelHandle,
    handle: Option<JoinHandle<SchedulerReport>>,
}

impl LiveSession {
    /// Starts a session paced by an [`IntervalRefreshClock`] at `config.refresh_hz`.
    pub fn start(
        config: &LiveConfig,
        capture: Box<dyn CaptureSource>,
        loader: &dyn EstimatorLoader,
        renderer: Box<dyn FrameRenderer>,
        logger: Box<dyn PipelineLogger>,
    ) -> Result<Self, LiveError> {
        let clock = Box::new(IntervalRefreshClock::new(config.refresh_hz));
        Self::start_with_clock(config, capture, loader, renderer, logger, clock)
    }

    pub fn start_with_clock(
        config: &LiveConfig,
        capture: Box<dyn CaptureSource>,
        loader: &dyn EstimatorLoader,
        renderer: Box<dyn FrameRenderer>,
        mut logger: Box<dyn PipelineLogger>,
        clock: Box<dyn RefreshClock>,
    ) -> Result<Self, LiveError> {
        let estimator = loader.load(&config.estimator).map_err(LiveError::Load)?;

        let state = Arc::new(SessionState::from_config(config));
        state.mark_model_loaded();
        logger.info("Landmark estimator loaded");

        let mut scheduler = FrameScheduler::new(clock);
        let cancel = scheduler.cancel_handle();
        let mut live = LiveLoop::new(capture, estimator, renderer, logger, state.clone());

        let handle = std::thread::Builder::new()
            .name("live-loop".into())
            .spawn(move || {
                let report = scheduler.start(|tick| live.on_tick(tick));
                live.finish();
                report
            })?;

        Ok(Self {
            state,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn state(&self) -> Arc<SessionState> {
        self.state.clone()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancels the loop and waits for the worker to exit.
    pub fn stop(mut self) -> Result<SchedulerReport, LiveError> {
        self.cancel.cancel();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| LiveError::WorkerPanicked),
            None => Ok(SchedulerReport::default()),
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
