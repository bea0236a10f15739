use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for live-loop events.
///
/// Keeps the loop free of any particular output mechanism so hosts and tests
/// can observe stage timings and frame-rate samples without touching the
/// orchestration code.
pub trait PipelineLogger: Send {
    /// Record how long a named stage took for one tick.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces found, estimator failures).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// A new frames-per-second sample was taken.
    fn fps_sample(&mut self, fps: u32);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
    fn fps_sample(&mut self, _fps: u32) {}
}

/// CLI-oriented logger that aggregates per-stage timing, metrics and fps
/// samples and prints a report when the session ends.
///
/// Fps samples are logged every `log_every` samples so a long session doesn't
/// flood the terminal.
pub struct StdoutPipelineLogger {
    log_every: usize,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    fps_samples: Vec<u32>,
    start_time: Instant,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new(log_every: usize) -> Self {
        Self {
            log_every: log_every.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            fps_samples: Vec::new(),
            start_time: Instant::now(),
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() && self.fps_samples.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = Vec::new();

        lines.push(format!(
            "Live session summary ({:.1}s total):",
            elapsed_ms / 1000.0
        ));

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = mean(durations);
            let max_ms = durations.iter().copied().fold(0.0, f64::max);
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  max {max_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let values = &self.metrics[name];
            let sum: f64 = values.iter().sum();
            lines.push(format!("  {name}: avg {:.1}  sum {sum:.0}", mean(values)));
        }

        if !self.fps_samples.is_empty() {
            let samples: Vec<f64> = self.fps_samples.iter().map(|&f| f as f64).collect();
            let min = self.fps_samples.iter().min().copied().unwrap_or(0);
            let max = self.fps_samples.iter().max().copied().unwrap_or(0);
            lines.push(format!(
                "  Frame rate: avg {:.1} fps  (min {min}, max {max}, {} samples)",
                mean(&samples),
                samples.len()
            ));
        }

        Some(lines.join("\n"))
    }

    /// Returns the timing data for a given stage.
    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    /// Returns the metric data for a given name.
    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    pub fn fps_samples(&self) -> &[u32] {
        &self.fps_samples
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(5)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn fps_sample(&mut self, fps: u32) {
        self.fps_samples.push(fps);
        if self.fps_samples.len() % self.log_every == 1 || self.log_every == 1 {
            log::info!("Live loop: {fps} fps");
        }
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
