use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError};

use facemesh_live_core::capture::domain::capture_source::CaptureConfig;
use facemesh_live_core::capture::infrastructure::ffmpeg_capture_source::FfmpegCaptureSource;
use facemesh_live_core::detection::infrastructure::onnx_face_mesh_estimator::OnnxFaceMeshLoader;
use facemesh_live_core::history::domain::keypoint_index::KeypointIndex;
use facemesh_live_core::pipeline::infrastructure::live_session::LiveSession;
use facemesh_live_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facemesh_live_core::pipeline::session_state::SessionState;
use facemesh_live_core::rendering::infrastructure::overlay_renderer::{LatestFrame, OverlayRenderer};
use facemesh_live_core::rendering::infrastructure::snapshot_writer::SnapshotWriter;
use facemesh_live_core::shared::constants::{FACE_MESH_MODEL_NAME, KEYPOINT_COUNT, REFRESH_HZ_RANGE};
use facemesh_live_core::shared::live_config::LiveConfig;
use facemesh_live_core::shared::model_resolver;

/// Live face-mesh landmarks over a camera or video feed.
///
/// While running, reads commands from stdin: `record on|off`, `clear`,
/// `select <n>|none`, `fps`, `history`, `track`, `quit`.
#[derive(Parser)]
#[command(name = "facemesh-live")]
struct Cli {
    /// Camera device (e.g. /dev/video0, 0, video=Webcam) or video file/URL.
    input: String,

    /// Capture device format: v4l2, avfoundation, dshow. Omit for files.
    #[arg(long)]
    device_format: Option<String>,

    /// Extra capture option as KEY=VALUE, e.g. video_size=640x480 (repeatable).
    #[arg(long = "capture-option", value_name = "KEY=VALUE")]
    capture_options: Vec<String>,

    /// Face-mesh ONNX model file. Looked up in the model cache when omitted.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Where to download the model from if it is not cached.
    #[arg(long)]
    model_url: Option<String>,

    /// JSON config file (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start with history recording on.
    #[arg(long)]
    record: bool,

    /// Landmark to highlight and track (0-467).
    #[arg(long)]
    select_keypoint: Option<usize>,

    /// Stop after this many seconds.
    #[arg(long)]
    duration_secs: Option<f64>,

    /// Override the refresh rate the loop is paced to.
    #[arg(long)]
    refresh_hz: Option<f64>,

    /// Write the detection history as JSON on exit.
    #[arg(long)]
    history_out: Option<PathBuf>,

    /// Save the last rendered overlay frame as an image on exit.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Debug, PartialEq)]
enum Command {
    Record(bool),
    Clear,
    Select(Option<KeypointIndex>),
    Fps,
    History,
    Track,
    Quit,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = build_config(&cli)?;
    let model_path = resolve_model(&cli)?;
    let capture = FfmpegCaptureSource::open(&CaptureConfig {
        url: cli.input.clone(),
        device_format: cli.device_format.clone(),
        options: parse_capture_options(&cli.capture_options)?,
    })?;

    let renderer = OverlayRenderer::new(config.marker_radius);
    let latest = renderer.latest_handle();

    log::info!("Loading model: {}", model_path.display());
    let session = LiveSession::start(
        &config,
        Box::new(capture),
        &OnnxFaceMeshLoader::new(model_path),
        Box::new(renderer),
        Box::new(StdoutPipelineLogger::default()),
    )?;
    let state = session.state();
    if let Some(i) = cli.select_keypoint {
        state.set_selected_keypoint(KeypointIndex::new(i));
    }

    let deadline = cli.duration_secs.and_then(deadline_after);
    run_commands(&state, spawn_stdin_reader(), deadline);

    let report = session.stop()?;
    log::info!(
        "Stopped after {} ticks ({} failed), last sample {} fps",
        report.ticks,
        report.failed_ticks,
        report.last_fps
    );

    if let Some(path) = &cli.history_out {
        write_history(path, &state)?;
    }
    if let Some(path) = &cli.snapshot {
        write_snapshot(path, &latest)?;
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<LiveConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => LiveConfig::load(path)?,
        None => LiveConfig::load_or_default()?,
    };
    if cli.record {
        config.record_on_start = true;
    }
    if let Some(hz) = cli.refresh_hz {
        config.refresh_hz = hz;
    }
    config.validate()?;
    Ok(config)
}

fn resolve_model(cli: &Cli) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.model {
        return Ok(path.clone());
    }
    log::info!("Resolving model: {FACE_MESH_MODEL_NAME}");
    let path = model_resolver::resolve(
        FACE_MESH_MODEL_NAME,
        cli.model_url.as_deref(),
        None,
        Some(Box::new(download_progress)),
    )?;
    if cli.model_url.is_some() {
        eprintln!();
    }
    Ok(path)
}

/// Forwards stdin lines until EOF.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// `None` when `secs` from now is not representable; the run then ends on `quit` or EOF.
fn deadline_after(secs: f64) -> Option<Instant> {
    let deadline = Duration::try_from_secs_f64(secs)
        .ok()
        .and_then(|duration| Instant::now().checked_add(duration));
    if deadline.is_none() {
        log::warn!("Duration of {secs} s is out of range, running until quit");
    }
    deadline
}

/// Serves commands until `quit`, the deadline, or stdin closing without one.
fn run_commands(state: &Arc<SessionState>, lines: Receiver<String>, deadline: Option<Instant>) {
    let mut stdin_open = true;
    loop {
        let wait = match deadline {
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) => remaining,
                None => return,
            },
            None if !stdin_open => return,
            None => Duration::from_secs(3600),
        };

        if !stdin_open {
            std::thread::sleep(wait);
            continue;
        }

        match lines.recv_timeout(wait) {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => match parse_command(&line) {
                Ok(Command::Quit) => return,
                Ok(command) => execute(state, command),
                Err(e) => eprintln!("{e}"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => stdin_open = false,
        }
    }
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let arg = words.next();

    match (verb, arg) {
        ("record", Some("on")) => Ok(Command::Record(true)),
        ("record", Some("off")) => Ok(Command::Record(false)),
        ("record", _) => Err("Usage: record on|off".to_string()),
        ("clear", None) => Ok(Command::Clear),
        ("select", Some("none")) => Ok(Command::Select(None)),
        ("select", Some(n)) => n
            .parse::<i64>()
            .ok()
            .and_then(KeypointIndex::new)
            .map(|i| Command::Select(Some(i)))
            .ok_or_else(|| {
                format!(
                    "Keypoint index must be between 0 and {}, got '{n}'",
                    KEYPOINT_COUNT - 1
                )
            }),
        ("select", None) => Err("Usage: select <n>|none".to_string()),
        ("fps", None) => Ok(Command::Fps),
        ("history", None) => Ok(Command::History),
        ("track", None) => Ok(Command::Track),
        ("quit" | "exit", None) => Ok(Command::Quit),
        _ => Err(format!("Unknown command: {}", line.trim())),
    }
}

fn execute(state: &SessionState, command: Command) {
    match command {
        Command::Record(enabled) => {
            state.set_recording(enabled);
            println!("Recording {}", if enabled { "on" } else { "off" });
        }
        Command::Clear => {
            state.clear_history();
            println!("History cleared");
        }
        Command::Select(index) => {
            state.set_selected_keypoint(index);
            match index {
                Some(i) => println!("Selected keypoint {i}"),
                None => println!("Selection cleared"),
            }
        }
        Command::Fps => println!("{} fps", state.current_fps()),
        Command::History => {
            let entries = state.history_entries();
            println!(
                "{} entries (recording {})",
                entries.len(),
                if state.is_recording() { "on" } else { "off" }
            );
            for (i, d) in entries.iter().enumerate() {
                println!("  #{i}: t={} confidence={:.2}", d.timestamp_ms(), d.confidence());
            }
        }
        Command::Track => match state.selected_keypoint() {
            Some(index) => {
                for kp in state.track_selected_keypoint() {
                    println!("  {index}: ({:.1}, {:.1}, {:.3})", kp.x, kp.y, kp.z);
                }
            }
            None => println!("No keypoint selected"),
        },
        Command::Quit => {}
    }
}

fn write_history(path: &Path, state: &SessionState) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let entries = state.history_entries();
    std::fs::write(path, serde_json::to_string_pretty(&entries)?)?;
    log::info!("Wrote {} detections to {}", entries.len(), path.display());
    Ok(())
}

fn write_snapshot(path: &Path, latest: &LatestFrame) -> Result<(), Box<dyn std::error::Error>> {
    let frame = latest
        .lock()
        .map_err(|_| "Overlay frame lock poisoned")?
        .clone();
    match frame {
        Some(frame) => SnapshotWriter::new().write(path, &frame),
        None => {
            log::warn!("No frame was rendered, skipping snapshot");
            Ok(())
        }
    }
}

fn parse_capture_options(
    raw: &[String],
) -> Result<Vec<(String, String)>, Box<dyn std::error::Error>> {
    raw.iter()
        .map(|opt| {
            opt.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| -> Box<dyn std::error::Error> {
                    format!("Capture option must be KEY=VALUE, got '{opt}'").into()
                })
        })
        .collect()
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = &cli.model {
        if !path.exists() {
            return Err(format!("Model file not found: {}", path.display()).into());
        }
    }
    if let Some(i) = cli.select_keypoint {
        if i >= KEYPOINT_COUNT {
            return Err(format!(
                "Keypoint index must be between 0 and {}, got {i}",
                KEYPOINT_COUNT - 1
            )
            .into());
        }
    }
    if let Some(secs) = cli.duration_secs {
        if !(secs.is_finite() && secs > 0.0) {
            return Err(format!("Duration must be a positive number of seconds, got {secs}").into());
        }
    }
    if let Some(hz) = cli.refresh_hz {
        if !REFRESH_HZ_RANGE.contains(&hz) {
            return Err(format!(
                "Refresh rate must be between {} and {} Hz, got {hz}",
                REFRESH_HZ_RANGE.start(),
                REFRESH_HZ_RANGE.end()
            )
            .into());
        }
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face mesh model... {pct}%");
    } else {
        eprint!("\rDownloading face mesh model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("record on"), Ok(Command::Record(true)));
        assert_eq!(parse_command("  record   off "), Ok(Command::Record(false)));
        assert_eq!(parse_command("clear"), Ok(Command::Clear));
        assert_eq!(parse_command("fps"), Ok(Command::Fps));
        assert_eq!(parse_command("history"), Ok(Command::History));
        assert_eq!(parse_command("track"), Ok(Command::Track));
        assert_eq!(parse_command("quit"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_select() {
        assert_eq!(
            parse_command("select 467"),
            Ok(Command::Select(KeypointIndex::new(467usize)))
        );
        assert_eq!(parse_command("select none"), Ok(Command::Select(None)));
        assert!(parse_command("select 468").is_err());
        assert!(parse_command("select -1").is_err());
        assert!(parse_command("select nose").is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_and_malformed() {
        assert!(parse_command("record maybe").is_err());
        assert!(parse_command("dance").is_err());
        assert!(parse_command("clear everything").is_err());
    }

    #[test]
    fn test_capture_options_split_on_first_equals() {
        let opts = parse_capture_options(&["video_size=640x480".into(), "a=b=c".into()]).unwrap();
        assert_eq!(
            opts,
            vec![
                ("video_size".to_string(), "640x480".to_string()),
                ("a".to_string(), "b=c".to_string()),
            ]
        );
        assert!(parse_capture_options(&["novalue".into()]).is_err());
    }

    #[test]
    fn test_execute_commands_drive_state() {
        let state = SessionState::default();
        execute(&state, Command::Record(true));
        execute(&state, Command::Select(KeypointIndex::new(3usize)));
        assert!(state.is_recording());
        assert_eq!(state.selected_keypoint(), KeypointIndex::new(3usize));

        execute(&state, Command::Clear);
        assert_eq!(state.history_len(), 0);
    }

    #[test]
    fn test_commands_stop_at_quit() {
        let state = Arc::new(SessionState::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        for line in ["record on", "bogus", "quit", "record off"] {
            tx.send(line.to_string()).unwrap();
        }

        run_commands(&state, rx, None);

        assert!(state.is_recording());
    }

    #[test]
    fn test_closed_stdin_without_deadline_returns() {
        let state = Arc::new(SessionState::default());
        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        drop(tx);
        run_commands(&state, rx, None);
    }

    #[test]
    fn test_deadline_ends_command_loop() {
        let state = Arc::new(SessionState::default());
        let (_tx, rx) = crossbeam_channel::unbounded::<String>();
        let start = Instant::now();
        run_commands(&state, rx, Some(Instant::now() + Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_deadline_after_handles_out_of_range_durations() {
        let before = Instant::now();
        let deadline = deadline_after(0.05).unwrap();
        assert!(deadline >= before + Duration::from_millis(50));

        assert!(deadline_after(1e30).is_none());
        assert!(deadline_after(f64::MAX).is_none());
    }

    #[rstest]
    #[case::vanishing_refresh(&["--refresh-hz", "1e-300"])]
    #[case::huge_refresh(&["--refresh-hz", "1e9"])]
    #[case::zero_duration(&["--duration-secs", "0"])]
    #[case::infinite_duration(&["--duration-secs", "inf"])]
    fn test_validate_rejects_out_of_range_flags(#[case] flags: &[&str]) {
        let args = ["facemesh-live", "/dev/video0"].iter().chain(flags).copied();
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(validate(&cli).is_err());
    }
}
