use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::capture::domain::capture_source::{CaptureConfig, CaptureError, CaptureSource};
use crate::shared::frame::Frame;

/// Frames buffered between the decode thread and the consumer.
const FRAME_SLOTS: usize = 1;

type DecodeError = Box<dyn std::error::Error>;

/// Live frame source backed by ffmpeg-next (libavdevice + libavcodec).
///
/// Decoding runs on a dedicated thread that owns every ffmpeg object, so the
/// source itself holds only channel endpoints. The hand-off keeps the newest
/// frame only: when the consumer falls behind, stale frames are discarded
/// instead of queued.
pub struct FfmpegCaptureSource {
    url: String,
    frame_rx: Receiver<Frame>,
    pending: Option<Frame>,
    dimensions: Option<(u32, u32)>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FfmpegCaptureSource {
    /// Opens the source and starts decoding. Returns once the input is open.
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Frame>(FRAME_SLOTS);
        let (open_tx, open_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let stop = Arc::new(AtomicBool::new(false));

        let thread_config = config.clone();
        let drain_rx = frame_rx.clone();
        let thread_stop = stop.clone();
        let handle = std::thread::Builder::new()
            .name("capture-decode".to_string())
            .spawn(move || {
                run_decoder(&thread_config, open_tx, frame_tx, drain_rx, thread_stop);
            })
            .map_err(|e| CaptureError::Open {
                url: config.url.clone(),
                reason: e.to_string(),
            })?;

        let opened = open_rx.recv().unwrap_or_else(|_| {
            Err("decode thread exited before opening the input".to_string())
        });
        if let Err(reason) = opened {
            let _ = handle.join();
            return Err(CaptureError::Open {
                url: config.url.clone(),
                reason,
            });
        }

        log::info!("Capture source opened: {}", config.url);
        Ok(Self {
            url: config.url.clone(),
            frame_rx,
            pending: None,
            dimensions: None,
            stop,
            handle: Some(handle),
        })
    }

    /// True once the decode thread has stopped and every frame was consumed.
    pub fn is_finished(&self) -> bool {
        self.pending.is_none()
            && self.frame_rx.is_empty()
            && self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    fn pull_latest(&mut self) {
        while let Ok(frame) = self.frame_rx.try_recv() {
            self.dimensions = Some(frame.dimensions());
            self.pending = Some(frame);
        }
    }
}

impl CaptureSource for FfmpegCaptureSource {
    fn is_ready(&mut self) -> bool {
        self.pull_latest();
        self.pending.is_some()
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        self.pull_latest();
        match self.pending.take() {
            Some(frame) => Ok(frame),
            None if self.is_finished() => Err(CaptureError::Disconnected),
            None => Err(CaptureError::NotReady),
        }
    }
}

impl Drop for FfmpegCaptureSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Unblock a decoder waiting on a full channel.
        while self.frame_rx.try_recv().is_ok() {}
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Capture decode thread for {} panicked", self.url);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Decode thread
// ---------------------------------------------------------------------------

fn run_decoder(
    config: &CaptureConfig,
    open_tx: Sender<Result<(), String>>,
    frame_tx: Sender<Frame>,
    drain_rx: Receiver<Frame>,
    stop: Arc<AtomicBool>,
) {
    let ictx = match open_input(config) {
        Ok(ictx) => ictx,
        Err(e) => {
            let _ = open_tx.send(Err(e.to_string()));
            return;
        }
    };
    let _ = open_tx.send(Ok(()));

    let realtime = config.device_format.is_none();
    let sink = LatestFrameSink {
        frame_tx,
        drain_rx,
        stop,
    };
    match decode_frames(ictx, &sink, realtime) {
        Ok(count) => log::info!("Capture of {} ended after {count} frames", config.url),
        Err(e) => log::error!("Capture of {} failed: {e}", config.url),
    }
}

fn open_input(
    config: &CaptureConfig,
) -> Result<ffmpeg_next::format::context::Input, DecodeError> {
    ffmpeg_next::init()?;

    let mut options = ffmpeg_next::Dictionary::new();
    for (key, value) in &config.options {
        options.set(key, value);
    }

    match config.device_format.as_deref() {
        Some(name) => {
            let format = ffmpeg_next::device::input::video()
                .find(|f| f.name() == name)
                .ok_or_else(|| format!("Unknown capture device format '{name}'"))?;
            let ctx = ffmpeg_next::format::open_with(&config.url, &format, options)?;
            Ok(ctx.input())
        }
        None => Ok(ffmpeg_next::format::input_with_dictionary(
            &config.url,
            options,
        )?),
    }
}

/// Producer end of the newest-frame-wins hand-off.
struct LatestFrameSink {
    frame_tx: Sender<Frame>,
    drain_rx: Receiver<Frame>,
    stop: Arc<AtomicBool>,
}

impl LatestFrameSink {
    /// Returns false once the consumer is gone or asked to stop.
    fn publish(&self, mut frame: Frame) -> bool {
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return false;
            }
            match self.frame_tx.try_send(frame) {
                Ok(()) => return true,
                Err(TrySendError::Full(rejected)) => {
                    let _ = self.drain_rx.try_recv();
                    frame = rejected;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

/// Decodes until EOF or stop, returning the number of frames published.
fn decode_frames(
    mut ictx: ffmpeg_next::format::context::Input,
    sink: &LatestFrameSink,
    realtime: bool,
) -> Result<usize, DecodeError> {
    let stream = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or("No video stream found")?;
    let stream_index = stream.index();
    let rate = stream.rate();
    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
    let mut decoder = codec_ctx.decoder().video()?;

    let frame_interval = if realtime && rate.numerator() > 0 && rate.denominator() > 0 {
        Some(Duration::from_secs_f64(
            rate.denominator() as f64 / rate.numerator() as f64,
        ))
    } else {
        None
    };

    let mut converter = RgbConverter::new(&decoder)?;
    let mut pacer = Pacer::new(frame_interval);
    let mut published = 0usize;

    for (stream, packet) in ictx.packets() {
        if sink.stopped() {
            return Ok(published);
        }
        if stream.index() != stream_index {
            continue;
        }
        if decoder.send_packet(&packet).is_err() {
            continue;
        }
        if !drain_decoder(&mut decoder, &mut converter, &mut pacer, sink, &mut published)? {
            return Ok(published);
        }
    }

    let _ = decoder.send_eof();
    drain_decoder(&mut decoder, &mut converter, &mut pacer, sink, &mut published)?;
    Ok(published)
}

fn drain_decoder(
    decoder: &mut ffmpeg_next::decoder::Video,
    converter: &mut RgbConverter,
    pacer: &mut Pacer,
    sink: &LatestFrameSink,
    published: &mut usize,
) -> Result<bool, DecodeError> {
    let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
    while decoder.receive_frame(&mut decoded).is_ok() {
        let frame = converter.convert(&decoded, *published)?;
        pacer.wait();
        if !sink.publish(frame) {
            return Ok(false);
        }
        *published += 1;
    }
    Ok(true)
}

/// Converts decoded frames of any pixel format to packed RGB24.
struct RgbConverter {
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
}

impl RgbConverter {
    fn new(decoder: &ffmpeg_next::decoder::Video) -> Result<Self, DecodeError> {
        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;
        Ok(Self {
            scaler,
            width,
            height,
        })
    }

    fn convert(
        &mut self,
        decoded: &ffmpeg_next::util::frame::video::Video,
        index: usize,
    ) -> Result<Frame, DecodeError> {
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(decoded, &mut rgb)?;
        let pixels = pack_rows(rgb.data(0), rgb.stride(0), self.width, self.height);
        Ok(Frame::new(pixels, self.width, self.height, 3, index))
    }
}

/// Strips per-row padding (`stride > width * 3`) into a tight RGB buffer.
fn pack_rows(data: &[u8], stride: usize, width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}

/// Holds file playback to the stream's native frame rate.
struct Pacer {
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl Pacer {
    fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    fn wait(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        // Late frames reset the schedule rather than bursting to catch up.
        self.next_due = Some(due.max(now) + interval);
    }
}
