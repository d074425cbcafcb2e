//! Capture state machine: feed and detect loops
//!
//! Two dedicated threads share a [`CaptureContext`]. The feed loop pulls
//! hardware frames, copies the reference channel into the recording buffer
//! while a session is active, and pushes every frame into the wake front
//! end. The detect loop polls wake decisions, runs the recording session,
//! and hands finished utterances to an [`UtteranceSink`].
//!
//! Only the detect loop flips the recording flag; the feed loop just reads
//! it, so the two never contend beyond the buffer mutex.

mod buffer;

pub use buffer::RecordingBuffer;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::audio::{AudioFrameSource, PlayerHandle, save_raw, save_wav};
use crate::config::{CaptureConfig, SAMPLE_RATE, SoundsConfig};
use crate::net::Connectivity;
use crate::ui::UiHandle;
use crate::wake::{DetectHalf, DetectionResult, FeedHalf};
use crate::{Error, Result};

/// Detect loop poll interval; bounds wake-to-chime latency
const DETECT_POLL: Duration = Duration::from_millis(20);

/// Pause after a failed frame read. A disconnected source fails instantly,
/// so an unpaced retry would spin the feed thread flat out.
const FEED_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// State shared between the feed and detect loops
#[derive(Debug)]
pub struct CaptureContext {
    recording: AtomicBool,
    buffer: Mutex<RecordingBuffer>,
    shutdown: ShutdownSignal,
}

impl CaptureContext {
    /// Create a context with a recording arena of `capacity` mono samples
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            recording: AtomicBool::new(false),
            buffer: Mutex::new(RecordingBuffer::new(capacity)),
            shutdown: ShutdownSignal::default(),
        }
    }

    /// Whether a recording session is active. Written by the detect loop
    /// only; the feed loop reads it once per frame.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::Release);
    }

    /// Lock the recording buffer
    ///
    /// # Panics
    ///
    /// Panics if a loop thread panicked while holding the lock.
    #[must_use]
    pub fn buffer(&self) -> MutexGuard<'_, RecordingBuffer> {
        match self.buffer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Shutdown coordination for the loop threads
    #[must_use]
    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }
}

/// Cooperative shutdown: one stop request, one acknowledgement per loop
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    stop: AtomicBool,
    feed_stopped: AtomicBool,
    detect_stopped: AtomicBool,
}

impl ShutdownSignal {
    /// Ask both loops to exit at their next iteration
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Whether the feed loop has acknowledged the stop
    #[must_use]
    pub fn feed_stopped(&self) -> bool {
        self.feed_stopped.load(Ordering::Acquire)
    }

    /// Whether the detect loop has acknowledged the stop
    #[must_use]
    pub fn detect_stopped(&self) -> bool {
        self.detect_stopped.load(Ordering::Acquire)
    }

    /// Block until both loops have acknowledged, up to `timeout`
    ///
    /// Returns `true` when both acknowledgements arrived in time.
    #[must_use]
    pub fn wait_for_stop(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !(self.feed_stopped() && self.detect_stopped()) {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }

    fn ack_feed(&self) {
        self.feed_stopped.store(true, Ordering::Release);
    }

    fn ack_detect(&self) {
        self.detect_stopped.store(true, Ordering::Release);
    }
}

/// A persisted utterance, ready for the upload pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtteranceArtifact {
    /// WAV file with the standard 44-byte header
    pub wav_path: PathBuf,
    /// Headerless little-endian PCM copy of the same samples
    pub raw_path: PathBuf,
    /// Captured mono samples
    pub sample_count: usize,
    /// Sample rate of both artifacts
    pub sample_rate: u32,
}

/// Receives finished utterances from the detect loop
///
/// The loop never blocks on the sink; implementations hand the artifact to
/// the async runtime and return immediately.
pub trait UtteranceSink: Send + Sync {
    fn submit(&self, artifact: UtteranceArtifact);
}

/// Write the WAV and raw artifacts for a finished recording
///
/// # Errors
///
/// Returns error if either file cannot be written.
pub fn persist_utterance(
    wav_path: &Path,
    raw_path: &Path,
    samples: &[i16],
    sample_rate: u32,
) -> Result<UtteranceArtifact> {
    save_wav(wav_path, samples, sample_rate)
        .map_err(|e| Error::Storage(format!("wav artifact: {e}")))?;
    save_raw(raw_path, samples).map_err(|e| Error::Storage(format!("raw artifact: {e}")))?;
    tracing::debug!(
        wav = %wav_path.display(),
        samples = samples.len(),
        "utterance persisted"
    );
    Ok(UtteranceArtifact {
        wav_path: wav_path.to_path_buf(),
        raw_path: raw_path.to_path_buf(),
        sample_count: samples.len(),
        sample_rate,
    })
}

/// Everything the detect loop needs beyond the shared context
pub struct DetectParams {
    pub connectivity: Connectivity,
    pub ui: UiHandle,
    pub player: PlayerHandle,
    pub sounds: SoundsConfig,
    pub wav_path: PathBuf,
    pub raw_path: PathBuf,
    pub max_record: Duration,
    pub poll_interval: Duration,
}

impl DetectParams {
    /// Build detect parameters from configuration with the default poll rate
    #[must_use]
    pub fn new(
        config: &crate::config::Config,
        connectivity: Connectivity,
        ui: UiHandle,
        player: PlayerHandle,
    ) -> Self {
        Self {
            connectivity,
            ui,
            player,
            sounds: config.sounds.clone(),
            wav_path: config.utterance_wav_path(),
            raw_path: config.utterance_raw_path(),
            max_record: config.capture.max_record_duration(),
            poll_interval: DETECT_POLL,
        }
    }
}

/// Spawn the feed loop on its own thread
#[must_use]
pub fn spawn_feed(
    ctx: Arc<CaptureContext>,
    source: Box<dyn AudioFrameSource>,
    feed: FeedHalf,
    config: CaptureConfig,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("feed".to_string())
        .spawn(move || feed_loop(&ctx, source, feed, &config))
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to spawn feed thread");
            std::thread::spawn(|| {})
        })
}

/// Spawn the detect loop on its own thread
#[must_use]
pub fn spawn_detect(
    ctx: Arc<CaptureContext>,
    fetch: DetectHalf,
    sink: Arc<dyn UtteranceSink>,
    params: DetectParams,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("detect".to_string())
        .spawn(move || detect_loop(&ctx, &fetch, sink.as_ref(), &params))
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to spawn detect thread");
            std::thread::spawn(|| {})
        })
}

/// Pull hardware frames into the front end until shutdown
///
/// While recording, channel 0 of each frame is extracted and appended to
/// the shared buffer before the frame is fed to the classifier, so the
/// recording sees exactly what the wake engine saw.
pub fn feed_loop(
    ctx: &CaptureContext,
    mut source: Box<dyn AudioFrameSource>,
    mut feed: FeedHalf,
    config: &CaptureConfig,
) {
    let frame_len = config.chunk_samples * config.hardware_channels;
    let mut frame = vec![0i16; frame_len];
    let mut mono = vec![0i16; config.chunk_samples];

    tracing::debug!(frame_len, "feed loop started");
    loop {
        if ctx.shutdown.stop_requested() {
            break;
        }

        match source.read_frame(&mut frame) {
            Ok(n) if n == frame_len => {}
            Ok(n) => {
                tracing::warn!(read = n, expected = frame_len, "short frame, retrying");
                continue;
            }
            Err(e) => {
                // Timeouts are routine while the device idles
                tracing::trace!(error = %e, "frame read failed, retrying");
                std::thread::sleep(FEED_ERROR_BACKOFF);
                continue;
            }
        }

        if ctx.is_recording() {
            for (dst, src) in mono
                .iter_mut()
                .zip(frame.iter().step_by(config.hardware_channels))
            {
                *dst = *src;
            }
            ctx.buffer().append(&mono);
        }

        feed.feed(&frame);
    }

    ctx.shutdown.ack_feed();
    tracing::info!("feed loop stopped");
}

/// Poll wake decisions and drive recording sessions until shutdown
///
/// A session always runs to its deadline; a buffer that fills early simply
/// saturates and drops the overflow.
pub fn detect_loop(
    ctx: &CaptureContext,
    fetch: &DetectHalf,
    sink: &dyn UtteranceSink,
    params: &DetectParams,
) {
    let mut session = RecordingSession::default();

    tracing::debug!("detect loop started");
    loop {
        if ctx.shutdown.stop_requested() {
            break;
        }

        match fetch.fetch() {
            DetectionResult::WakeDetected => on_wake(ctx, &mut session, params),
            DetectionResult::Error(e) => tracing::trace!(error = %e, "detection error"),
            DetectionResult::NoEvent => {}
        }

        if session.expired(Instant::now()) {
            finish_recording(ctx, &mut session, sink, params);
        }

        std::thread::sleep(params.poll_interval);
    }

    // A session cut short by shutdown is discarded, not uploaded
    if session.active() {
        ctx.set_recording(false);
        let dropped = ctx.buffer().stop();
        tracing::debug!(samples = dropped.len(), "recording discarded on shutdown");
    }

    ctx.shutdown.ack_detect();
    tracing::info!("detect loop stopped");
}

fn on_wake(ctx: &CaptureContext, session: &mut RecordingSession, params: &DetectParams) {
    if session.active() {
        tracing::debug!("wake during active session, ignoring");
        return;
    }

    if !params.connectivity.is_online() {
        tracing::warn!("wake while offline");
        params.player.play(&params.sounds.enable_network);
        return;
    }

    params.ui.show_listening();
    params.player.play(&params.sounds.wake);
    ctx.buffer().start();
    ctx.set_recording(true);
    session.begin(Instant::now() + params.max_record);
    tracing::info!("recording started");
}

fn finish_recording(
    ctx: &CaptureContext,
    session: &mut RecordingSession,
    sink: &dyn UtteranceSink,
    params: &DetectParams,
) {
    ctx.set_recording(false);
    let samples = ctx.buffer().stop();
    session.finish();
    tracing::info!(samples = samples.len(), "recording finished");

    match persist_utterance(&params.wav_path, &params.raw_path, &samples, SAMPLE_RATE) {
        Ok(artifact) => sink.submit(artifact),
        Err(e) => {
            tracing::error!(error = %e, "failed to persist utterance");
            params.ui.show_error("could not save recording");
        }
    }
}

/// Tracks the deadline of the recording in progress
#[derive(Debug, Default)]
struct RecordingSession {
    deadline: Option<Instant>,
}

impl RecordingSession {
    fn active(&self) -> bool {
        self.deadline.is_some()
    }

    fn begin(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    fn finish(&mut self) {
        self.deadline = None;
    }
}
