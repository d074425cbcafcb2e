//! Long-running runtime wiring
//!
//! The daemon owns the thread and task topology: feed and detect loops on
//! dedicated threads (the audio path never touches the async runtime), the
//! connectivity probe and upload pipelines as tokio tasks, and a player
//! thread for all speaker output.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::{AudioFrameSource, AudioPlayback, CpalFrameSource, PlayerHandle};
use crate::capture::{CaptureContext, DetectParams, spawn_detect, spawn_feed};
use crate::config::Config;
use crate::net::{Connectivity, WEATHER_TIMEOUT, probe_loop};
use crate::pipeline::{PipelineLauncher, UploadPipeline};
use crate::ui;
use crate::wake::{EnergyClassifier, frontend};
use crate::Result;

/// How long shutdown waits for the loop threads to acknowledge
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The assembled runtime
pub struct Daemon {
    config: Config,
}

impl Daemon {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the audio device or HTTP client cannot be opened;
    /// failures after startup are logged and survived.
    pub async fn run(self) -> Result<()> {
        let config = self.config;
        tracing::info!(data_dir = %config.data_dir.display(), "starting murmur");

        let (ui_handle, ui_rx) = ui::UiHandle::channel();
        let _ui_thread = ui::spawn_logger(ui_rx);

        let player = PlayerHandle::spawn(config.volume);
        let connectivity = Connectivity::new();

        let probe_client = reqwest::Client::builder()
            .timeout(WEATHER_TIMEOUT)
            .build()?;
        tokio::spawn(probe_loop(
            config.clone(),
            connectivity.clone(),
            ui_handle.clone(),
            player.clone(),
            probe_client,
        ));

        let pipeline = Arc::new(UploadPipeline::new(
            &config,
            connectivity.clone(),
            ui_handle.clone(),
            player.clone(),
        )?);
        let launcher = Arc::new(PipelineLauncher::new(
            pipeline,
            tokio::runtime::Handle::current(),
        ));

        let source = CpalFrameSource::new(config.capture.hardware_channels)?;
        let (feed, fetch) = frontend(&config.capture, Box::new(EnergyClassifier::new()));
        let ctx = Arc::new(CaptureContext::new(config.capture.max_samples()));

        let feed_thread = spawn_feed(
            Arc::clone(&ctx),
            Box::new(source),
            feed,
            config.capture.clone(),
        );
        let detect_thread = spawn_detect(
            Arc::clone(&ctx),
            fetch,
            launcher,
            DetectParams::new(&config, connectivity, ui_handle, player),
        );

        tracing::info!("listening for wake word");
        tokio::signal::ctrl_c().await?;
        tracing::info!("shutdown requested");

        ctx.shutdown().request_stop();
        if !ctx.shutdown().wait_for_stop(SHUTDOWN_TIMEOUT) {
            tracing::warn!("capture loops did not stop in time");
        }
        let _ = feed_thread.join();
        let _ = detect_thread.join();

        tracing::info!("stopped");
        Ok(())
    }
}

/// Capture from the microphone for `duration` and report signal levels
///
/// # Errors
///
/// Returns error if the input device cannot be opened.
pub fn test_mic(config: &Config, duration: Duration) -> Result<()> {
    let capture = &config.capture;
    let mut source = CpalFrameSource::new(capture.hardware_channels)?;
    let mut frame = vec![0i16; capture.chunk_samples * capture.hardware_channels];

    tracing::info!(seconds = duration.as_secs(), "capturing");
    let deadline = Instant::now() + duration;
    let mut frames = 0u64;
    let mut peak = 0i16;

    while Instant::now() < deadline {
        match source.read_frame(&mut frame) {
            Ok(_) => {
                frames += 1;
                let frame_peak = frame.iter().map(|s| s.saturating_abs()).max().unwrap_or(0);
                peak = peak.max(frame_peak);
                if frames % 32 == 0 {
                    tracing::info!(frames, frame_peak, "capture level");
                }
            }
            Err(e) => tracing::warn!(error = %e, "frame read failed"),
        }
    }

    tracing::info!(frames, peak, "capture complete");
    Ok(())
}

/// Play a short tone on the default output device
///
/// # Errors
///
/// Returns error if no output device accepts the capture sample rate.
pub fn test_speaker(config: &Config) -> Result<()> {
    use crate::config::SAMPLE_RATE;

    let playback = AudioPlayback::new(config.volume);
    let samples: Vec<f32> = (0..SAMPLE_RATE)
        .map(|i| {
            let t = f64::from(i) / f64::from(SAMPLE_RATE);
            #[allow(clippy::cast_possible_truncation)]
            let s = (t * 440.0 * std::f64::consts::TAU).sin() as f32;
            s * 0.4
        })
        .collect();

    tracing::info!("playing test tone");
    playback.play_samples_blocking(&samples, SAMPLE_RATE)?;
    Ok(())
}
