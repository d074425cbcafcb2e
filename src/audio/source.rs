//! Microphone frame source
//!
//! The feed loop pulls fixed-size interleaved frames through the
//! [`AudioFrameSource`] trait. The cpal implementation keeps the input stream
//! on a dedicated thread (cpal streams aren't `Send`) and forwards samples
//! over a bounded channel, so the handle itself can move into the feed thread.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, sync_channel};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};

use crate::config::SAMPLE_RATE;
use crate::{Error, Result};

/// How long a frame read waits for hardware data before reporting an error.
/// The caller logs and retries, so this also bounds shutdown latency.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Blocking source of fixed-size interleaved PCM frames
pub trait AudioFrameSource: Send {
    /// Fill `frame` completely, returning the number of samples written
    ///
    /// Blocks until a full frame is available or the hardware timeout
    /// elapses. Never silently returns a partial frame: anything short of
    /// `frame.len()` is an error condition for the caller to log and retry.
    ///
    /// # Errors
    ///
    /// Returns error on hardware failure or read timeout.
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<usize>;
}

/// Frame source backed by the default cpal input device
pub struct CpalFrameSource {
    rx: Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
    stop: Arc<AtomicBool>,
}

impl CpalFrameSource {
    /// Open the default input device at the capture sample rate
    ///
    /// Prefers a device config matching `channels`; falls back to mono and
    /// duplicates the channel into the interleaved hardware layout.
    ///
    /// # Errors
    ///
    /// Returns error if no input device or no usable config exists.
    pub fn new(channels: usize) -> Result<Self> {
        let (tx, rx) = sync_channel::<Vec<i16>>(64);
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = sync_channel::<Result<()>>(1);

        let thread_stop = Arc::clone(&stop);
        std::thread::Builder::new()
            .name("mic-stream".to_string())
            .spawn(move || run_input_stream(channels, &tx, &thread_stop, &ready_tx))
            .map_err(|e| Error::Audio(e.to_string()))?;

        // Wait for the stream thread to either start the stream or fail
        ready_rx
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| Error::Audio("input stream thread did not start".to_string()))??;

        Ok(Self {
            rx,
            pending: VecDeque::new(),
            stop,
        })
    }
}

impl AudioFrameSource for CpalFrameSource {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<usize> {
        while self.pending.len() < frame.len() {
            match self.rx.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(Error::Audio("frame read timed out".to_string()));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Audio("input stream stopped".to_string()));
                }
            }
        }

        for slot in frame.iter_mut() {
            // Length checked above
            *slot = self.pending.pop_front().unwrap_or(0);
        }
        Ok(frame.len())
    }
}

impl Drop for CpalFrameSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// Owns the cpal stream for the lifetime of the source handle
fn run_input_stream(
    channels: usize,
    tx: &SyncSender<Vec<i16>>,
    stop: &AtomicBool,
    ready: &SyncSender<Result<()>>,
) {
    let stream = match build_input_stream(channels, tx.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Report readiness only once the stream is actually running, so a
    // play failure fails `CpalFrameSource::new` instead of leaving a
    // source that can never produce a frame
    if let Err(e) = stream.play() {
        let _ = ready.send(Err(Error::Audio(format!(
            "failed to start input stream: {e}"
        ))));
        return;
    }
    let _ = ready.send(Ok(()));

    while !stop.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(100));
    }
    drop(stream);
    tracing::debug!("input stream stopped");
}

fn build_input_stream(channels: usize, tx: SyncSender<Vec<i16>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

    let wanted = u16::try_from(channels).map_err(|e| Error::Audio(e.to_string()))?;
    let supported = find_input_config(&device, wanted)
        .or_else(|| find_input_config(&device, 1))
        .ok_or_else(|| Error::Audio("no suitable input config found".to_string()))?;

    let device_channels = supported.channels() as usize;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.with_sample_rate(SampleRate(SAMPLE_RATE)).config();

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        channels = device_channels,
        ?sample_format,
        "audio capture initialized"
    );

    let err_fn = |err| tracing::error!(error = %err, "audio capture error");

    let stream = match sample_format {
        SampleFormat::I16 => device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    forward(data.to_vec(), device_channels, channels, &tx);
                },
                err_fn,
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?,
        _ => device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    #[allow(clippy::cast_possible_truncation)]
                    let converted: Vec<i16> = data
                        .iter()
                        .map(|s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
                        .collect();
                    forward(converted, device_channels, channels, &tx);
                },
                err_fn,
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?,
    };

    Ok(stream)
}

fn find_input_config(
    device: &cpal::Device,
    channels: u16,
) -> Option<cpal::SupportedStreamConfigRange> {
    device.supported_input_configs().ok()?.find(|c| {
        c.channels() == channels
            && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
            && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
    })
}

/// Push interleaved samples toward the reader, adapting channel count.
///
/// A mono device is duplicated into the expected interleaved layout. The
/// channel is bounded; if the reader stalls the chunk is dropped rather than
/// blocking the audio callback.
fn forward(samples: Vec<i16>, device_channels: usize, wanted: usize, tx: &SyncSender<Vec<i16>>) {
    let chunk = if device_channels == wanted {
        samples
    } else if device_channels == 1 {
        let mut interleaved = Vec::with_capacity(samples.len() * wanted);
        for s in samples {
            for _ in 0..wanted {
                interleaved.push(s);
            }
        }
        interleaved
    } else {
        // Keep the first `wanted` channels of each sample group
        samples
            .chunks(device_channels)
            .flat_map(|group| group.iter().take(wanted).copied())
            .collect()
    };

    if tx.try_send(chunk).is_err() {
        tracing::trace!("capture channel full, dropping chunk");
    }
}
