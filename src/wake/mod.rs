//! Acoustic front end and wake detection
//!
//! The front end sits between raw microphone frames and wake/no-wake
//! decisions. It is split into two single-producer/single-consumer halves:
//! the feed task pushes conditioned frames in through [`FeedHalf::feed`], the
//! detect task polls decisions out through [`DetectHalf::fetch`].
//!
//! The classifier itself is a pluggable boundary ([`WakeClassifier`]); the
//! built-in [`EnergyClassifier`] is a sustained-energy stand-in for a vendor
//! wake-word model.

use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

use crate::config::CaptureConfig;
use crate::{Error, Result};

/// Minimum RMS energy (on normalized samples) to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Sustained speech needed to trigger (0.3 s at 16 kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Silence needed to re-arm after a trigger (0.5 s at 16 kHz)
const REARM_SILENCE_SAMPLES: usize = 8000;

/// Pending detection events; wake events are rare, a small bound suffices
const EVENT_QUEUE: usize = 32;

/// Outcome of one fetch cycle, consumed immediately by the detect loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionResult {
    /// Nothing to report this cycle
    NoEvent,
    /// The wake word fired
    WakeDetected,
    /// Transient classifier failure; discard and retry next cycle
    Error(String),
}

/// Wake/no-wake decision over one conditioned multi-channel frame
pub trait WakeClassifier: Send {
    /// Classify an interleaved frame laid out as `channels` channels.
    /// Returns `true` exactly once per wake event.
    ///
    /// # Errors
    ///
    /// Returns error on malformed input; the caller discards and retries.
    fn classify(&mut self, frame: &[i16], channels: usize) -> Result<bool>;
}

/// Build the front end pair for the given capture layout
#[must_use]
pub fn frontend(
    config: &CaptureConfig,
    classifier: Box<dyn WakeClassifier>,
) -> (FeedHalf, DetectHalf) {
    let (tx, rx) = sync_channel(EVENT_QUEUE);
    let feed = FeedHalf {
        chunk_samples: config.chunk_samples,
        hardware_channels: config.hardware_channels,
        feed_channels: config.feed_channels,
        feed_buf: vec![0; config.chunk_samples * config.feed_channels],
        classifier,
        tx,
    };
    (feed, DetectHalf { rx })
}

/// Producer half, owned by the feed task
pub struct FeedHalf {
    chunk_samples: usize,
    hardware_channels: usize,
    feed_channels: usize,
    feed_buf: Vec<i16>,
    classifier: Box<dyn WakeClassifier>,
    tx: SyncSender<DetectionResult>,
}

impl FeedHalf {
    /// Submit one hardware frame for conditioning and classification
    ///
    /// Remaps the interleaved hardware layout into the wider layout the
    /// classifier expects, zero-filling the extra channels. The frame is
    /// borrowed for this call only.
    pub fn feed(&mut self, frame: &[i16]) {
        if frame.len() != self.chunk_samples * self.hardware_channels {
            self.emit(DetectionResult::Error(format!(
                "frame length {} != {} samples x {} channels",
                frame.len(),
                self.chunk_samples,
                self.hardware_channels
            )));
            return;
        }

        for i in 0..self.chunk_samples {
            for c in 0..self.hardware_channels {
                self.feed_buf[i * self.feed_channels + c] = frame[i * self.hardware_channels + c];
            }
            for c in self.hardware_channels..self.feed_channels {
                self.feed_buf[i * self.feed_channels + c] = 0;
            }
        }

        match self.classifier.classify(&self.feed_buf, self.feed_channels) {
            Ok(true) => self.emit(DetectionResult::WakeDetected),
            Ok(false) => {}
            Err(e) => self.emit(DetectionResult::Error(e.to_string())),
        }
    }

    fn emit(&self, result: DetectionResult) {
        match self.tx.try_send(result) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(result)) => {
                tracing::warn!(?result, "detection queue full, dropping event");
            }
        }
    }
}

/// Consumer half, owned by the detect task
pub struct DetectHalf {
    rx: Receiver<DetectionResult>,
}

impl DetectHalf {
    /// Poll for the latest classification; never blocks
    #[must_use]
    pub fn fetch(&self) -> DetectionResult {
        match self.rx.try_recv() {
            Ok(result) => result,
            Err(std::sync::mpsc::TryRecvError::Empty) => DetectionResult::NoEvent,
            Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                DetectionResult::Error("front end feed closed".to_string())
            }
        }
    }
}

/// Sustained-energy wake detector
///
/// Fires once speech energy holds above the threshold long enough, then
/// stays quiet until a stretch of silence re-arms it, so one utterance
/// produces one event.
pub struct EnergyClassifier {
    threshold: f32,
    min_speech_samples: usize,
    rearm_silence_samples: usize,
    speech_run: usize,
    silence_run: usize,
    armed: bool,
}

impl EnergyClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::with_threshold(ENERGY_THRESHOLD)
    }

    #[must_use]
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold,
            min_speech_samples: MIN_SPEECH_SAMPLES,
            rearm_silence_samples: REARM_SILENCE_SAMPLES,
            speech_run: 0,
            silence_run: 0,
            armed: true,
        }
    }
}

impl Default for EnergyClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeClassifier for EnergyClassifier {
    fn classify(&mut self, frame: &[i16], channels: usize) -> Result<bool> {
        if channels == 0 || frame.len() % channels != 0 {
            return Err(Error::Classifier(format!(
                "frame length {} not divisible into {} channels",
                frame.len(),
                channels
            )));
        }

        // Reference channel only; the rest are conditioning inputs
        let energy = reference_energy(frame, channels);
        let samples = frame.len() / channels;

        if energy > self.threshold {
            self.speech_run += samples;
            self.silence_run = 0;
        } else {
            self.silence_run += samples;
            if self.silence_run >= self.rearm_silence_samples {
                self.armed = true;
                self.speech_run = 0;
            }
        }

        if self.armed && self.speech_run >= self.min_speech_samples {
            self.armed = false;
            self.speech_run = 0;
            tracing::debug!(energy, "wake trigger");
            return Ok(true);
        }
        Ok(false)
    }
}

/// RMS energy of channel 0, normalized to [-1, 1]
#[allow(clippy::cast_precision_loss)]
fn reference_energy(frame: &[i16], channels: usize) -> f32 {
    let count = frame.len() / channels;
    if count == 0 {
        return 0.0;
    }
    let sum_squares: f32 = frame
        .iter()
        .step_by(channels)
        .map(|&s| {
            let x = f32::from(s) / 32768.0;
            x * x
        })
        .sum();
    (sum_squares / count as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    /// Records the frames it sees, triggers when the reference channel
    /// carries the sentinel amplitude.
    struct Probe {
        seen: Arc<Mutex<Vec<Vec<i16>>>>,
        sentinel: i16,
    }

    impl Probe {
        fn new(sentinel: i16) -> (Self, Arc<Mutex<Vec<Vec<i16>>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            (Self { seen: Arc::clone(&seen), sentinel }, seen)
        }
    }

    impl WakeClassifier for Probe {
        fn classify(&mut self, frame: &[i16], channels: usize) -> Result<bool> {
            self.seen.lock().unwrap().push(frame.to_vec());
            Ok(frame.iter().step_by(channels).any(|&s| s == self.sentinel))
        }
    }

    fn test_config() -> CaptureConfig {
        CaptureConfig {
            chunk_samples: 4,
            hardware_channels: 2,
            feed_channels: 3,
            max_record_secs: 3,
        }
    }

    #[test]
    fn wake_event_reaches_fetch() {
        let (probe, _seen) = Probe::new(i16::MAX);
        let (mut feed, fetch) = frontend(&test_config(), Box::new(probe));

        // 4 samples x 2 channels interleaved, no sentinel
        feed.feed(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(fetch.fetch(), DetectionResult::NoEvent);

        feed.feed(&[i16::MAX, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(fetch.fetch(), DetectionResult::WakeDetected);
    }

    #[test]
    fn remapped_layout_interleaves_and_pads() {
        let (probe, seen) = Probe::new(99);
        let (mut feed, _fetch) = frontend(&test_config(), Box::new(probe));
        feed.feed(&[10, 20, 11, 21, 12, 22, 13, 23]);

        let frames = seen.lock().unwrap();
        assert_eq!(frames[0], vec![10, 20, 0, 11, 21, 0, 12, 22, 0, 13, 23, 0]);
    }

    #[test]
    fn short_frame_is_error_event() {
        let (probe, _seen) = Probe::new(0);
        let (mut feed, fetch) = frontend(&test_config(), Box::new(probe));

        feed.feed(&[1, 2, 3]);
        assert!(matches!(fetch.fetch(), DetectionResult::Error(_)));
        // Non-fatal: next well-formed frame classifies normally
        feed.feed(&[1; 8]);
        assert!(matches!(fetch.fetch(), DetectionResult::NoEvent));
    }

    #[test]
    fn fetch_without_events_is_no_event() {
        let (probe, _seen) = Probe::new(0);
        let (_feed, fetch) = frontend(&test_config(), Box::new(probe));
        assert_eq!(fetch.fetch(), DetectionResult::NoEvent);
    }

    #[test]
    fn energy_classifier_fires_once_per_utterance() {
        let mut classifier = EnergyClassifier::with_threshold(0.01);
        let loud = vec![8000i16; 1600]; // 100 ms of speech energy, mono
        let quiet = vec![0i16; 1600];

        let mut fired = 0;
        for _ in 0..10 {
            if classifier.classify(&loud, 1).unwrap() {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);

        // Continued speech does not re-trigger
        for _ in 0..10 {
            assert!(!classifier.classify(&loud, 1).unwrap());
        }

        // Silence re-arms, speech fires again
        for _ in 0..6 {
            assert!(!classifier.classify(&quiet, 1).unwrap());
        }
        let mut fired = 0;
        for _ in 0..10 {
            if classifier.classify(&loud, 1).unwrap() {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn energy_classifier_rejects_ragged_frame() {
        let mut classifier = EnergyClassifier::new();
        assert!(classifier.classify(&[1, 2, 3], 2).is_err());
    }
}
