//! Audio playback to speakers
//!
//! All playback goes through a dedicated player thread: cpal streams aren't
//! `Send`, and both the detect loop and upload tasks need to trigger sounds.
//! The [`PlayerHandle`] is a cheap clonable enqueue-only front.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::wav;
use crate::{Error, Result};

/// Commands accepted by the player thread
#[derive(Debug, Clone)]
pub enum PlayRequest {
    /// Play a WAV file from disk
    Play(PathBuf),
    /// Set output volume, 0-100
    SetVolume(u8),
    /// Mute or unmute playback; muted plays are skipped, not failed
    SetMuted(bool),
}

/// Clonable handle that enqueues playback requests
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: Sender<PlayRequest>,
}

impl PlayerHandle {
    /// Create a handle plus the receiving end, without a player thread.
    /// The daemon wires the receiver to [`run_player`]; tests inspect it.
    #[must_use]
    pub fn channel() -> (Self, Receiver<PlayRequest>) {
        let (tx, rx) = channel();
        (Self { tx }, rx)
    }

    /// Spawn the player thread and return its handle
    #[must_use]
    pub fn spawn(volume: u8) -> Self {
        let (handle, rx) = Self::channel();
        std::thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || run_player(&rx, volume))
            .ok();
        handle
    }

    /// Enqueue a WAV file for playback. Best effort; a dead player thread is
    /// logged and ignored.
    pub fn play(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        if self.tx.send(PlayRequest::Play(path.clone())).is_err() {
            tracing::warn!(path = %path.display(), "playback unavailable");
        }
    }

    /// Set output volume, 0-100
    pub fn set_volume(&self, volume: u8) {
        let _ = self.tx.send(PlayRequest::SetVolume(volume.min(100)));
    }

    /// Mute or unmute playback
    pub fn set_muted(&self, muted: bool) {
        let _ = self.tx.send(PlayRequest::SetMuted(muted));
    }
}

/// Drain playback requests until every handle is dropped
fn run_player(rx: &Receiver<PlayRequest>, volume: u8) {
    let mut playback = AudioPlayback::new(volume);

    while let Ok(request) = rx.recv() {
        match request {
            PlayRequest::Play(path) => {
                if let Err(e) = playback.play_wav_file(&path) {
                    tracing::error!(error = %e, path = %path.display(), "playback failed");
                }
            }
            PlayRequest::SetVolume(v) => playback.set_volume(v),
            PlayRequest::SetMuted(m) => playback.set_muted(m),
        }
    }
    tracing::debug!("player thread exiting");
}

/// Plays WAV files to the default output device
///
/// The output stream is rebuilt per file so the device follows each file's
/// sample rate, matching how the codec is reconfigured between the 16 kHz
/// prompts and higher-rate synthesized replies.
pub struct AudioPlayback {
    volume: u8,
    muted: bool,
}

impl AudioPlayback {
    /// Create a playback instance at the given volume (0-100)
    #[must_use]
    pub fn new(volume: u8) -> Self {
        Self {
            volume: volume.min(100),
            muted: false,
        }
    }

    /// Set output volume, 0-100
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        tracing::debug!(volume = self.volume, "volume set");
    }

    /// Mute or unmute playback
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        tracing::debug!(muted, "mute set");
    }

    /// Play a 16-bit PCM WAV file, blocking until it finishes
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or no output device accepts
    /// its sample rate.
    pub fn play_wav_file(&mut self, path: &std::path::Path) -> Result<()> {
        let (info, samples) = wav::read_wav(path)?;

        if self.muted {
            tracing::debug!(path = %path.display(), "muted, skipping playback");
            return Ok(());
        }

        let gain = f32::from(self.volume) / 100.0;
        let mono: Vec<f32> = if info.channels <= 1 {
            samples
                .iter()
                .map(|&s| f32::from(s) / 32768.0 * gain)
                .collect()
        } else {
            samples
                .chunks(info.channels as usize)
                .map(|frame| {
                    let sum: f32 = frame.iter().map(|&s| f32::from(s) / 32768.0).sum();
                    #[allow(clippy::cast_precision_loss)]
                    let avg = sum / frame.len() as f32;
                    avg * gain
                })
                .collect()
        };

        self.play_samples_blocking(&mono, info.sample_rate)?;
        tracing::debug!(path = %path.display(), "playback complete");
        Ok(())
    }

    /// Play mono f32 samples at the given rate, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if no output device supports the sample rate.
    pub fn play_samples_blocking(&self, samples: &[f32], sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .ok_or_else(|| {
                Error::Audio(format!("no output config for {sample_rate} Hz"))
            })?;

        let config: StreamConfig = supported.with_sample_rate(SampleRate(sample_rate)).config();
        let channels = config.channels as usize;

        let queue = Arc::new(Mutex::new((samples.to_vec(), 0usize, false)));
        let queue_cb = Arc::clone(&queue);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut state) = queue_cb.lock() else { return };
                    let (samples, pos, finished) = &mut *state;
                    for frame in data.chunks_mut(channels) {
                        let sample = if *pos < samples.len() {
                            let s = samples[*pos];
                            *pos += 1;
                            s
                        } else {
                            *finished = true;
                            0.0
                        };
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| tracing::error!(error = %err, "audio playback error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (samples.len() as u64 * 1000) / u64::from(sample_rate);
        let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

        loop {
            let done = queue.lock().map(|state| state.2).unwrap_or(true);
            if done || Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        // Let the device drain its last buffer
        std::thread::sleep(Duration::from_millis(100));
        drop(stream);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_enqueues_requests() {
        let (handle, rx) = PlayerHandle::channel();
        handle.play("/tmp/chime.wav");
        handle.set_volume(120);
        handle.set_muted(true);

        match rx.try_recv().unwrap() {
            PlayRequest::Play(path) => assert_eq!(path, PathBuf::from("/tmp/chime.wav")),
            other => panic!("unexpected request: {other:?}"),
        }
        // Volume clamps to 100
        match rx.try_recv().unwrap() {
            PlayRequest::SetVolume(v) => assert_eq!(v, 100),
            other => panic!("unexpected request: {other:?}"),
        }
        assert!(matches!(rx.try_recv().unwrap(), PlayRequest::SetMuted(true)));
    }

    #[test]
    fn muted_playback_succeeds_without_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cue.wav");
        wav::save_wav(&path, &[0, 100, -100], 16_000).unwrap();

        let mut playback = AudioPlayback::new(90);
        playback.set_muted(true);
        playback.play_wav_file(&path).unwrap();
    }
}
