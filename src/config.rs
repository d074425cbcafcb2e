//! Configuration for the Murmur runtime
//!
//! Defaults ← optional TOML file (partial overlay, every field optional) ←
//! environment variables for secrets. The file lives at
//! `~/.config/murmur/config.toml` unless overridden on the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Capture sample rate (Hz). The recognition service expects 16 kHz mono.
pub const SAMPLE_RATE: u32 = 16_000;

/// Bits per sample for capture and artifacts.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for utterance/response artifacts
    pub data_dir: PathBuf,

    /// Audio capture parameters
    pub capture: CaptureConfig,

    /// Cloud service endpoints and credentials
    pub services: ServicesConfig,

    /// Feedback sound files
    pub sounds: SoundsConfig,

    /// Playback volume, 0-100
    pub volume: u8,

    /// Address used by the connectivity probe (host:port TCP connect)
    pub probe_addr: String,

    /// Seconds between connectivity probes
    pub probe_interval_secs: u64,
}

/// Audio capture parameters
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Samples per frame per channel (32 ms at 16 kHz)
    pub chunk_samples: usize,

    /// Interleaved channels delivered by the microphone hardware
    pub hardware_channels: usize,

    /// Channels the wake front end expects (extra channels zero-filled)
    pub feed_channels: usize,

    /// Maximum recording length per session, seconds
    pub max_record_secs: u64,
}

impl CaptureConfig {
    /// Recording buffer capacity in mono samples
    #[must_use]
    pub fn max_samples(&self) -> usize {
        SAMPLE_RATE as usize * self.max_record_secs as usize
    }

    /// Maximum recording duration
    #[must_use]
    pub fn max_record_duration(&self) -> Duration {
        Duration::from_secs(self.max_record_secs)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chunk_samples: 512,
            hardware_channels: 2,
            feed_channels: 3,
            max_record_secs: 3,
        }
    }
}

/// Cloud service endpoints and credentials
#[derive(Debug, Clone)]
pub struct ServicesConfig {
    /// Speech recognition endpoint (binary audio POST)
    pub stt_url: String,

    /// Bearer token for the recognition service
    pub stt_token: String,

    /// Language model endpoint
    pub llm_url: String,

    /// Bearer token for the language model and TTS endpoints
    pub llm_token: String,

    /// Language model identifier
    pub llm_model: String,

    /// Text-to-speech endpoint
    pub tts_url: String,

    /// TTS model identifier
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// Per-request timeout, seconds
    pub request_timeout_secs: u64,

    /// Weather status endpoint (plaintext `city: temp, condition`), optional
    pub weather_url: Option<String>,
}

impl ServicesConfig {
    /// Per-request timeout as a `Duration`
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            stt_url: "https://api.wit.ai/speech?v=20250528".to_string(),
            stt_token: String::new(),
            llm_url: "https://api.openai.com/v1/responses".to_string(),
            llm_token: String::new(),
            llm_model: "gpt-4.1".to_string(),
            tts_url: "https://api.openai.com/v1/audio/speech".to_string(),
            tts_model: "gpt-4o-mini-tts".to_string(),
            tts_voice: "alloy".to_string(),
            request_timeout_secs: 30,
            weather_url: Some("https://wttr.in/?format=%l:+%t,+%C".to_string()),
        }
    }
}

/// Feedback sound files played at state transitions
#[derive(Debug, Clone)]
pub struct SoundsConfig {
    /// Chime acknowledging a wake word
    pub wake: PathBuf,

    /// Prompt played when a wake word fires while offline
    pub enable_network: PathBuf,

    /// Failure cue when the pipeline could not produce a reply
    pub not_understood: PathBuf,

    /// Played on the offline-to-online connectivity edge
    pub connected: PathBuf,
}

impl SoundsConfig {
    /// Conventional sound file names under a sounds directory
    #[must_use]
    pub fn from_dir(dir: &Path) -> Self {
        Self {
            wake: dir.join("wake.wav"),
            enable_network: dir.join("enable_network.wav"),
            not_understood: dir.join("not_understood.wav"),
            connected: dir.join("connected.wav"),
        }
    }
}

impl Config {
    /// Path to the utterance WAV artifact
    #[must_use]
    pub fn utterance_wav_path(&self) -> PathBuf {
        self.data_dir.join("last_query.wav")
    }

    /// Path to the raw PCM copy of the utterance
    #[must_use]
    pub fn utterance_raw_path(&self) -> PathBuf {
        self.data_dir.join("last_query.raw")
    }

    /// Path the synthesized reply is streamed to
    #[must_use]
    pub fn response_wav_path(&self) -> PathBuf {
        self.data_dir.join("response.wav")
    }

    /// Load configuration, merging the TOML file (if present) and env vars
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed, or if
    /// no data directory can be resolved.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => ConfigFile::read(p)?,
            None => default_config_path()
                .filter(|p| p.exists())
                .map(|p| ConfigFile::read(&p))
                .transpose()?
                .unwrap_or_default(),
        };

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(default_data_dir)
            .ok_or_else(|| Error::Config("could not resolve data directory".to_string()))?;
        std::fs::create_dir_all(&data_dir)?;

        let sounds_dir = file
            .sounds_dir
            .map_or_else(|| data_dir.join("sounds"), PathBuf::from);

        let capture_defaults = CaptureConfig::default();
        let capture = CaptureConfig {
            chunk_samples: file.capture.chunk_samples.unwrap_or(capture_defaults.chunk_samples),
            hardware_channels: file
                .capture
                .hardware_channels
                .unwrap_or(capture_defaults.hardware_channels),
            feed_channels: file.capture.feed_channels.unwrap_or(capture_defaults.feed_channels),
            max_record_secs: file
                .capture
                .max_record_secs
                .unwrap_or(capture_defaults.max_record_secs),
        };

        if capture.chunk_samples == 0 || capture.max_record_secs == 0 {
            return Err(Error::Config(
                "chunk_samples and max_record_secs must be non-zero".to_string(),
            ));
        }
        if capture.feed_channels < capture.hardware_channels {
            return Err(Error::Config(
                "feed_channels must be >= hardware_channels".to_string(),
            ));
        }

        let service_defaults = ServicesConfig::default();
        let services = ServicesConfig {
            stt_url: file.services.stt_url.unwrap_or(service_defaults.stt_url),
            stt_token: std::env::var("MURMUR_STT_TOKEN")
                .ok()
                .or(file.services.stt_token)
                .unwrap_or_default(),
            llm_url: file.services.llm_url.unwrap_or(service_defaults.llm_url),
            llm_token: std::env::var("MURMUR_LLM_TOKEN")
                .ok()
                .or(file.services.llm_token)
                .unwrap_or_default(),
            llm_model: file.services.llm_model.unwrap_or(service_defaults.llm_model),
            tts_url: file.services.tts_url.unwrap_or(service_defaults.tts_url),
            tts_model: file.services.tts_model.unwrap_or(service_defaults.tts_model),
            tts_voice: file.services.tts_voice.unwrap_or(service_defaults.tts_voice),
            request_timeout_secs: file
                .services
                .request_timeout_secs
                .unwrap_or(service_defaults.request_timeout_secs),
            weather_url: file.services.weather_url.or(service_defaults.weather_url),
        };

        Ok(Self {
            sounds: SoundsConfig::from_dir(&sounds_dir),
            data_dir,
            capture,
            services,
            volume: file.volume.unwrap_or(90).min(100),
            probe_addr: file.probe_addr.unwrap_or_else(|| "1.1.1.1:53".to_string()),
            probe_interval_secs: file.probe_interval_secs.unwrap_or(5),
        })
    }
}

/// Default config file location (`~/.config/murmur/config.toml`)
fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "murmur")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "murmur")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Top-level TOML schema; every field is an optional overlay on defaults
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    data_dir: Option<String>,
    sounds_dir: Option<String>,
    volume: Option<u8>,
    probe_addr: Option<String>,
    probe_interval_secs: Option<u64>,

    #[serde(default)]
    capture: CaptureFileConfig,

    #[serde(default)]
    services: ServicesFileConfig,
}

#[derive(Debug, Default, Deserialize)]
struct CaptureFileConfig {
    chunk_samples: Option<usize>,
    hardware_channels: Option<usize>,
    feed_channels: Option<usize>,
    max_record_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServicesFileConfig {
    stt_url: Option<String>,
    stt_token: Option<String>,
    llm_url: Option<String>,
    llm_token: Option<String>,
    llm_model: Option<String>,
    tts_url: Option<String>,
    tts_model: Option<String>,
    tts_voice: Option<String>,
    request_timeout_secs: Option<u64>,
    weather_url: Option<String>,
}

impl ConfigFile {
    fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_defaults() {
        let capture = CaptureConfig::default();
        assert_eq!(capture.max_samples(), 48_000);
        assert_eq!(capture.max_record_duration(), Duration::from_secs(3));
    }

    #[test]
    fn config_file_partial_overlay() {
        let file: ConfigFile = toml::from_str(
            r#"
            volume = 70

            [capture]
            max_record_secs = 5

            [services]
            llm_model = "gpt-4.1-mini"
            "#,
        )
        .unwrap();

        assert_eq!(file.volume, Some(70));
        assert_eq!(file.capture.max_record_secs, Some(5));
        assert_eq!(file.capture.chunk_samples, None);
        assert_eq!(file.services.llm_model.as_deref(), Some("gpt-4.1-mini"));
    }
}
