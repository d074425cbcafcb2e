//! WAV and raw PCM artifact IO
//!
//! Artifacts are standard RIFF/WAVE: 44-byte header followed by little-endian
//! 16-bit PCM. `hound` emits exactly that layout for integer mono PCM, which
//! keeps the files byte-compatible with playback and external tooling.

use std::path::Path;

use crate::config::BITS_PER_SAMPLE;
use crate::{Error, Result};

/// Parameters read back from a WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Payload size in bytes (the header's `data_size` field)
    pub data_size: u32,
}

/// Write mono samples as a WAV file
///
/// # Errors
///
/// Returns error if the file cannot be created or written.
pub fn save_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let mut i16_writer = writer.get_i16_writer(samples.len() as u32);
    for &sample in samples {
        i16_writer.write_sample(sample);
    }
    i16_writer.flush()?;
    writer.finalize()?;

    tracing::debug!(path = %path.display(), samples = samples.len(), "saved wav artifact");
    Ok(())
}

/// Write the bare little-endian sample stream, no container
///
/// # Errors
///
/// Returns error if the file cannot be written.
pub fn save_raw(path: &Path, samples: &[i16]) -> Result<()> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(path, bytes)?;

    tracing::debug!(path = %path.display(), samples = samples.len(), "saved raw artifact");
    Ok(())
}

/// Read the header fields of a WAV file
///
/// # Errors
///
/// Returns error if the file is missing or not a valid WAV.
pub fn read_wav_info(path: &Path) -> Result<WavInfo> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    Ok(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        data_size: reader.len() * u32::from(spec.bits_per_sample / 8),
    })
}

/// Read a 16-bit PCM WAV file into memory
///
/// # Errors
///
/// Returns error if the file is missing, malformed, or not 16-bit PCM.
pub fn read_wav(path: &Path) -> Result<(WavInfo, Vec<i16>)> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != BITS_PER_SAMPLE {
        return Err(Error::Audio(format!(
            "unsupported wav format: {:?} {} bits",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let info = WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        data_size: (samples.len() * 2) as u32,
    };
    Ok((info, samples))
}
