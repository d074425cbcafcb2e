//! Audio hardware and artifact plumbing
//!
//! Frame capture from the microphone, WAV/raw artifact IO, and playback to
//! the speakers via a dedicated player thread.

mod playback;
mod source;
mod wav;

pub use playback::{AudioPlayback, PlayRequest, PlayerHandle};
pub use source::{AudioFrameSource, CpalFrameSource};
pub use wav::{WavInfo, read_wav, read_wav_info, save_raw, save_wav};
