//! Murmur - on-device voice assistant runtime
//!
//! Murmur listens continuously for a wake word, records the utterance that
//! follows, and runs it through a cloud pipeline: speech recognition, a
//! language model reply, and speech synthesis played back to the user.
//!
//! The audio path runs on dedicated threads with a bounded recording
//! buffer; uploads run as independent async tasks so the device is back to
//! listening as soon as a recording ends.

pub mod audio;
pub mod capture;
pub mod config;
pub mod daemon;
pub mod error;
pub mod net;
pub mod pipeline;
pub mod ui;
pub mod wake;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
