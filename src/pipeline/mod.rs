//! Upload pipeline: recognition, completion, synthesis, playback
//!
//! Each finished utterance runs the full chain as one async task. Requests
//! overlap freely when the user re-wakes the device mid-upload; all state
//! that varies per request lives in the task, never in shared parsers or
//! collectors.

mod llm;
mod stream;
mod stt;
mod tts;

pub use stream::StreamingJsonParser;
pub use stt::{Intent, RecognitionEvent, TranscriptCollector, TranscriptResult, recognize};
pub use llm::complete;
pub use tts::synthesize;

use std::path::PathBuf;
use std::sync::Arc;

use crate::audio::PlayerHandle;
use crate::capture::{UtteranceArtifact, UtteranceSink};
use crate::config::{Config, ServicesConfig, SoundsConfig};
use crate::net::Connectivity;
use crate::ui::UiHandle;
use crate::{Error, Result};

/// Runs one utterance through recognition, completion, and synthesis
pub struct UploadPipeline {
    client: reqwest::Client,
    services: ServicesConfig,
    sounds: SoundsConfig,
    response_path: PathBuf,
    connectivity: Connectivity,
    ui: UiHandle,
    player: PlayerHandle,
}

impl UploadPipeline {
    /// Build the pipeline from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(
        config: &Config,
        connectivity: Connectivity,
        ui: UiHandle,
        player: PlayerHandle,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.services.request_timeout())
            .build()?;

        Ok(Self {
            client,
            services: config.services.clone(),
            sounds: config.sounds.clone(),
            response_path: config.response_wav_path(),
            connectivity,
            ui,
            player,
        })
    }

    /// Run one utterance through the chain, with user feedback on failure
    pub async fn run(&self, artifact: UtteranceArtifact) {
        match self.execute(&artifact).await {
            Ok((transcript, reply)) => {
                self.ui.show_conversation(transcript, reply);
                self.player.play(&self.response_path);
            }
            Err(e) => {
                tracing::warn!(error = %e, "pipeline failed");
                self.ui.show_error("sorry, I didn't catch that");
                self.player.play(&self.sounds.not_understood);
            }
        }
    }

    async fn execute(&self, artifact: &UtteranceArtifact) -> Result<(String, String)> {
        if !self.connectivity.is_online() {
            return Err(Error::Connectivity("offline at upload time".to_string()));
        }

        let wav_bytes = tokio::fs::read(&artifact.wav_path).await?;
        tracing::info!(
            bytes = wav_bytes.len(),
            samples = artifact.sample_count,
            "uploading utterance"
        );

        let transcript = recognize(
            &self.client,
            &self.services.stt_url,
            &self.services.stt_token,
            wav_bytes,
        )
        .await?;

        // Silence recognizes to an empty transcript; treat it like a miss
        if transcript.text.trim().is_empty() {
            return Err(Error::Upload("empty transcript".to_string()));
        }
        if let Some(intent) = &transcript.intent {
            tracing::info!(%intent, "intent matched");
        }

        let reply = complete(
            &self.client,
            &self.services.llm_url,
            &self.services.llm_token,
            &self.services.llm_model,
            &transcript.text,
        )
        .await?;

        synthesize(
            &self.client,
            &self.services.tts_url,
            &self.services.llm_token,
            &self.services.tts_model,
            &self.services.tts_voice,
            &reply,
            &self.response_path,
        )
        .await?;

        Ok((transcript.text, reply))
    }
}

/// Bridges the detect thread to the async runtime
///
/// `submit` spawns one pipeline task per artifact and returns immediately,
/// so the detect loop goes straight back to listening.
pub struct PipelineLauncher {
    pipeline: Arc<UploadPipeline>,
    runtime: tokio::runtime::Handle,
}

impl PipelineLauncher {
    #[must_use]
    pub fn new(pipeline: Arc<UploadPipeline>, runtime: tokio::runtime::Handle) -> Self {
        Self { pipeline, runtime }
    }
}

impl UtteranceSink for PipelineLauncher {
    fn submit(&self, artifact: UtteranceArtifact) {
        let pipeline = Arc::clone(&self.pipeline);
        self.runtime.spawn(async move {
            pipeline.run(artifact).await;
            tracing::debug!("pipeline task complete");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::ui::UiEvent;

    fn test_pipeline(connectivity: Connectivity) -> (UploadPipeline, TestEnds) {
        let dir = tempfile::tempdir().unwrap();
        let (ui, ui_rx) = UiHandle::channel();
        let (player, player_rx) = PlayerHandle::channel();

        let pipeline = UploadPipeline {
            client: reqwest::Client::new(),
            services: ServicesConfig::default(),
            sounds: SoundsConfig::from_dir(dir.path()),
            response_path: dir.path().join("response.wav"),
            connectivity,
            ui,
            player,
        };
        (pipeline, TestEnds { ui_rx, player_rx, _dir: dir })
    }

    struct TestEnds {
        ui_rx: std::sync::mpsc::Receiver<UiEvent>,
        player_rx: std::sync::mpsc::Receiver<crate::audio::PlayRequest>,
        _dir: tempfile::TempDir,
    }

    fn artifact() -> UtteranceArtifact {
        UtteranceArtifact {
            wav_path: PathBuf::from("/nonexistent/query.wav"),
            raw_path: PathBuf::from("/nonexistent/query.raw"),
            sample_count: 0,
            sample_rate: 16_000,
        }
    }

    #[tokio::test]
    async fn offline_upload_plays_failure_cue() {
        let (pipeline, ends) = test_pipeline(Connectivity::new());
        pipeline.run(artifact()).await;

        assert!(matches!(ends.ui_rx.try_recv().unwrap(), UiEvent::Error(_)));
        match ends.player_rx.try_recv().unwrap() {
            crate::audio::PlayRequest::Play(path) => {
                assert!(path.ends_with("not_understood.wav"));
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_artifact_is_reported_as_failure() {
        let connectivity = Connectivity::new();
        connectivity.set_online(true);
        let (pipeline, ends) = test_pipeline(connectivity);

        pipeline.run(artifact()).await;
        assert!(matches!(ends.ui_rx.try_recv().unwrap(), UiEvent::Error(_)));
    }
}
