//! Training session — one practice run from microphone to summary.
//!
//! The session owns the audio interface, the utterance stabilizer, the
//! grammar cache and handles to the external collaborators.  Raw blocks go
//! in, upload requests come out; transcription responses come back in (in
//! any order) and settle into finished utterances:
//!
//! ```text
//! blocks ─▶ AudioInterface ─▶ TranscriptionRequest ─▶ service
//!                                                        │
//! FinishedUtterance ◀── UtteranceStabilizer ◀── response ┘
//! ```
//!
//! `end()` folds everything into a [`SessionSummary`] and appends it to the
//! log store.  Responses that arrive after the session ended are ignored.

pub mod events;
pub mod log_store;
pub mod stabilizer;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::audio::{AudioInterface, RecorderError};
use crate::config::AppConfig;
use crate::grammar::{GrammarAnnotator, GrammarChecker, GrammarIssue};
use crate::stream::UploadWindow;
use crate::transcribe::{TranscriptionRequest, TranscriptionResponse, TranscriptionService};

pub use events::{EventBus, LevelSample, LevelTicker, SharedEventBus, Subscription, METER_TICK};
pub use log_store::{JsonFileLogStore, SessionLogStore};
pub use stabilizer::{FinishedUtterance, UtteranceStabilizer};

/// Log-store namespace for training sessions.
pub const SESSION_NAMESPACE: &str = "training";

// ---------------------------------------------------------------------------
// SessionSummary
// ---------------------------------------------------------------------------

/// What one finished session amounted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Total recorded time in milliseconds, pauses excluded.
    pub duration_ms: u64,
    /// Words spoken across all finished utterances.
    pub total_words: u64,
    /// Distinct words across all finished utterances.
    pub distinct_vocabulary: usize,
    /// Mean recognition confidence over all responses.
    pub mean_confidence: f32,
    /// Practice missions assigned this session.
    pub mission_total: usize,
    /// Missions whose target phrase was spoken.
    pub mission_completed: usize,
}

// ---------------------------------------------------------------------------
// TrainingSession
// ---------------------------------------------------------------------------

/// Orchestrates one practice session end to end.
pub struct TrainingSession {
    interface: AudioInterface,
    stabilizer: UtteranceStabilizer,
    annotator: GrammarAnnotator,
    transcription: Arc<dyn TranscriptionService>,
    log_store: Arc<dyn SessionLogStore>,
    missions: Vec<String>,
    mission_completed: usize,
    /// Recording time banked from completed spans.
    recorded: Duration,
    /// Start of the span currently being recorded.
    span_start: Option<Instant>,
    ended: bool,
    /// Summary produced by the first `end()` call.
    summary: Option<SessionSummary>,
}

impl TrainingSession {
    pub fn new(
        config: &AppConfig,
        sample_rate: u32,
        transcription: Arc<dyn TranscriptionService>,
        grammar: Arc<dyn GrammarChecker>,
        log_store: Arc<dyn SessionLogStore>,
    ) -> Self {
        let stabilizer = UtteranceStabilizer::new(config.stream.stabilizer_depth);
        let mut interface = AudioInterface::new(config, sample_rate);
        interface.begin_utterance(stabilizer.utterance_id());

        Self {
            interface,
            stabilizer,
            annotator: GrammarAnnotator::new(grammar, config.grammar.language.clone()),
            transcription,
            log_store,
            missions: Vec::new(),
            mission_completed: 0,
            recorded: Duration::ZERO,
            span_start: None,
            ended: false,
            summary: None,
        }
    }

    /// The audio interface, for input routing and front-panel settings.
    pub fn interface(&mut self) -> &mut AudioInterface {
        &mut self.interface
    }

    /// Handle to the shared transcription service.
    pub fn transcription_handle(&self) -> Arc<dyn TranscriptionService> {
        Arc::clone(&self.transcription)
    }

    /// Target phrases to practice this session.
    pub fn set_missions(&mut self, missions: Vec<String>) {
        self.missions = missions;
    }

    pub fn mission_total(&self) -> usize {
        self.missions.len()
    }

    pub fn mission_completed(&self) -> usize {
        self.mission_completed
    }

    // -----------------------------------------------------------------------
    // Recording control
    // -----------------------------------------------------------------------

    /// Start (or restart) recording.
    ///
    /// Restarting reseeds the stabilizer window and utterance id, so partial
    /// transcripts from before the pause cannot settle a new utterance.
    pub fn start_recording(&mut self) -> Result<(), RecorderError> {
        if self.ended {
            return Err(RecorderError::Closed);
        }

        self.stabilizer.reset();
        self.interface.begin_utterance(self.stabilizer.utterance_id());
        self.interface.start_recording()?;
        self.span_start = Some(Instant::now());
        Ok(())
    }

    /// Pause recording, banking the elapsed span.
    ///
    /// The flush may complete one last upload window; if so it is returned
    /// as a ready-to-submit request.  Pausing reseeds the stabilizer window
    /// and utterance id, so responses still in flight cannot settle the
    /// paused utterance.
    pub fn pause_recording(&mut self) -> Result<Option<TranscriptionRequest>, RecorderError> {
        let window = self.interface.pause_recording()?;
        if let Some(start) = self.span_start.take() {
            self.recorded += start.elapsed();
        }

        self.stabilizer.reset();
        self.interface.begin_utterance(self.stabilizer.utterance_id());
        Ok(window.map(into_request))
    }

    pub fn is_recording(&self) -> bool {
        self.interface.is_recording()
    }

    /// Feed one conditioned-input block; returns any completed upload
    /// requests (usually none or one).
    pub fn handle_block(&mut self, samples: &[f32]) -> Vec<TranscriptionRequest> {
        self.interface
            .handle_block(samples)
            .into_iter()
            .map(into_request)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Response handling
    // -----------------------------------------------------------------------

    /// Fold one transcription response into the session.
    ///
    /// Returns the finished utterance when this response settled one.
    /// Responses arriving after `end()` are silently dropped.
    pub fn handle_response(
        &mut self,
        response: &TranscriptionResponse,
    ) -> Option<FinishedUtterance> {
        if self.ended {
            log::debug!(
                "session ended, dropping late response {}",
                response.file_name
            );
            return None;
        }

        let finished = self.stabilizer.observe(response)?;

        // The settled audio is spent; start the next utterance clean.
        self.interface.begin_utterance(self.stabilizer.utterance_id());
        self.check_mission(&finished.transcript);
        Some(finished)
    }

    fn check_mission(&mut self, transcript: &str) {
        let Some(target) = self.missions.get(self.mission_completed) else {
            return;
        };
        if normalize(transcript) == normalize(target) {
            self.mission_completed += 1;
            log::info!(
                "mission {}/{} completed: {target:?}",
                self.mission_completed,
                self.missions.len()
            );
        }
    }

    /// Grammar issues for a finished transcript, cached per session.
    pub async fn annotate(&mut self, transcript: &str) -> Vec<GrammarIssue> {
        self.annotator.annotate(transcript).await
    }

    /// Displayed partial results, keyed by upload file name.
    pub fn results(&self) -> &[(String, String)] {
        self.stabilizer.results()
    }

    pub fn finished_transcripts(&self) -> &[String] {
        self.stabilizer.finished_transcripts()
    }

    // -----------------------------------------------------------------------
    // End of session
    // -----------------------------------------------------------------------

    /// Finish the session: close the audio path, fold any in-flight
    /// utterance, persist and return the summary.
    ///
    /// Idempotent: a second call returns the first summary without
    /// appending to the log store again.
    pub async fn end(&mut self) -> Result<SessionSummary> {
        if let Some(summary) = &self.summary {
            return Ok(summary.clone());
        }

        if self.interface.is_recording() {
            let _ = self.interface.pause_recording();
        }
        if let Some(start) = self.span_start.take() {
            self.recorded += start.elapsed();
        }
        self.interface.close();
        self.stabilizer.fold_in_flight();
        self.ended = true;

        let summary = SessionSummary {
            duration_ms: self.recorded.as_millis() as u64,
            total_words: self.stabilizer.total_words(),
            distinct_vocabulary: self.stabilizer.distinct_vocabulary(),
            mean_confidence: self.stabilizer.mean_confidence(),
            mission_total: self.missions.len(),
            mission_completed: self.mission_completed,
        };

        self.log_store.append(SESSION_NAMESPACE, &summary).await?;
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    #[cfg(test)]
    pub(crate) fn use_test_input(&mut self, sample_rate: u32) -> Result<(), RecorderError> {
        self.interface.use_test_input(sample_rate)
    }
}

fn into_request(window: UploadWindow) -> TranscriptionRequest {
    TranscriptionRequest {
        utterance_id: window.utterance_id,
        file_name: window.file_name,
        data: window.data,
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Submit one request, folding transport errors into a `failed` response so
/// the stream never aborts on a lost window.
pub async fn submit_request(
    service: &dyn TranscriptionService,
    request: TranscriptionRequest,
) -> TranscriptionResponse {
    let file_name = request.file_name.clone();
    match service.submit(request).await {
        Ok(response) => response,
        Err(e) => {
            log::warn!("upload {file_name} failed: {e}");
            TranscriptionResponse::failed(file_name, e)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
