//! Transcription service boundary.
//!
//! The speech-to-text engine is an external collaborator reachable through a
//! request/response contract: the core sends opaque audio windows tagged
//! with an utterance id and consumes hypothesis lists, best first.
//!
//! ```text
//! StreamingUploader ──▶ TranscriptionRequest ──▶ TranscriptionService
//!                                                       │
//! UtteranceStabilizer ◀── TranscriptionResponse ◀───────┘
//! ```

pub mod client;
pub mod types;

pub use client::{HttpTranscriptionService, TranscribeError, TranscriptionService};
pub use types::{
    Hypothesis, ResponseStatus, TimingInfo, TranscriptionRequest, TranscriptionResponse,
};

// test-only re-export so other test modules can import the mock without
// `use speech_trainer::transcribe::client::MockTranscriptionService`.
#[cfg(test)]
pub use client::MockTranscriptionService;
