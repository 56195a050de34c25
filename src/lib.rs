//! Speech-practice capture and streaming-transcription core.
//!
//! The library drives a live microphone through a conditioning chain into
//! fixed-duration chunks, streams the chunks to a transcription service in
//! fixed-count windows, and settles the partial transcripts into finished
//! utterances:
//!
//! ```text
//! cpal input ─▶ ConditioningGraph ─▶ ChunkRecorder ─▶ StreamingUploader
//!                     │                                      │
//!                LevelTicker                       TranscriptionService
//!                                                            │
//!            FinishedUtterance ◀── UtteranceStabilizer ◀─────┘
//! ```
//!
//! [`session::TrainingSession`] ties it all together; `src/main.rs` shows
//! the end-to-end wiring.

pub mod audio;
pub mod config;
pub mod grammar;
pub mod session;
pub mod stream;
pub mod transcribe;
