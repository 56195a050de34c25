//! Audio capture and conditioning.
//!
//! Raw input flows from the platform device through a small fixed
//! conditioning chain into fixed-duration encoded chunks:
//!
//! ```text
//! device ─▶ source ─▶ graph (HP → LP → gain) ─▶ recorder ─▶ chunks
//! ```
//!
//! [`interface::AudioInterface`] ties the stages together and is the only
//! type most callers need.

pub mod graph;
pub mod interface;
pub mod recorder;
pub mod source;

pub use graph::{ConditioningGraph, ProcessedBlock};
pub use interface::AudioInterface;
pub use recorder::{Chunk, ChunkBuffer, ChunkEncoding, ChunkRecorder, RecorderError, RecorderState};
pub use source::{AudioSource, SourceError, SourceStream};
