//! Upload windowing — fixed-count batching between the chunk buffer and the
//! transcription service.

pub mod uploader;

pub use uploader::{new_utterance_id, StreamingUploader, UploadWindow};
