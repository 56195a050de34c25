//! Streaming uploader — slices the chunk buffer into fixed-count windows.
//!
//! The uploader tracks a single watermark (`streamed_len`) into the
//! append-only chunk buffer: everything before it has been packaged and
//! handed off, everything after is still accumulating.  Slicing by fixed
//! chunk count rather than elapsed time keeps payload sizes predictable and
//! decouples slice-interval tuning from window-size tuning.
//!
//! Delivery is at-least-once for *distinct* windows: no chunk is ever
//! packaged twice, none is skipped, and a failed send is never retried (the
//! window is lost, streaming continues).

use uuid::Uuid;

use crate::audio::recorder::ChunkBuffer;

// ---------------------------------------------------------------------------
// UploadWindow
// ---------------------------------------------------------------------------

/// A fixed-count batch of chunks merged into one opaque payload, ready for
/// the transcription service.
#[derive(Debug, Clone)]
pub struct UploadWindow {
    /// Utterance the audio belongs to.
    pub utterance_id: String,
    /// Unique name for this window; the service echoes it back so responses
    /// can be matched regardless of arrival order.
    pub file_name: String,
    /// Merged chunk bytes.
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// StreamingUploader
// ---------------------------------------------------------------------------

/// Watermark bookkeeping between the chunk buffer and the network.
pub struct StreamingUploader {
    window_size: usize,
    streamed_len: usize,
    utterance_id: String,
}

impl StreamingUploader {
    /// Create an uploader emitting windows of `window_size` chunks.
    ///
    /// # Panics
    ///
    /// Panics if `window_size == 0`.
    pub fn new(window_size: usize) -> Self {
        assert!(window_size > 0, "window_size must be > 0");
        Self {
            window_size,
            streamed_len: 0,
            utterance_id: new_utterance_id(),
        }
    }

    /// Package the next full window, if one has accumulated.
    ///
    /// Compares `streamed_len + window_size` against the buffer length; when
    /// the buffer is still short this is a no-op returning `None`.
    /// Otherwise exactly `window_size` chunks starting at the watermark are
    /// merged, and the watermark advances by `window_size`.
    pub fn attempt_flush(&mut self, buffer: &ChunkBuffer) -> Option<UploadWindow> {
        let next_cursor = self.streamed_len + self.window_size;
        if buffer.len() < next_cursor {
            return None;
        }

        let slice = &buffer.chunks()[self.streamed_len..next_cursor];
        self.streamed_len = next_cursor;

        let mut data = Vec::with_capacity(slice.iter().map(|c| c.len()).sum());
        for chunk in slice {
            data.extend_from_slice(chunk.bytes());
        }

        let window = UploadWindow {
            utterance_id: self.utterance_id.clone(),
            file_name: format!("{}.pcm", Uuid::new_v4().simple()),
            data,
        };

        log::debug!(
            "uploader: packaged window {} ({} chunks, watermark now {})",
            window.file_name,
            self.window_size,
            self.streamed_len
        );

        Some(window)
    }

    /// Reset the watermark after the buffer has been cleared.
    pub fn reset(&mut self) {
        self.streamed_len = 0;
    }

    /// Tag subsequent windows with a new utterance id.
    pub fn set_utterance_id(&mut self, id: impl Into<String>) {
        self.utterance_id = id.into();
    }

    /// How many chunks have been packaged so far.
    pub fn streamed_len(&self) -> usize {
        self.streamed_len
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn utterance_id(&self) -> &str {
        &self.utterance_id
    }
}

/// Mint a fresh random utterance id.
pub fn new_utterance_id() -> String {
    Uuid::new_v4().simple().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
