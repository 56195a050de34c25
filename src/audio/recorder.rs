//! Chunk recorder — turns the conditioned signal into timestamped
//! compressed segments at a fixed slice interval.
//!
//! State machine:
//!
//! ```text
//! Uninitialized ──(source acquired + construction)──▶ Ready
//! Ready ──start()──▶ Recording ──pause()/stop()──▶ Ready
//! any ──close()──▶ Closed   (irreversible)
//! ```
//!
//! Every produced chunk with more than zero bytes is appended to the chunk
//! buffer by the owning interface, which then offers the buffer to the
//! streaming uploader.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Chunk / ChunkBuffer
// ---------------------------------------------------------------------------

/// One fixed-duration compressed audio fragment.
///
/// Immutable once produced; its sequence position is implicit in the buffer
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    bytes: Vec<u8>,
}

impl Chunk {
    /// Wrap already-encoded bytes as a chunk.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Append-only chunk store for one utterance.
///
/// Only the recorder's owner appends, only the uploader reads (through its
/// watermark), and only explicit session control clears.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<Chunk>,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk; zero-byte chunks are dropped.
    pub fn append(&mut self, chunk: Chunk) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    /// Chunks in production order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Discard everything.  The owning interface must reset the uploader
    /// watermark in the same breath.
    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}

// ---------------------------------------------------------------------------
// ChunkEncoding
// ---------------------------------------------------------------------------

/// On-the-wire chunk encodings, tried in preference order at construction
/// like a recorder probing the platform's supported formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEncoding {
    /// 16-bit little-endian PCM.
    Pcm16,
}

impl ChunkEncoding {
    /// Encodings this build can produce, best first.
    pub const SUPPORTED: &'static [ChunkEncoding] = &[ChunkEncoding::Pcm16];

    fn encode(self, samples: &[f32]) -> Vec<u8> {
        match self {
            ChunkEncoding::Pcm16 => {
                let mut out = Vec::with_capacity(samples.len() * 2);
                for &s in samples {
                    let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    out.extend_from_slice(&v.to_le_bytes());
                }
                out
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RecorderError / RecorderState
// ---------------------------------------------------------------------------

/// Errors from recorder construction and state transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecorderError {
    /// None of the preferred encodings is available.  Fatal: the session
    /// cannot record at all.
    #[error("no supported recording format available")]
    NoSupportedFormat,

    /// `start()` called while not in `Ready`.
    #[error("cannot start recording from state {0:?}")]
    NotReady(RecorderState),

    /// `pause()`/`stop()` called while not recording.
    #[error("not currently recording")]
    NotRecording,

    /// Any operation after `close()`.
    #[error("the recorder has been closed")]
    Closed,
}

/// Lifecycle state of a [`ChunkRecorder`].
///
/// `Uninitialized` is the owner's view before a recorder exists (no source
/// routed yet); a constructed recorder starts in `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Uninitialized,
    Ready,
    Recording,
    Closed,
}

// ---------------------------------------------------------------------------
// ChunkRecorder
// ---------------------------------------------------------------------------

/// Slices the conditioned signal into encoded chunks of `time_slice_ms`.
pub struct ChunkRecorder {
    state: RecorderState,
    encoding: ChunkEncoding,
    /// Samples per chunk at the source sample rate.
    samples_per_chunk: usize,
    /// Conditioned samples not yet sliced into a chunk.
    pending: Vec<f32>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl std::fmt::Debug for ChunkRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkRecorder")
            .field("state", &self.state)
            .field("encoding", &self.encoding)
            .field("samples_per_chunk", &self.samples_per_chunk)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl ChunkRecorder {
    /// Construct a recorder for a routed source.
    ///
    /// Probes `preferred` encodings in order and uses the first supported
    /// one, mirroring format negotiation against a platform recorder.
    ///
    /// # Errors
    ///
    /// [`RecorderError::NoSupportedFormat`] when none of `preferred` is
    /// available — the caller must treat the session as unusable.
    pub fn new(
        sample_rate: u32,
        time_slice_ms: u64,
        preferred: &[ChunkEncoding],
    ) -> Result<Self, RecorderError> {
        let encoding = preferred
            .iter()
            .copied()
            .find(|e| ChunkEncoding::SUPPORTED.contains(e))
            .ok_or(RecorderError::NoSupportedFormat)?;

        let samples_per_chunk =
            ((sample_rate as u64 * time_slice_ms) / 1_000).max(1) as usize;

        Ok(Self {
            state: RecorderState::Ready,
            encoding,
            samples_per_chunk,
            pending: Vec::with_capacity(samples_per_chunk),
            on_close: None,
        })
    }

    /// Register a callback fired exactly once when the recorder closes.
    pub fn set_on_close(&mut self, cb: impl FnOnce() + Send + 'static) {
        self.on_close = Some(Box::new(cb));
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Begin producing chunks.  Only valid from `Ready`.
    pub fn start(&mut self) -> Result<(), RecorderError> {
        match self.state {
            RecorderState::Ready => {
                self.state = RecorderState::Recording;
                log::debug!("recorder: ready → recording");
                Ok(())
            }
            RecorderState::Closed => Err(RecorderError::Closed),
            other => Err(RecorderError::NotReady(other)),
        }
    }

    /// Stop producing chunks, flushing any pending partial chunk.
    ///
    /// Returns the flushed chunk when one was pending.
    pub fn pause(&mut self) -> Result<Option<Chunk>, RecorderError> {
        match self.state {
            RecorderState::Recording => {
                self.state = RecorderState::Ready;
                log::debug!("recorder: recording → ready");
                Ok(self.flush_pending())
            }
            RecorderState::Closed => Err(RecorderError::Closed),
            _ => Err(RecorderError::NotRecording),
        }
    }

    /// Close the recorder (irreversible, idempotent).
    ///
    /// All future operations fail with [`RecorderError::Closed`]; the
    /// on-close callback fires exactly once.
    pub fn close(&mut self) {
        if self.state == RecorderState::Closed {
            return;
        }
        self.state = RecorderState::Closed;
        self.pending.clear();

        if let Some(cb) = self.on_close.take() {
            cb();
        }

        log::debug!("recorder: closed");
    }

    /// Feed conditioned samples; returns every full chunk they complete.
    ///
    /// While not recording the samples are discarded — the level meter keeps
    /// running off the graph regardless.
    pub fn push_samples(&mut self, samples: &[f32]) -> Vec<Chunk> {
        if self.state != RecorderState::Recording {
            return Vec::new();
        }

        self.pending.extend_from_slice(samples);

        let mut produced = Vec::new();
        while self.pending.len() >= self.samples_per_chunk {
            let rest = self.pending.split_off(self.samples_per_chunk);
            let slice = std::mem::replace(&mut self.pending, rest);
            produced.push(Chunk {
                bytes: self.encoding.encode(&slice),
            });
        }
        produced
    }

    fn flush_pending(&mut self) -> Option<Chunk> {
        if self.pending.is_empty() {
            return None;
        }
        let slice = std::mem::take(&mut self.pending);
        Some(Chunk {
            bytes: self.encoding.encode(&slice),
        })
    }

    /// Samples that make up one full chunk.
    pub fn samples_per_chunk(&self) -> usize {
        self.samples_per_chunk
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn make_recorder() -> ChunkRecorder {
        // 16 kHz, 10 ms slices → 160 samples per chunk.
        ChunkRecorder::new(16_000, 10, ChunkEncoding::SUPPORTED).expect("recorder")
    }

    #[test]
    fn construction_starts_ready() {
        let rec = make_recorder();
        assert_eq!(rec.state(), RecorderState::Ready);
        assert_eq!(rec.samples_per_chunk(), 160);
    }

    #[test]
    fn no_supported_format_is_fatal() {
        let err = ChunkRecorder::new(16_000, 10, &[]).unwrap_err();
        assert_eq!(err, RecorderError::NoSupportedFormat);
    }

    #[test]
    fn start_requires_ready() {
        let mut rec = make_recorder();
        rec.start().expect("first start");
        let err = rec.start().unwrap_err();
        assert_eq!(err, RecorderError::NotReady(RecorderState::Recording));
    }

    #[test]
    fn pause_requires_recording() {
        let mut rec = make_recorder();
        assert_eq!(rec.pause().unwrap_err(), RecorderError::NotRecording);
    }

    #[test]
    fn chunks_are_sliced_at_the_slice_interval() {
        let mut rec = make_recorder();
        rec.start().expect("start");

        // 400 samples = 2 chunks of 160 + 80 pending.
        let produced = rec.push_samples(&vec![0.25_f32; 400]);
        assert_eq!(produced.len(), 2);
        assert_eq!(produced[0].len(), 160 * 2); // PCM16 = 2 bytes/sample
        assert_eq!(produced[1].len(), 160 * 2);

        // Pause flushes the 80 pending samples as a final partial chunk.
        let flushed = rec.pause().expect("pause").expect("pending chunk");
        assert_eq!(flushed.len(), 80 * 2);
        assert_eq!(rec.state(), RecorderState::Ready);
    }

    #[test]
    fn samples_are_discarded_while_not_recording() {
        let mut rec = make_recorder();
        let produced = rec.push_samples(&vec![0.5_f32; 1_000]);
        assert!(produced.is_empty());
    }

    #[test]
    fn pause_without_pending_returns_none() {
        let mut rec = make_recorder();
        rec.start().expect("start");
        assert!(rec.pause().expect("pause").is_none());
    }

    #[test]
    fn close_is_irreversible_and_idempotent() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);

        let mut rec = make_recorder();
        rec.set_on_close(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        rec.close();
        rec.close(); // second close must be a silent no-op

        assert_eq!(rec.state(), RecorderState::Closed);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(rec.start().unwrap_err(), RecorderError::Closed);
        assert_eq!(rec.pause().unwrap_err(), RecorderError::Closed);
        assert!(rec.push_samples(&[0.1; 200]).is_empty());
    }

    #[test]
    fn pcm16_encoding_round_trips_extremes() {
        let bytes = ChunkEncoding::Pcm16.encode(&[1.0, -1.0, 0.0]);
        assert_eq!(bytes.len(), 6);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), -i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[4], bytes[5]]), 0);
    }

    #[test]
    fn buffer_drops_empty_chunks() {
        let mut buf = ChunkBuffer::new();
        buf.append(Chunk { bytes: vec![] });
        assert!(buf.is_empty());

        buf.append(Chunk { bytes: vec![1, 2] });
        assert_eq!(buf.len(), 1);

        buf.clear();
        assert!(buf.is_empty());
    }
}
