//! The virtual audio interface — conditioning graph + chunk recorder +
//! streaming uploader behind one front panel.
//!
//! One [`AudioInterface`] exists per training session.  It owns the routing
//! of at most one [`AudioSource`] at a time (switching inputs tears down and
//! rebuilds the recorder), exposes the mutable front-panel settings (gain,
//! monitor volume, voice filter) and the derived read-only state
//! (`has_input`, `is_recording`), and fires a state-change notification
//! through the event bus after every mutation.
//!
//! ```text
//! AudioSource ─▶ ConditioningGraph ─▶ ChunkRecorder ─▶ ChunkBuffer
//!                      │                                   │
//!                LevelTicker                        StreamingUploader ─▶ UploadWindow
//! ```

use std::sync::{Arc, Mutex};

use crate::audio::graph::ConditioningGraph;
use crate::audio::recorder::{
    ChunkBuffer, ChunkEncoding, ChunkRecorder, RecorderError, RecorderState,
};
use crate::audio::source::{AudioSource, SourceError, SourceStream};
use crate::config::AppConfig;
use crate::session::events::{EventBus, SharedEventBus};
use crate::stream::uploader::{StreamingUploader, UploadWindow};

// ---------------------------------------------------------------------------
// AudioInterface
// ---------------------------------------------------------------------------

/// Graph, recorder and uploader for one session.
pub struct AudioInterface {
    graph: Arc<Mutex<ConditioningGraph>>,
    bus: SharedEventBus,
    source: Option<AudioSource>,
    recorder: Option<ChunkRecorder>,
    buffer: ChunkBuffer,
    uploader: StreamingUploader,
    monitor_sink: Option<std::sync::mpsc::Sender<Vec<f32>>>,
    time_slice_ms: u64,
    closed: bool,
}

impl AudioInterface {
    /// Build the interface once at session start.
    ///
    /// `sample_rate` is the session's audio-context rate (normally the
    /// acquired source's native rate); the conditioning graph is built once
    /// against it and only retuned if routing later switches rates.
    pub fn new(config: &AppConfig, sample_rate: u32) -> Self {
        Self {
            graph: Arc::new(Mutex::new(ConditioningGraph::new(&config.audio, sample_rate))),
            bus: EventBus::new_shared(),
            source: None,
            recorder: None,
            buffer: ChunkBuffer::new(),
            uploader: StreamingUploader::new(config.stream.window_size),
            monitor_sink: None,
            time_slice_ms: config.stream.time_slice_ms,
            closed: false,
        }
    }

    /// Shared handle to the conditioning graph (for the level ticker).
    pub fn graph_handle(&self) -> Arc<Mutex<ConditioningGraph>> {
        Arc::clone(&self.graph)
    }

    /// Shared handle to the event bus.
    pub fn bus_handle(&self) -> SharedEventBus {
        Arc::clone(&self.bus)
    }

    // -----------------------------------------------------------------------
    // Input routing
    // -----------------------------------------------------------------------

    /// Route a freshly acquired source through the graph.
    ///
    /// Any prior source and recorder are stopped and closed first; the chunk
    /// buffer and upload watermark are reset so the new input starts clean.
    pub fn use_input(&mut self, source: AudioSource) -> Result<(), RecorderError> {
        if self.closed {
            return Err(RecorderError::Closed);
        }

        let sample_rate = source.sample_rate();

        if let Some(mut old) = self.source.take() {
            old.close();
        }
        self.source = Some(source);

        self.graph.lock().unwrap().set_sample_rate(sample_rate);
        self.rebuild_recorder(sample_rate)?;
        self.fire_update();
        Ok(())
    }

    /// Start the hardware stream of the routed source.
    ///
    /// The returned RAII guard must be held (and dropped on close) by the
    /// caller's thread; blocks arriving on `tx` are fed back through
    /// [`handle_block`](Self::handle_block).
    pub fn connect_input(
        &self,
        tx: std::sync::mpsc::Sender<Vec<f32>>,
    ) -> Result<SourceStream, SourceError> {
        match &self.source {
            Some(source) => source.connect(tx),
            None => Err(SourceError::Closed),
        }
    }

    fn rebuild_recorder(&mut self, sample_rate: u32) -> Result<(), RecorderError> {
        if let Some(mut old) = self.recorder.take() {
            old.close();
        }
        self.recorder = Some(ChunkRecorder::new(
            sample_rate,
            self.time_slice_ms,
            ChunkEncoding::SUPPORTED,
        )?);
        self.buffer.clear();
        self.uploader.reset();
        Ok(())
    }

    /// Route a headless input for tests: builds the recorder without a
    /// device so blocks can be fed directly into [`handle_block`].
    #[cfg(test)]
    pub(crate) fn use_test_input(&mut self, sample_rate: u32) -> Result<(), RecorderError> {
        self.graph.lock().unwrap().set_sample_rate(sample_rate);
        self.rebuild_recorder(sample_rate)
    }

    // -----------------------------------------------------------------------
    // Derived state
    // -----------------------------------------------------------------------

    pub fn has_input(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.as_ref().is_some_and(|r| r.is_recording())
    }

    /// Recorder lifecycle state; `Uninitialized` until a source is routed.
    pub fn recorder_state(&self) -> RecorderState {
        if self.closed {
            return RecorderState::Closed;
        }
        self.recorder
            .as_ref()
            .map(|r| r.state())
            .unwrap_or(RecorderState::Uninitialized)
    }

    /// Chunks currently buffered for the in-flight utterance.
    pub fn buffered_chunks(&self) -> usize {
        self.buffer.len()
    }

    /// Upload watermark — chunks already packaged and handed off.
    pub fn streamed_len(&self) -> usize {
        self.uploader.streamed_len()
    }

    // -----------------------------------------------------------------------
    // Front-panel settings (every mutation fires a state notification)
    // -----------------------------------------------------------------------

    pub fn gain(&self) -> f32 {
        self.graph.lock().unwrap().gain()
    }

    pub fn set_gain(&mut self, gain: f32) {
        if self.closed {
            return;
        }
        self.graph.lock().unwrap().set_gain(gain);
        self.fire_update();
    }

    pub fn monitor_volume(&self) -> f32 {
        self.graph.lock().unwrap().monitor_volume()
    }

    pub fn set_monitor_volume(&mut self, volume: f32) {
        if self.closed {
            return;
        }
        self.graph.lock().unwrap().set_monitor_volume(volume);
        self.fire_update();
    }

    /// Route monitor audio (the graph's post-gain copy, scaled by the
    /// monitor volume) to `tx`.  Nothing is sent while the monitor volume
    /// is zero; send errors (receiver dropped) are ignored.
    pub fn set_monitor_sink(&mut self, tx: std::sync::mpsc::Sender<Vec<f32>>) {
        self.monitor_sink = Some(tx);
    }

    pub fn filter_on(&self) -> bool {
        self.graph.lock().unwrap().filter_on()
    }

    pub fn set_filter_on(&mut self, on: bool) {
        if self.closed {
            return;
        }
        let changed = {
            let mut graph = self.graph.lock().unwrap();
            let changed = graph.filter_on() != on;
            graph.set_filter_on(on);
            changed
        };
        if changed {
            self.fire_update();
        }
    }

    // -----------------------------------------------------------------------
    // Recording control
    // -----------------------------------------------------------------------

    /// Begin producing chunks.  Fails unless the recorder is `Ready`.
    pub fn start_recording(&mut self) -> Result<(), RecorderError> {
        let recorder = self
            .recorder
            .as_mut()
            .ok_or(RecorderError::NotReady(RecorderState::Uninitialized))?;
        recorder.start()?;
        self.fire_update();
        Ok(())
    }

    /// Stop producing chunks, flushing the pending partial chunk.
    ///
    /// The flush may complete an upload window; if so it is returned for
    /// submission.
    pub fn pause_recording(&mut self) -> Result<Option<UploadWindow>, RecorderError> {
        let recorder = self.recorder.as_mut().ok_or(RecorderError::NotRecording)?;
        let flushed = recorder.pause()?;

        if let Some(chunk) = flushed {
            self.buffer.append(chunk);
        }
        let window = self.uploader.attempt_flush(&self.buffer);
        self.fire_update();
        Ok(window)
    }

    /// Feed one raw input block through the graph and recorder.
    ///
    /// The monitor copy, when monitoring is on, goes to the registered
    /// monitor sink regardless of recording state.  Returns every upload
    /// window completed by the chunks this block produced (usually none or
    /// one).
    pub fn handle_block(&mut self, samples: &[f32]) -> Vec<UploadWindow> {
        if self.closed {
            return Vec::new();
        }

        let processed = self.graph.lock().unwrap().process(samples);

        if !processed.monitor.is_empty() {
            if let Some(sink) = &self.monitor_sink {
                let _ = sink.send(processed.monitor);
            }
        }

        let Some(recorder) = self.recorder.as_mut() else {
            return Vec::new();
        };

        let mut windows = Vec::new();
        for chunk in recorder.push_samples(&processed.samples) {
            self.buffer.append(chunk);
            if let Some(window) = self.uploader.attempt_flush(&self.buffer) {
                windows.push(window);
            }
        }
        windows
    }

    /// Discard all buffered audio and rewind the upload watermark.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.uploader.reset();
        self.fire_update();
    }

    /// Discard the current utterance's audio and tag subsequent windows
    /// with `utterance_id`.
    pub fn begin_utterance(&mut self, utterance_id: impl Into<String>) {
        self.buffer.clear();
        self.uploader.reset();
        self.uploader.set_utterance_id(utterance_id);
        self.fire_update();
    }

    /// Close everything (irreversible, idempotent): recorder, source, and
    /// all future operations.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(mut recorder) = self.recorder.take() {
            recorder.close();
        }
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        self.fire_update();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn fire_update(&self) {
        self.bus.lock().unwrap().fire_state();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
