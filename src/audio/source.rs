//! Microphone acquisition via `cpal`.
//!
//! [`AudioSource`] wraps the cpal host/device lifecycle.  Call
//! [`AudioSource::acquire`] to request exclusive access to the default input
//! device, then [`AudioSource::connect`] to start streaming mono `f32`
//! blocks over an mpsc channel.  The returned [`SourceStream`] is a RAII
//! guard — dropping it stops the underlying cpal stream.
//!
//! Acquisition failures map to a fixed taxonomy ([`SourceError`]), each with
//! its own user-facing message.  Every failure leaves the adapter closed; a
//! caller that wants to try again must acquire a fresh [`AudioSource`].

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// SourceError
// ---------------------------------------------------------------------------

/// Device acquisition/streaming failure taxonomy.
///
/// Each variant carries the platform's own description so the UI can show a
/// blocking advisory keyed by error kind.  None of these are retried
/// automatically.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("microphone access was interrupted and the device cannot be used: {0}")]
    Aborted(String),

    #[error("microphone access was denied — check your privacy settings: {0}")]
    NotAllowed(String),

    #[error("no input device matching the request was found")]
    NotFound,

    #[error("the input device exists but cannot be read: {0}")]
    NotReadable(String),

    #[error("the requested stream configuration cannot be satisfied by the device: {0}")]
    Overconstrained(String),

    #[error("microphone access is blocked by a security policy: {0}")]
    Security(String),

    #[error("the stream was requested with malformed parameters: {0}")]
    InvalidConstraints(String),

    #[error("unknown audio device error: {0}")]
    Unknown(String),

    #[error("the audio source has been closed")]
    Closed,
}

/// Classify a backend-specific error description into the taxonomy.
///
/// cpal collapses most OS-level failures into backend strings; we recover
/// the distinction the way the platform reports it.
fn classify_backend(desc: &str) -> SourceError {
    let lower = desc.to_ascii_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        SourceError::NotAllowed(desc.to_string())
    } else if lower.contains("security") || lower.contains("policy") {
        SourceError::Security(desc.to_string())
    } else if lower.contains("abort") {
        SourceError::Aborted(desc.to_string())
    } else if lower.contains("busy") || lower.contains("in use") {
        SourceError::NotReadable(desc.to_string())
    } else {
        SourceError::Unknown(desc.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for SourceError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                SourceError::NotReadable("device is no longer available".into())
            }
            cpal::DefaultStreamConfigError::StreamTypeNotSupported => {
                SourceError::Overconstrained("input streams are not supported".into())
            }
            cpal::DefaultStreamConfigError::BackendSpecific { err } => {
                classify_backend(&err.description)
            }
        }
    }
}

impl From<cpal::BuildStreamError> for SourceError {
    fn from(e: cpal::BuildStreamError) -> Self {
        match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                SourceError::NotReadable("device is no longer available".into())
            }
            cpal::BuildStreamError::StreamConfigNotSupported => {
                SourceError::Overconstrained("stream configuration not supported".into())
            }
            cpal::BuildStreamError::InvalidArgument => {
                SourceError::InvalidConstraints("invalid stream argument".into())
            }
            cpal::BuildStreamError::StreamIdOverflow => {
                SourceError::Unknown("stream ID overflow".into())
            }
            cpal::BuildStreamError::BackendSpecific { err } => classify_backend(&err.description),
        }
    }
}

impl From<cpal::PlayStreamError> for SourceError {
    fn from(e: cpal::PlayStreamError) -> Self {
        match e {
            cpal::PlayStreamError::DeviceNotAvailable => {
                SourceError::NotReadable("device is no longer available".into())
            }
            cpal::PlayStreamError::BackendSpecific { err } => classify_backend(&err.description),
        }
    }
}

// ---------------------------------------------------------------------------
// SourceStream
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value stops the underlying hardware stream.  The guard is
/// intentionally kept outside [`AudioSource`] because `cpal::Stream` is not
/// `Send` on all platforms — the owning thread holds it.
pub struct SourceStream {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// AudioSource
// ---------------------------------------------------------------------------

/// Exclusive handle to one input device.
///
/// The handle never reopens after [`close`](Self::close): once closed it is
/// permanently disabled and a new handle must be acquired instead.
pub struct AudioSource {
    device: cpal::Device,
    config: cpal::StreamConfig,
    /// Native sample rate reported by the device (Hz).
    sample_rate: u32,
    /// Number of interleaved channels reported by the device.
    channels: u16,
    closed: bool,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl AudioSource {
    /// Request exclusive access to the default audio input device.
    ///
    /// Queries the device's preferred stream configuration so no manual
    /// configuration is required.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotFound`] when no input device is available,
    /// or a classified [`SourceError`] when the device cannot report a
    /// default stream configuration.
    pub fn acquire() -> Result<Self, SourceError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(SourceError::NotFound)?;

        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
            closed: false,
            on_close: None,
        })
    }

    /// Register a callback fired exactly once when the source is closed.
    pub fn set_on_close(&mut self, cb: impl FnOnce() + Send + 'static) {
        self.on_close = Some(Box::new(cb));
    }

    /// Start streaming and send mono `f32` blocks to `tx`.
    ///
    /// The cpal callback runs on a dedicated audio thread; interleaved
    /// channels are downmixed to mono before forwarding.  Send errors
    /// (receiver dropped) are silently ignored so the audio thread never
    /// panics.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Closed`] on a closed source, or a classified
    /// device error if the platform rejects the stream.
    pub fn connect(&self, tx: mpsc::Sender<Vec<f32>>) -> Result<SourceStream, SourceError> {
        if self.closed {
            return Err(SourceError::Closed);
        }

        let channels = self.channels as usize;

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let block: Vec<f32> = if channels <= 1 {
                    data.to_vec()
                } else {
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                        .collect()
                };
                // Ignore send errors; the receiver may have been dropped.
                let _ = tx.send(block);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None, // no timeout
        )?;

        stream.play()?;
        Ok(SourceStream { _stream: stream })
    }

    /// Close the source (irreversible, idempotent).
    ///
    /// The first call flips the handle to closed and fires the on-close
    /// callback; subsequent calls are no-ops.  The hardware stream itself
    /// stops when the matching [`SourceStream`] guard is dropped.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(cb) = self.on_close.take() {
            cb();
        }

        log::debug!("audio source closed");
    }

    /// `true` once [`close`](Self::close) has been called (or acquisition
    /// failed) — the handle can never stream again.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Native sample rate of the capture stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels delivered by the device.
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_classification_permission() {
        let err = classify_backend("Permission denied by the user");
        assert!(matches!(err, SourceError::NotAllowed(_)));
    }

    #[test]
    fn backend_classification_security() {
        let err = classify_backend("blocked by security policy");
        assert!(matches!(err, SourceError::Security(_)));
    }

    #[test]
    fn backend_classification_busy() {
        let err = classify_backend("device is busy");
        assert!(matches!(err, SourceError::NotReadable(_)));
    }

    #[test]
    fn backend_classification_unknown() {
        let err = classify_backend("something exotic happened");
        assert!(matches!(err, SourceError::Unknown(_)));
    }

    #[test]
    fn config_errors_map_to_taxonomy() {
        let e: SourceError = cpal::DefaultStreamConfigError::DeviceNotAvailable.into();
        assert!(matches!(e, SourceError::NotReadable(_)));

        let e: SourceError = cpal::BuildStreamError::InvalidArgument.into();
        assert!(matches!(e, SourceError::InvalidConstraints(_)));

        let e: SourceError = cpal::BuildStreamError::StreamConfigNotSupported.into();
        assert!(matches!(e, SourceError::Overconstrained(_)));
    }

    /// Messages must be distinct per kind so the UI advisory is meaningful.
    #[test]
    fn error_messages_are_distinct() {
        let msgs = [
            SourceError::Aborted("x".into()).to_string(),
            SourceError::NotAllowed("x".into()).to_string(),
            SourceError::NotFound.to_string(),
            SourceError::NotReadable("x".into()).to_string(),
            SourceError::Overconstrained("x".into()).to_string(),
            SourceError::Security("x".into()).to_string(),
            SourceError::InvalidConstraints("x".into()).to_string(),
            SourceError::Unknown("x".into()).to_string(),
        ];
        for (i, a) in msgs.iter().enumerate() {
            for b in msgs.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
