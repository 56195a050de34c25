//! `TranscriptionService` trait and HTTP implementation.
//!
//! The core only depends on the request/response shape and its asynchronous
//! round-trip contract; the transport is this boundary's implementation
//! detail.  `HttpTranscriptionService` posts each window as a multipart form
//! to `{base_url}/parse`.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::TranscriptionConfig;
use crate::transcribe::types::{TranscriptionRequest, TranscriptionResponse};

// ---------------------------------------------------------------------------
// TranscribeError
// ---------------------------------------------------------------------------

/// Errors from one transcription round trip.
///
/// These never abort the stream: callers fold them into a synthesized
/// `failed` response (see [`TranscriptionResponse::failed`]) and continue
/// with the next window.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// HTTP transport or connection error.
    #[error("transcription request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("transcription request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse transcription response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for TranscribeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TranscribeError::Timeout
        } else if e.is_decode() {
            TranscribeError::Parse(e.to_string())
        } else {
            TranscribeError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptionService trait
// ---------------------------------------------------------------------------

/// Async trait for the external speech-to-text collaborator.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn TranscriptionService>`).
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn submit(
        &self,
        request: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, TranscribeError>;
}

// ---------------------------------------------------------------------------
// HttpTranscriptionService
// ---------------------------------------------------------------------------

/// Posts audio windows to an HTTP transcription endpoint as multipart forms.
pub struct HttpTranscriptionService {
    client: reqwest::Client,
    config: TranscriptionConfig,
}

impl HttpTranscriptionService {
    /// Build a service handle from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl TranscriptionService for HttpTranscriptionService {
    async fn submit(
        &self,
        request: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, TranscribeError> {
        let url = format!("{}/parse", self.config.base_url);

        let part = reqwest::multipart::Part::bytes(request.data)
            .file_name(request.file_name.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| TranscribeError::Request(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .text("fileName", request.file_name.clone())
            .text("utteranceId", request.utterance_id.clone())
            .part("audio", part);

        log::debug!(
            "transcribe: submitting window {} (utterance {})",
            request.file_name,
            request.utterance_id
        );

        let response = self.client.post(&url).multipart(form).send().await?;

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::Parse(e.to_string()))?;

        Ok(parsed)
    }
}

// ---------------------------------------------------------------------------
// MockTranscriptionService  (test double)
// ---------------------------------------------------------------------------

/// Scripted service for tests: replays canned transcripts in order and
/// records every submitted request.
#[cfg(test)]
pub struct MockTranscriptionService {
    transcripts: std::sync::Mutex<std::collections::VecDeque<String>>,
    pub submitted: std::sync::Mutex<Vec<(String, usize)>>,
}

#[cfg(test)]
impl MockTranscriptionService {
    pub fn replaying<I: IntoIterator<Item = S>, S: Into<String>>(transcripts: I) -> Self {
        Self {
            transcripts: std::sync::Mutex::new(
                transcripts.into_iter().map(Into::into).collect(),
            ),
            submitted: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl TranscriptionService for MockTranscriptionService {
    async fn submit(
        &self,
        request: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, TranscribeError> {
        self.submitted
            .lock()
            .unwrap()
            .push((request.file_name.clone(), request.data.len()));

        let next = self.transcripts.lock().unwrap().pop_front();
        match next {
            Some(text) => Ok(TranscriptionResponse {
                message: crate::transcribe::types::ResponseStatus::Ok,
                file_name: request.file_name,
                timing: None,
                parsed: Some(vec![crate::transcribe::types::Hypothesis {
                    transcript: text,
                    confidence: 0.9,
                }]),
                parse_error: None,
            }),
            None => Err(TranscribeError::Request("script exhausted".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> TranscriptionConfig {
        TranscriptionConfig {
            base_url: "http://localhost:4000".into(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _service = HttpTranscriptionService::from_config(&make_config());
    }

    /// Verify the service is object-safe (usable as `dyn TranscriptionService`).
    #[test]
    fn service_is_object_safe() {
        let service: Box<dyn TranscriptionService> =
            Box::new(HttpTranscriptionService::from_config(&make_config()));
        drop(service);
    }

    #[tokio::test]
    async fn mock_replays_in_order_and_records_requests() {
        let mock = MockTranscriptionService::replaying(["one", "two"]);

        let first = mock
            .submit(TranscriptionRequest {
                utterance_id: "u1".into(),
                file_name: "a.pcm".into(),
                data: vec![0; 16],
            })
            .await
            .expect("first");
        assert_eq!(first.top_hypothesis().unwrap().transcript, "one");

        let second = mock
            .submit(TranscriptionRequest {
                utterance_id: "u1".into(),
                file_name: "b.pcm".into(),
                data: vec![0; 32],
            })
            .await
            .expect("second");
        assert_eq!(second.top_hypothesis().unwrap().transcript, "two");

        let submitted = mock.submitted.lock().unwrap();
        assert_eq!(&submitted[..], &[("a.pcm".into(), 16), ("b.pcm".into(), 32)]);
    }

    #[tokio::test]
    async fn mock_errors_once_script_is_exhausted() {
        let mock = MockTranscriptionService::replaying(Vec::<String>::new());
        let err = mock
            .submit(TranscriptionRequest {
                utterance_id: "u1".into(),
                file_name: "a.pcm".into(),
                data: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TranscribeError::Request(_)));
    }
}
