//! Wire shapes exchanged with the transcription service.
//!
//! The service receives one opaque compressed audio window tagged with an
//! utterance id and answers with a list of hypotheses, best first.  Field
//! names follow the server's JSON (`fileName`, `timeInfo`, `parseError`).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TranscriptionRequest
// ---------------------------------------------------------------------------

/// One upload window on its way to the transcription service.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// Utterance this window belongs to.
    pub utterance_id: String,
    /// Server-visible name for this window; responses echo it back.
    pub file_name: String,
    /// Merged chunk bytes (opaque compressed audio).
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// TranscriptionResponse
// ---------------------------------------------------------------------------

/// Overall verdict of one transcription round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Failed,
}

/// Server-side timing breakdown, echoed for diagnostics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingInfo {
    #[serde(rename = "receiveTime", default)]
    pub receive_time: f64,
    #[serde(rename = "settleTime", default)]
    pub settle_time: f64,
    #[serde(rename = "serverCost", default)]
    pub server_cost: f64,
}

/// One recognition hypothesis.  Only the first (best) entry carries a
/// meaningful confidence; alternatives default to `0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    pub transcript: String,
    #[serde(default)]
    pub confidence: f32,
}

/// Response for one uploaded window.
///
/// `parsed[0]`, when present, is the highest-confidence hypothesis — the one
/// the stabiliser consumes.  Responses may arrive out of order relative to
/// submission; consumers must key updates by `file_name`, never by arrival
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    pub message: ResponseStatus,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "timeInfo", default)]
    pub timing: Option<TimingInfo>,
    #[serde(default)]
    pub parsed: Option<Vec<Hypothesis>>,
    #[serde(rename = "parseError", default)]
    pub parse_error: Option<String>,
}

impl TranscriptionResponse {
    /// Best hypothesis, if the service produced any.
    pub fn top_hypothesis(&self) -> Option<&Hypothesis> {
        self.parsed.as_deref().and_then(|p| p.first())
    }

    /// Synthesize a failed response for a window whose transport failed.
    ///
    /// Upload errors are non-fatal: the window is lost, the error is carried
    /// in `parse_error`, and streaming continues with the next window.
    pub fn failed(file_name: impl Into<String>, error: impl ToString) -> Self {
        Self {
            message: ResponseStatus::Failed,
            file_name: file_name.into(),
            timing: None,
            parsed: None,
            parse_error: Some(error.to_string()),
        }
    }

    /// `true` when the service answered `ok`.
    pub fn is_ok(&self) -> bool {
        self.message == ResponseStatus::Ok
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_server_json() {
        let json = r#"{
            "message": "ok",
            "fileName": "abc123.webm",
            "timeInfo": { "receiveTime": 1.0, "settleTime": 2.0, "serverCost": 0.5 },
            "parsed": [
                { "transcript": "hello world", "confidence": 0.92 },
                { "transcript": "hollow world" }
            ],
            "parseError": null
        }"#;

        let resp: TranscriptionResponse = serde_json::from_str(json).expect("parse");
        assert!(resp.is_ok());
        assert_eq!(resp.file_name, "abc123.webm");

        let top = resp.top_hypothesis().expect("top hypothesis");
        assert_eq!(top.transcript, "hello world");
        assert!((top.confidence - 0.92).abs() < 1e-6);

        // Alternatives carry no confidence — default to 0.0.
        assert_eq!(resp.parsed.as_deref().unwrap()[1].confidence, 0.0);
    }

    #[test]
    fn deserialize_failed_json() {
        let json = r#"{
            "message": "failed",
            "fileName": "abc123.webm",
            "parsed": null,
            "parseError": "decoder gave up"
        }"#;

        let resp: TranscriptionResponse = serde_json::from_str(json).expect("parse");
        assert!(!resp.is_ok());
        assert!(resp.top_hypothesis().is_none());
        assert_eq!(resp.parse_error.as_deref(), Some("decoder gave up"));
    }

    #[test]
    fn synthesized_failure_carries_error() {
        let resp = TranscriptionResponse::failed("w1.pcm", "connection refused");
        assert!(!resp.is_ok());
        assert_eq!(resp.file_name, "w1.pcm");
        assert_eq!(resp.parse_error.as_deref(), Some("connection refused"));
        assert!(resp.top_hypothesis().is_none());
    }

    #[test]
    fn top_hypothesis_empty_list_is_none() {
        let resp = TranscriptionResponse {
            message: ResponseStatus::Ok,
            file_name: "w2.pcm".into(),
            timing: None,
            parsed: Some(vec![]),
            parse_error: None,
        };
        assert!(resp.top_hypothesis().is_none());
    }
}
