//! Utterance stabilizer — decides when a stream of partial transcripts has
//! settled into a finished utterance.
//!
//! Every transcription response for the current utterance pushes its best
//! hypothesis into a sliding window of the most recent `depth` transcripts.
//! When the window is full and every entry is textually identical the
//! utterance is considered stable: it is finished, the window clears, and a
//! fresh utterance id is minted so later windows start a new utterance.
//!
//! Responses may arrive out of order and more than once; displayed results
//! are keyed by `file_name` (replace, never append) and each distinct
//! response is folded into the confidence accumulator exactly once.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::stream::new_utterance_id;
use crate::transcribe::TranscriptionResponse;

// ---------------------------------------------------------------------------
// FinishedUtterance
// ---------------------------------------------------------------------------

/// One settled utterance, emitted exactly once per stability event.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedUtterance {
    /// Id of the utterance that just finished.
    pub utterance_id: String,
    /// The stable transcript.
    pub transcript: String,
}

// ---------------------------------------------------------------------------
// UtteranceStabilizer
// ---------------------------------------------------------------------------

/// Sliding-window stability detector plus per-session accumulators.
pub struct UtteranceStabilizer {
    depth: usize,
    window: VecDeque<String>,
    utterance_id: String,
    /// File names already folded into the confidence accumulator.
    seen_files: HashSet<String>,
    confidence_sum: f64,
    confidence_count: usize,
    /// Latest transcript of the current, unfinished utterance.
    latest: Option<String>,
    /// Transcripts of finished utterances, in finish order.
    finished: Vec<String>,
    /// Displayed results: (file_name, transcript), replaced in place on
    /// duplicate arrival.
    results: Vec<(String, String)>,
    word_counts: HashMap<String, u64>,
}

impl UtteranceStabilizer {
    /// Create a stabilizer requiring `depth` identical transcripts in a row.
    ///
    /// # Panics
    ///
    /// Panics if `depth == 0`.
    pub fn new(depth: usize) -> Self {
        assert!(depth > 0, "stabilizer depth must be > 0");
        Self {
            depth,
            window: VecDeque::with_capacity(depth),
            utterance_id: new_utterance_id(),
            seen_files: HashSet::new(),
            confidence_sum: 0.0,
            confidence_count: 0,
            latest: None,
            finished: Vec::new(),
            results: Vec::new(),
            word_counts: HashMap::new(),
        }
    }

    /// Current utterance id; windows in flight should carry this.
    pub fn utterance_id(&self) -> &str {
        &self.utterance_id
    }

    /// Feed one transcription response.
    ///
    /// Returns the finished utterance when this response made the window
    /// stable.  Responses without a top hypothesis (failed uploads, empty
    /// hypothesis lists) leave the window unchanged.
    pub fn observe(&mut self, response: &TranscriptionResponse) -> Option<FinishedUtterance> {
        let Some(top) = response.top_hypothesis() else {
            log::debug!(
                "stabilizer: skipping response {} without a hypothesis",
                response.file_name
            );
            return None;
        };

        let transcript = top.transcript.clone();

        // Fold each distinct response into the confidence mean exactly once;
        // late duplicates only replace the displayed result.
        if self.seen_files.insert(response.file_name.clone()) {
            self.confidence_sum += f64::from(top.confidence);
            self.confidence_count += 1;
        }
        self.upsert_result(&response.file_name, &transcript);

        self.latest = Some(transcript.clone());
        if self.window.len() == self.depth {
            self.window.pop_front();
        }
        self.window.push_back(transcript);

        if self.is_stable() {
            Some(self.finish())
        } else {
            None
        }
    }

    fn is_stable(&self) -> bool {
        self.window.len() == self.depth
            && self.window.iter().all(|t| t == &self.window[0])
    }

    fn finish(&mut self) -> FinishedUtterance {
        let transcript = self.window[0].clone();
        let finished = FinishedUtterance {
            utterance_id: std::mem::replace(&mut self.utterance_id, new_utterance_id()),
            transcript: transcript.clone(),
        };

        self.fold_words(&transcript);
        self.finished.push(transcript);
        self.latest = None;
        self.window.clear();

        log::info!(
            "stabilizer: utterance {} settled as {:?}, next is {}",
            finished.utterance_id,
            finished.transcript,
            self.utterance_id
        );
        finished
    }

    /// Reseed for a new utterance (recording restarted or paused).
    ///
    /// Accumulators and finished transcripts survive; only the in-flight
    /// window and id are replaced.
    pub fn reset(&mut self) {
        self.window.clear();
        self.latest = None;
        self.utterance_id = new_utterance_id();
    }

    fn upsert_result(&mut self, file_name: &str, transcript: &str) {
        match self.results.iter_mut().find(|(f, _)| f == file_name) {
            Some((_, t)) => *t = transcript.to_owned(),
            None => self.results.push((file_name.to_owned(), transcript.to_owned())),
        }
    }

    /// Count each word of a finished transcript once.
    fn fold_words(&mut self, transcript: &str) {
        for word in transcript.split_whitespace() {
            let key = word
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase();
            if !key.is_empty() {
                *self.word_counts.entry(key).or_insert(0) += 1;
            }
        }
    }

    /// Fold the latest unfinished transcript before summarising, so a
    /// session ended mid-utterance still counts its words — once.
    pub fn fold_in_flight(&mut self) {
        if let Some(latest) = self.latest.take() {
            self.fold_words(&latest);
            self.finished.push(latest);
        }
        self.window.clear();
    }

    // -----------------------------------------------------------------------
    // Accumulator views
    // -----------------------------------------------------------------------

    /// Displayed results in first-arrival order.
    pub fn results(&self) -> &[(String, String)] {
        &self.results
    }

    /// Finished transcripts in finish order.
    pub fn finished_transcripts(&self) -> &[String] {
        &self.finished
    }

    /// Total words across finished utterances.
    pub fn total_words(&self) -> u64 {
        self.word_counts.values().sum()
    }

    /// Distinct words across finished utterances.
    pub fn distinct_vocabulary(&self) -> usize {
        self.word_counts.len()
    }

    /// Per-word frequencies.
    pub fn word_counts(&self) -> &HashMap<String, u64> {
        &self.word_counts
    }

    /// Mean confidence over all distinct responses, `0.0` before the first.
    pub fn mean_confidence(&self) -> f32 {
        if self.confidence_count == 0 {
            return 0.0;
        }
        (self.confidence_sum / self.confidence_count as f64) as f32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::{Hypothesis, ResponseStatus, TranscriptionResponse};

    fn response(file_name: &str, transcript: &str, confidence: f32) -> TranscriptionResponse {
        TranscriptionResponse {
            message: ResponseStatus::Ok,
            file_name: file_name.into(),
            timing: None,
            parsed: Some(vec![Hypothesis {
                transcript: transcript.into(),
                confidence,
            }]),
            parse_error: None,
        }
    }

    #[test]
    fn n_identical_transcripts_finish_exactly_once() {
        let mut stab = UtteranceStabilizer::new(3);
        let first_id = stab.utterance_id().to_owned();

        assert!(stab.observe(&response("w1", "hello", 0.9)).is_none());
        assert!(stab.observe(&response("w2", "hello", 0.9)).is_none());

        let finished = stab.observe(&response("w3", "hello", 0.9)).expect("finish");
        assert_eq!(finished.transcript, "hello");
        assert_eq!(finished.utterance_id, first_id);

        // Id changed, window cleared: the next response does not re-finish.
        assert_ne!(stab.utterance_id(), first_id);
        assert!(stab.observe(&response("w4", "hello", 0.9)).is_none());
    }

    #[test]
    fn finish_repeats_per_full_block() {
        let mut stab = UtteranceStabilizer::new(2);
        assert!(stab.observe(&response("a1", "one", 0.5)).is_none());
        assert!(stab.observe(&response("a2", "one", 0.5)).is_some());
        assert!(stab.observe(&response("b1", "two", 0.5)).is_none());
        assert!(stab.observe(&response("b2", "two", 0.5)).is_some());
        assert_eq!(stab.finished_transcripts(), &["one", "two"]);
    }

    #[test]
    fn differing_transcripts_never_finish() {
        let mut stab = UtteranceStabilizer::new(3);
        for (i, t) in ["a", "b", "a", "b", "a"].iter().enumerate() {
            let file = format!("w{i}");
            assert!(stab.observe(&response(&file, t, 0.5)).is_none());
        }
    }

    /// A response without a top hypothesis leaves the window unchanged.
    #[test]
    fn hypothesis_free_responses_are_skipped() {
        let mut stab = UtteranceStabilizer::new(2);
        assert!(stab.observe(&response("w1", "go", 0.8)).is_none());

        let failed = TranscriptionResponse::failed("w2", "timeout");
        assert!(stab.observe(&failed).is_none());

        // Still finishes with the second "go" — the failure did not reset.
        assert!(stab.observe(&response("w3", "go", 0.8)).is_some());
    }

    /// Five identical "hello world" responses with depth 5 finish once and
    /// count each word once, not five times.
    #[test]
    fn words_counted_once_per_finished_utterance() {
        let mut stab = UtteranceStabilizer::new(5);
        let mut finishes = 0;
        for i in 0..5 {
            let file = format!("w{i}");
            if stab.observe(&response(&file, "hello world", 0.9)).is_some() {
                finishes += 1;
            }
        }

        assert_eq!(finishes, 1);
        assert_eq!(stab.total_words(), 2);
        assert_eq!(stab.word_counts().get("hello"), Some(&1));
        assert_eq!(stab.word_counts().get("world"), Some(&1));
        assert_eq!(stab.distinct_vocabulary(), 2);
    }

    /// A duplicate file name replaces the displayed result and is not folded
    /// into the confidence mean twice.
    #[test]
    fn duplicate_file_names_replace_not_append() {
        let mut stab = UtteranceStabilizer::new(10);
        stab.observe(&response("w1", "first", 0.4));
        stab.observe(&response("w1", "revised", 0.8));
        stab.observe(&response("w2", "second", 0.6));

        assert_eq!(
            stab.results(),
            &[
                ("w1".to_owned(), "revised".to_owned()),
                ("w2".to_owned(), "second".to_owned()),
            ]
        );
        // Confidence folded once per distinct file: (0.4 + 0.6) / 2.
        assert!((stab.mean_confidence() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn reset_reseeds_window_and_id() {
        let mut stab = UtteranceStabilizer::new(2);
        stab.observe(&response("w1", "go", 0.8));
        let id_before = stab.utterance_id().to_owned();

        stab.reset();
        assert_ne!(stab.utterance_id(), id_before);

        // The pre-reset "go" no longer counts toward stability.
        assert!(stab.observe(&response("w2", "go", 0.8)).is_none());
        assert!(stab.observe(&response("w3", "go", 0.8)).is_some());
    }

    #[test]
    fn fold_in_flight_counts_the_latest_transcript_once() {
        let mut stab = UtteranceStabilizer::new(5);
        stab.observe(&response("w1", "almost done", 0.7));
        stab.observe(&response("w2", "almost done now", 0.7));

        stab.fold_in_flight();
        assert_eq!(stab.total_words(), 3);
        assert_eq!(stab.finished_transcripts(), &["almost done now"]);

        // Idempotent once folded.
        stab.fold_in_flight();
        assert_eq!(stab.total_words(), 3);
    }

    #[test]
    fn word_folding_normalizes_case_and_punctuation() {
        let mut stab = UtteranceStabilizer::new(1);
        stab.observe(&response("w1", "Hello, world! don't", 0.9));

        assert_eq!(stab.word_counts().get("hello"), Some(&1));
        assert_eq!(stab.word_counts().get("world"), Some(&1));
        assert_eq!(stab.word_counts().get("don't"), Some(&1));
    }

    #[test]
    fn mean_confidence_is_zero_before_any_response() {
        let stab = UtteranceStabilizer::new(3);
        assert_eq!(stab.mean_confidence(), 0.0);
    }
}
