//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for the signal conditioning graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Input gain applied before analysis; clamped to `[0, 2.5]` at runtime.
    pub gain: f32,
    /// Volume of the local monitor path.  `0.0` keeps monitoring silent —
    /// listening to yourself is opt-in.
    pub monitor_volume: f32,
    /// Number of recent samples the analyser keeps for level metering.
    pub analysis_size: usize,
    /// Band-pass corner frequencies (Hz) while the voice filter is *off* —
    /// essentially the full usable band.
    pub wide_band_hz: (f32, f32),
    /// Band-pass corner frequencies (Hz) while the voice filter is *on*.
    pub voice_band_hz: (f32, f32),
    /// Sample rate assumed when the input device does not report one.
    pub fallback_sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            gain: 0.95,
            monitor_volume: 0.0,
            analysis_size: 2048,
            wide_band_hz: (125.0, 8_000.0),
            voice_band_hz: (1_000.0, 1_800.0),
            fallback_sample_rate: 48_000,
        }
    }
}

// ---------------------------------------------------------------------------
// StreamConfig
// ---------------------------------------------------------------------------

/// Settings for chunk slicing, upload windowing and utterance stabilisation.
///
/// The slice interval and window size are deliberately configuration rather
/// than constants; together they determine how much audio one upload window
/// spans (`time_slice_ms × window_size`, roughly one second by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Duration of one recorded chunk in milliseconds.
    pub time_slice_ms: u64,
    /// Number of chunks merged into one upload window.
    pub window_size: usize,
    /// How many consecutive identical transcripts finish an utterance.
    pub stabilizer_depth: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            time_slice_ms: 25,
            window_size: 40,
            stabilizer_depth: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptionConfig
// ---------------------------------------------------------------------------

/// Connection settings for the external transcription service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Base URL of the transcription endpoint.
    pub base_url: String,
    /// Maximum seconds to wait for a transcription response.
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".into(),
            timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// GrammarConfig
// ---------------------------------------------------------------------------

/// Connection settings for the grammar-check service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrammarConfig {
    /// Base URL of a LanguageTool-compatible API.
    pub base_url: String,
    /// Language code sent with every check (e.g. `"en-US"`, `"de-DE"`).
    pub language: String,
    /// Maximum seconds to wait for a grammar-check response.
    pub timeout_secs: u64,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.languagetoolplus.com/v2".into(),
            language: "en-US".into(),
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use speech_trainer::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Signal conditioning settings.
    pub audio: AudioConfig,
    /// Chunking / upload window / stabiliser settings.
    pub stream: StreamConfig,
    /// Transcription service connection settings.
    pub transcription: TranscriptionConfig,
    /// Grammar checker connection settings.
    pub grammar: GrammarConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.audio.gain, loaded.audio.gain);
        assert_eq!(original.audio.monitor_volume, loaded.audio.monitor_volume);
        assert_eq!(original.audio.wide_band_hz, loaded.audio.wide_band_hz);
        assert_eq!(original.audio.voice_band_hz, loaded.audio.voice_band_hz);

        assert_eq!(original.stream.time_slice_ms, loaded.stream.time_slice_ms);
        assert_eq!(original.stream.window_size, loaded.stream.window_size);
        assert_eq!(
            original.stream.stabilizer_depth,
            loaded.stream.stabilizer_depth
        );

        assert_eq!(original.transcription.base_url, loaded.transcription.base_url);
        assert_eq!(original.grammar.language, loaded.grammar.language);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.stream.window_size, default.stream.window_size);
        assert_eq!(config.audio.gain, default.audio.gain);
    }

    /// Verify default values match the intended tuning.
    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.audio.gain, 0.95);
        assert_eq!(cfg.audio.monitor_volume, 0.0);
        assert_eq!(cfg.audio.wide_band_hz, (125.0, 8_000.0));
        assert_eq!(cfg.audio.voice_band_hz, (1_000.0, 1_800.0));
        assert_eq!(cfg.stream.time_slice_ms, 25);
        assert_eq!(cfg.stream.window_size, 40);
        assert_eq!(cfg.stream.stabilizer_depth, 5);
        assert_eq!(cfg.grammar.language, "en-US");
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.stream.time_slice_ms = 10;
        cfg.stream.window_size = 20;
        cfg.audio.gain = 1.4;
        cfg.transcription.base_url = "http://stt.example.com".into();
        cfg.grammar.language = "de-DE".into();

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.stream.time_slice_ms, 10);
        assert_eq!(loaded.stream.window_size, 20);
        assert_eq!(loaded.audio.gain, 1.4);
        assert_eq!(loaded.transcription.base_url, "http://stt.example.com");
        assert_eq!(loaded.grammar.language, "de-DE");
    }
}
