//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\speech-trainer\
//!   macOS:   ~/Library/Application Support/speech-trainer/
//!   Linux:   ~/.config/speech-trainer/
//!
//! Data dir (session logs):
//!   Windows: %LOCALAPPDATA%\speech-trainer\
//!   macOS:   ~/Library/Application Support/speech-trainer/
//!   Linux:   ~/.local/share/speech-trainer/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to the append-only session log file.
    pub session_log_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "speech-trainer";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let session_log_file = data_dir.join("session-log.json");

        Self {
            config_dir,
            settings_file,
            session_log_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .session_log_file
            .file_name()
            .is_some_and(|n| n == "session-log.json"));
    }
}
