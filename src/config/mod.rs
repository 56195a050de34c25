//! Configuration — settings structs, TOML persistence, platform paths.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, AudioConfig, GrammarConfig, StreamConfig, TranscriptionConfig};
