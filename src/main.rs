//! Headless demo runner — records for a fixed time, streams to the
//! transcription service, and prints the session summary.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create a tokio runtime (multi-thread, 2 workers).
//! 4. Acquire the default input device; a failure prints the advisory for
//!    its error kind and exits.
//! 5. Build the [`TrainingSession`] with the HTTP collaborators and the
//!    JSON-file session log.
//! 6. Start the level meter ticker and the cpal stream, then drain blocks
//!    until the demo deadline.
//! 7. End the session and print the summary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use speech_trainer::{
    audio::SourceError,
    audio::AudioSource,
    config::{AppConfig, AppPaths},
    grammar::HttpGrammarChecker,
    session::{
        submit_request, JsonFileLogStore, LevelTicker, TrainingSession, METER_TICK,
    },
    transcribe::HttpTranscriptionService,
};

/// How long the demo records before ending the session.
const DEMO_DURATION: Duration = Duration::from_secs(15);

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("speech trainer demo starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (uploads + log store each take one worker)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Microphone — each failure kind carries its own advisory text.
    let source = match AudioSource::acquire() {
        Ok(source) => source,
        Err(e @ SourceError::NotAllowed(_)) | Err(e @ SourceError::Security(_)) => {
            log::error!("{e}");
            anyhow::bail!("microphone access blocked; adjust permissions and retry");
        }
        Err(e) => {
            log::error!("{e}");
            anyhow::bail!("no usable microphone");
        }
    };
    let sample_rate = source.sample_rate();
    log::info!(
        "input acquired ({sample_rate} Hz, {} ch)",
        source.channels()
    );

    // 5. Session wiring
    let paths = AppPaths::new();
    let mut session = TrainingSession::new(
        &config,
        sample_rate,
        Arc::new(HttpTranscriptionService::from_config(&config.transcription)),
        Arc::new(HttpGrammarChecker::from_config(&config.grammar)),
        Arc::new(JsonFileLogStore::new(paths.session_log_file)),
    );
    session
        .interface()
        .use_input(source)
        .context("failed to route input")?;

    // 6. Level meter + capture stream.  The stream guard must stay on this
    //    thread; dropping it stops the hardware.
    let ticker = {
        let _guard = rt.enter();
        LevelTicker::spawn(
            session.interface().graph_handle(),
            session.interface().bus_handle(),
            METER_TICK,
        )
    };

    let (block_tx, block_rx) = std::sync::mpsc::channel::<Vec<f32>>();
    let _stream = session
        .interface()
        .connect_input(block_tx)
        .context("failed to start capture stream")?;

    session.start_recording().context("failed to start recording")?;
    log::info!("recording for {DEMO_DURATION:?} — speak now");

    let service = session.transcription_handle();
    let deadline = Instant::now() + DEMO_DURATION;

    while Instant::now() < deadline {
        let block = match block_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(block) => block,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        for request in session.handle_block(&block) {
            let response = rt.block_on(submit_request(service.as_ref(), request));
            if let Some(finished) = session.handle_response(&response) {
                log::info!("utterance settled: {:?}", finished.transcript);

                let issues = rt.block_on(session.annotate(&finished.transcript));
                for issue in issues {
                    log::info!("  grammar: {}", issue.message);
                }
            }
        }
    }

    // 7. Wrap up: flush the last partial window, then summarise.
    if let Ok(Some(request)) = session.pause_recording() {
        let response = rt.block_on(submit_request(service.as_ref(), request));
        session.handle_response(&response);
    }
    ticker.stop();

    let summary = rt.block_on(session.end()).context("failed to end session")?;
    log::info!(
        "session over: {} ms recorded, {} words ({} distinct), mean confidence {:.2}",
        summary.duration_ms,
        summary.total_words,
        summary.distinct_vocabulary,
        summary.mean_confidence,
    );

    Ok(())
}
