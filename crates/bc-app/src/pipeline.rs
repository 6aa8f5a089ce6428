use std::path::PathBuf;
use std::sync::Arc;

use bc_audio::capture::MicSource;
use bc_audio::capture_loop::{CaptureHandle, spawn_capture_thread};
use bc_audio::file_source::FileSource;
use bc_core::config::AppConfig;
use bc_server::Broadcaster;

use crate::cli::Cli;

/// Start the capture pipeline.
///
/// `--audio` can be `"default"`, `"mic"` or `"microphone"` for device
/// capture, or a file path for paced file replay.
///
/// # Errors
/// Returns an error if the audio device or file is unavailable.
pub fn start_capture(
    cli: &Cli,
    config: &AppConfig,
    broadcaster: Arc<Broadcaster>,
) -> anyhow::Result<CaptureHandle> {
    let analysis = config.analysis.clone();

    if cli.wants_microphone() {
        log::info!("Starting microphone capture");
        let capture = config.capture.clone();
        return spawn_capture_thread(move || MicSource::start(&capture), analysis, broadcaster);
    }

    let audio_path = PathBuf::from(&cli.audio);
    if !audio_path.exists() {
        anyhow::bail!("Audio source not found: {}", cli.audio);
    }
    log::info!("Starting audio file replay: {}", cli.audio);
    let loop_file = config.capture.loop_file;
    spawn_capture_thread(
        move || FileSource::open(&audio_path, loop_file),
        analysis,
        broadcaster,
    )
}
