use std::thread;

use bc_core::config::AnalysisConfig;
use bc_core::error::{CaptureError, CoreError};
use bc_core::traits::{Publisher, SampleSource};

use crate::normalize::Normalizer;
use crate::spectral::SpectralAnalyzer;
use crate::window::WindowAssembler;

/// Pipeline driver: source → windows → band power → 0–100 → publisher.
///
/// Owns the sliding buffer and the normalization state exclusively; nothing
/// else touches them.
pub struct CaptureLoop<S, P> {
    source: S,
    assembler: WindowAssembler,
    analyzer: SpectralAnalyzer,
    normalizer: Normalizer,
    publisher: P,
    windows: u64,
}

impl<S: SampleSource, P: Publisher> CaptureLoop<S, P> {
    /// Build the pipeline for `source`, sizing the window from its sample rate.
    ///
    /// # Errors
    /// Returns `CoreError::WindowTooShort` if the resulting window is < 2 samples.
    pub fn new(source: S, analysis: &AnalysisConfig, publisher: P) -> Result<Self, CoreError> {
        let sample_rate = source.sample_rate();
        let window = analysis.window_for(sample_rate);
        if window < 2 {
            return Err(CoreError::WindowTooShort(window));
        }
        Ok(Self {
            source,
            assembler: WindowAssembler::new(window),
            analyzer: SpectralAnalyzer::new(
                window,
                sample_rate,
                analysis.band_min_hz,
                analysis.band_max_hz,
            ),
            normalizer: Normalizer::new(),
            publisher,
            windows: 0,
        })
    }

    /// Read one hop of samples and process every window it completes.
    ///
    /// Returns how many values were published.
    ///
    /// # Errors
    /// Propagates the source's error unchanged; it is fatal to the loop.
    pub fn step(&mut self) -> Result<usize, CaptureError> {
        let chunk = self.source.read(self.assembler.overlap())?;
        self.assembler.append(&chunk);

        let Self {
            assembler,
            analyzer,
            normalizer,
            publisher,
            windows,
            ..
        } = self;

        let mut published = 0;
        assembler.for_each_window(|window| {
            *windows += 1;
            let power = analyzer.analyze(window);
            match normalizer.update(power) {
                Some(value) => {
                    log::trace!("window #{windows}: power={power:.4e} value={value}");
                    publisher.publish(value);
                    published += 1;
                }
                None => log::trace!("window #{windows}: power={power:.4e} (no value)"),
            }
        });
        Ok(published)
    }

    /// Run until the source fails, yielding after every chunk.
    ///
    /// Only returns on a fatal capture error.
    pub fn run(&mut self) -> CaptureError {
        loop {
            if let Err(e) = self.step() {
                return e;
            }
            thread::yield_now();
        }
    }

    /// Windows analyzed so far.
    #[must_use]
    pub fn windows_processed(&self) -> u64 {
        self.windows
    }
}

/// Parameters the capture thread settled on once its source was open.
#[derive(Clone, Copy, Debug)]
pub struct CaptureInfo {
    /// Effective sample rate of the source.
    pub sample_rate: u32,
    /// Window length in samples.
    pub window: usize,
    /// Samples between the starts of consecutive windows.
    pub hop: usize,
}

/// Handle on a running capture thread.
pub struct CaptureHandle {
    /// What the thread settled on.
    pub info: CaptureInfo,
    exit_rx: flume::Receiver<CaptureError>,
}

impl CaptureHandle {
    /// Wait for the capture thread to fail.
    pub async fn failed(&self) -> CaptureError {
        self.exit_rx
            .recv_async()
            .await
            .unwrap_or_else(|_| CaptureError::Stream("thread de capture interrompu".to_string()))
    }

    /// Blocking variant of [`CaptureHandle::failed`].
    #[must_use]
    pub fn wait(&self) -> CaptureError {
        self.exit_rx
            .recv()
            .unwrap_or_else(|_| CaptureError::Stream("thread de capture interrompu".to_string()))
    }
}

/// Spawn the capture thread.
///
/// `open` runs on the new thread, so sources that cannot cross threads (cpal
/// streams on some hosts) are fine. Returns once the source is open and the
/// pipeline built, or with the error that prevented it.
///
/// # Errors
/// Returns an error if the thread cannot be spawned, `open` fails, or the
/// analysis parameters are invalid for the source.
pub fn spawn_capture_thread<F, S, P>(
    open: F,
    analysis: AnalysisConfig,
    publisher: P,
) -> anyhow::Result<CaptureHandle>
where
    F: FnOnce() -> anyhow::Result<S> + Send + 'static,
    S: SampleSource + 'static,
    P: Publisher + 'static,
{
    let (ready_tx, ready_rx) = flume::bounded::<anyhow::Result<CaptureInfo>>(1);
    let (exit_tx, exit_rx) = flume::bounded::<CaptureError>(1);

    thread::Builder::new()
        .name("bc-capture".to_string())
        .spawn(move || {
            let source = match open() {
                Ok(source) => source,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let sample_rate = source.sample_rate();
            let mut pipeline = match CaptureLoop::new(source, &analysis, publisher) {
                Ok(p) => p,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
            };
            let info = CaptureInfo {
                sample_rate,
                window: pipeline.assembler.window(),
                hop: analysis.overlap_for(sample_rate),
            };
            let _ = ready_tx.send(Ok(info));

            let err = pipeline.run();
            log::error!(
                "Capture arrêtée après {} fenêtres : {err}",
                pipeline.windows_processed()
            );
            let _ = exit_tx.send(err);
        })?;

    let info = ready_rx
        .recv()
        .map_err(|_| anyhow::anyhow!("Le thread de capture s'est arrêté avant d'être prêt"))??;
    log::info!(
        "Pipeline ready: window={} samples, hop={} samples @ {}Hz",
        info.window,
        info.hop,
        info.sample_rate
    );

    Ok(CaptureHandle { info, exit_rx })
}
