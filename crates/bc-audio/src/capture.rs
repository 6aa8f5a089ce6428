use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use bc_core::config::CaptureConfig;
use bc_core::error::CaptureError;
use bc_core::traits::SampleSource;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, RingBuffer};

/// Sleep between ring buffer polls while waiting for a full chunk.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Microphone capture via cpal.
///
/// The cpal callback downmixes to mono and writes f32 samples into a lock-free
/// ring buffer; [`SampleSource::read`] drains it from the capture thread.
///
/// # Example
/// ```no_run
/// use bc_audio::capture::MicSource;
/// use bc_core::config::CaptureConfig;
/// let mic = MicSource::start(&CaptureConfig::default()).unwrap();
/// ```
pub struct MicSource {
    /// Capture stops when this is dropped.
    _stream: cpal::Stream,
    consumer: Consumer<f32>,
    sample_rate: u32,
    stall_timeout: Duration,
    /// Last error reported by the backend, if any.
    failure: Arc<Mutex<Option<String>>>,
    /// Samples dropped because the ring buffer was full.
    overruns: Arc<AtomicUsize>,
    reported_overruns: usize,
}

impl MicSource {
    /// Start capturing from the configured input device.
    ///
    /// The requested sample rate is used when the device supports it; otherwise
    /// the device's default configuration is kept and a warning logged.
    ///
    /// # Errors
    /// Returns an error if the audio device is unavailable.
    pub fn start(config: &CaptureConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = if config.wants_default_device() {
            host.default_input_device()
                .ok_or_else(|| {
                    CaptureError::Device("pas de périphérique d'entrée par défaut".into())
                })?
        } else {
            host.input_devices()?
                .find(|d| d.name().is_ok_and(|n| n == config.device))
                .ok_or_else(|| {
                    CaptureError::Device(format!("périphérique introuvable : {}", config.device))
                })?
        };
        log::info!(
            "Capture device: {}",
            device.name().unwrap_or_else(|_| "<inconnu>".to_string())
        );

        let stream_config = pick_stream_config(&device, config.sample_rate)?;
        let sample_rate = stream_config.sample_rate.0;
        let channels = usize::from(stream_config.channels.max(1));

        // Ring buffer: 2 seconds of audio @ sample_rate
        let buf_size = sample_rate as usize * 2;
        let (mut producer, consumer) = RingBuffer::new(buf_size);

        let overruns = Arc::new(AtomicUsize::new(0));
        let overruns_cb = Arc::clone(&overruns);
        let failure = Arc::new(Mutex::new(None));
        let failure_cb = Arc::clone(&failure);

        let stream = device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Downmix to mono and push into ring buffer
                for chunk in data.chunks(channels) {
                    let mono: f32 = chunk.iter().sum::<f32>() / channels as f32;
                    if producer.push(mono).is_err() {
                        overruns_cb.fetch_add(1, Ordering::Relaxed);
                    }
                }
            },
            move |err| {
                log::error!("Audio stream error: {err}");
                if let Ok(mut slot) = failure_cb.lock() {
                    *slot = Some(err.to_string());
                }
            },
            None,
        )?;

        stream.play()?;
        log::info!("Capture started @ {sample_rate}Hz, {channels} channel(s) downmixed");

        Ok(Self {
            _stream: stream,
            consumer,
            sample_rate,
            stall_timeout: config.stall_timeout(),
            failure,
            overruns,
            reported_overruns: 0,
        })
    }

    fn check_failure(&self) -> Result<(), CaptureError> {
        match self.failure.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(msg) => Err(CaptureError::Stream(msg.clone())),
                None => Ok(()),
            },
            Err(_) => Err(CaptureError::Stream("état d'erreur empoisonné".to_string())),
        }
    }

    fn report_overruns(&mut self) {
        let total = self.overruns.load(Ordering::Relaxed);
        if total > self.reported_overruns {
            log::warn!(
                "Ring buffer overrun: {} samples dropped",
                total - self.reported_overruns
            );
            self.reported_overruns = total;
        }
    }
}

impl SampleSource for MicSource {
    fn read(&mut self, n: usize) -> Result<Vec<f32>, CaptureError> {
        let mut out = Vec::with_capacity(n);
        let mut last_progress = Instant::now();

        while out.len() < n {
            self.check_failure()?;

            let want = (n - out.len()).min(self.consumer.slots());
            if want > 0 {
                if let Ok(chunk) = self.consumer.read_chunk(want) {
                    out.extend(chunk);
                }
                last_progress = Instant::now();
                continue;
            }

            if last_progress.elapsed() >= self.stall_timeout {
                return Err(CaptureError::Stalled(self.stall_timeout.as_millis() as u64));
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        self.report_overruns();
        Ok(out)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Choose an f32 input configuration at `target_rate`, or the device default.
fn pick_stream_config(device: &cpal::Device, target_rate: u32) -> Result<cpal::StreamConfig> {
    let target = cpal::SampleRate(target_rate);
    let matching = device.supported_input_configs()?.find(|range| {
        range.sample_format() == cpal::SampleFormat::F32
            && range.min_sample_rate() <= target
            && range.max_sample_rate() >= target
    });

    if let Some(range) = matching {
        return Ok(range.with_sample_rate(target).config());
    }

    let fallback = device.default_input_config()?;
    log::warn!(
        "{target_rate}Hz non supporté par le périphérique, utilisation de {}Hz",
        fallback.sample_rate().0
    );
    Ok(fallback.config())
}

/// Names of the available input devices, default first.
///
/// # Errors
/// Returns an error if the host cannot enumerate devices.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut names: Vec<String> = host
        .input_devices()?
        .filter_map(|d| d.name().ok())
        .collect();
    if let Some(default_name) = default_name
        && let Some(pos) = names.iter().position(|n| *n == default_name)
    {
        let name = names.remove(pos);
        names.insert(0, name);
    }
    Ok(names)
}
