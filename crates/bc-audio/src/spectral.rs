use std::ops::Range;
use std::sync::Arc;

use bc_core::value::BandPower;
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

/// Band-power analyzer: Hamming-tapered real FFT, then summed bin power inside a band.
///
/// Pre-allocates the FFT plan, taper and scratch buffers. The buffers are fully
/// overwritten on each call, so identical windows always produce identical results.
///
/// # Example
/// ```
/// use bc_audio::spectral::SpectralAnalyzer;
/// let mut analyzer = SpectralAnalyzer::new(44100, 44100, 12.0, 30.0);
/// assert_eq!(analyzer.band_bins(), 12..31);
/// let power = analyzer.analyze(&vec![0.0; 44100]);
/// assert!(power.abs() < f64::EPSILON);
/// ```
pub struct SpectralAnalyzer {
    window_len: usize,
    input_buf: Vec<f32>,
    spectrum_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    plan: Arc<dyn RealToComplex<f32>>,
    /// Hamming taper coefficients.
    taper: Vec<f32>,
    /// Indices of the bins whose centre frequency lies in the band.
    band: Range<usize>,
}

impl SpectralAnalyzer {
    /// Create an analyzer for windows of `window_len` samples at `sample_rate` Hz,
    /// summing bins in `[band_min_hz, band_max_hz]` inclusive.
    ///
    /// # Panics
    /// Panics if `window_len < 2`.
    #[must_use]
    pub fn new(window_len: usize, sample_rate: u32, band_min_hz: f32, band_max_hz: f32) -> Self {
        assert!(window_len >= 2, "window must be >= 2");

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(window_len);

        let input_buf = plan.make_input_vec();
        let spectrum_buf = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        let band = band_bins(
            spectrum_buf.len(),
            sample_rate,
            f64::from(band_min_hz),
            f64::from(band_max_hz),
        );
        log::debug!(
            "Analyzer: window={window_len} bins={} band bins={}..{}",
            spectrum_buf.len(),
            band.start,
            band.end
        );

        Self {
            window_len,
            input_buf,
            spectrum_buf,
            scratch,
            plan,
            taper: hamming(window_len),
            band,
        }
    }

    /// Band power of one window.
    ///
    /// A window shorter than the configured length is zero-padded; extra samples are ignored.
    pub fn analyze(&mut self, window: &[f32]) -> BandPower {
        debug_assert_eq!(window.len(), self.window_len);
        let n = self.window_len.min(window.len());

        for (i, slot) in self.input_buf.iter_mut().enumerate() {
            *slot = if i < n { window[i] * self.taper[i] } else { 0.0 };
        }

        if let Err(e) = self.plan.process_with_scratch(
            &mut self.input_buf,
            &mut self.spectrum_buf,
            &mut self.scratch,
        ) {
            log::error!("FFT failed: {e}");
            return 0.0;
        }

        self.spectrum_buf[self.band.clone()]
            .iter()
            .map(|c| {
                let re = f64::from(c.re);
                let im = f64::from(c.im);
                re * re + im * im
            })
            .sum()
    }

    /// Range of bin indices summed into the band power.
    #[must_use]
    pub fn band_bins(&self) -> Range<usize> {
        self.band.clone()
    }

    /// Number of frequency bins produced per window (`window / 2 + 1`).
    #[must_use]
    pub fn num_bins(&self) -> usize {
        self.spectrum_buf.len()
    }
}

/// Hamming taper of `len` points: `0.54 - 0.46 cos(2πn / (len - 1))`.
#[must_use]
pub fn hamming(len: usize) -> Vec<f32> {
    if len == 1 {
        return vec![1.0];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|i| (0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / denom).cos()) as f32)
        .collect()
}

/// Centre frequency of bin `k` out of `num_bins`: `k * fs / (2 * (num_bins - 1))`.
#[inline]
#[must_use]
pub fn bin_frequency(k: usize, num_bins: usize, sample_rate: u32) -> f64 {
    k as f64 * f64::from(sample_rate) / (2.0 * (num_bins - 1) as f64)
}

/// Contiguous range of bins whose centre frequency lies in `[min_hz, max_hz]`.
fn band_bins(num_bins: usize, sample_rate: u32, min_hz: f64, max_hz: f64) -> Range<usize> {
    let mut in_band = (0..num_bins).filter(|&k| {
        let f = bin_frequency(k, num_bins, sample_rate);
        f >= min_hz && f <= max_hz
    });
    match in_band.next() {
        Some(first) => {
            let last = in_band.last().unwrap_or(first);
            first..last + 1
        }
        None => 0..0,
    }
}
