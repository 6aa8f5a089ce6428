use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use bc_core::error::CaptureError;
use bc_core::traits::SampleSource;

use crate::decode;

/// Replays a decoded audio file as if it were a live input.
///
/// Chunks are released at the file's sample rate, so downstream cadence matches
/// a microphone. At end of file the source either wraps around or reports
/// [`CaptureError::Ended`].
///
/// # Example
/// ```
/// use bc_audio::file_source::FileSource;
/// use bc_core::traits::SampleSource;
///
/// let mut src = FileSource::from_samples(vec![0.1, 0.2, 0.3], 8000, true).unpaced();
/// assert_eq!(src.read(4).unwrap(), vec![0.1, 0.2, 0.3, 0.1]);
/// ```
pub struct FileSource {
    samples: Vec<f32>,
    pos: usize,
    sample_rate: u32,
    loop_file: bool,
    /// Wall-clock origin and samples handed out since, for real-time pacing.
    pacing: Option<(Instant, u64)>,
}

impl FileSource {
    /// Decode `path` and prepare it for paced replay.
    ///
    /// # Errors
    /// Returns an error if decoding fails or the file holds no samples.
    pub fn open(path: &Path, loop_file: bool) -> Result<Self> {
        let (samples, sample_rate) = decode::decode_file(path)?;
        if samples.is_empty() {
            anyhow::bail!("Audio file is empty: {}", path.display());
        }
        Ok(Self::from_samples(samples, sample_rate, loop_file))
    }

    /// Wrap already-decoded mono samples.
    #[must_use]
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, loop_file: bool) -> Self {
        Self {
            samples,
            pos: 0,
            sample_rate: sample_rate.max(1),
            loop_file,
            pacing: Some((Instant::now(), 0)),
        }
    }

    /// Release chunks as fast as they are asked for.
    #[must_use]
    pub fn unpaced(mut self) -> Self {
        self.pacing = None;
        self
    }

    fn wait_for_wall_clock(&mut self, n: usize) {
        let Some((origin, delivered)) = self.pacing.as_mut() else {
            return;
        };
        *delivered += n as u64;
        let due = *origin
            + Duration::from_secs_f64(*delivered as f64 / f64::from(self.sample_rate));
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
    }
}

impl SampleSource for FileSource {
    fn read(&mut self, n: usize) -> Result<Vec<f32>, CaptureError> {
        if self.samples.is_empty() {
            return Err(CaptureError::Ended);
        }
        if !self.loop_file && self.samples.len() - self.pos < n {
            log::info!("Fin du fichier audio après {} échantillons", self.pos);
            return Err(CaptureError::Ended);
        }

        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            if self.pos == self.samples.len() {
                self.pos = 0;
                log::debug!("Replay wrapped to start");
            }
            let take = (n - out.len()).min(self.samples.len() - self.pos);
            out.extend_from_slice(&self.samples[self.pos..self.pos + take]);
            self.pos += take;
        }

        self.wait_for_wall_clock(n);
        Ok(out)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pass_ends_when_a_full_chunk_is_not_available() {
        let mut src = FileSource::from_samples(vec![1.0, 2.0, 3.0, 4.0, 5.0], 100, false).unpaced();
        assert_eq!(src.read(2).ok(), Some(vec![1.0, 2.0]));
        assert_eq!(src.read(2).ok(), Some(vec![3.0, 4.0]));
        assert!(matches!(src.read(2), Err(CaptureError::Ended)));
    }

    #[test]
    fn looping_wraps_across_the_end() {
        let mut src = FileSource::from_samples(vec![1.0, 2.0, 3.0], 100, true).unpaced();
        assert_eq!(src.read(2).ok(), Some(vec![1.0, 2.0]));
        assert_eq!(src.read(5).ok(), Some(vec![3.0, 1.0, 2.0, 3.0, 1.0]));
    }

    #[test]
    fn empty_source_ends_immediately() {
        let mut src = FileSource::from_samples(Vec::new(), 100, true).unpaced();
        assert!(matches!(src.read(1), Err(CaptureError::Ended)));
    }

    #[test]
    fn paced_reads_follow_the_sample_rate() {
        let mut src = FileSource::from_samples(vec![0.0; 1000], 1000, true);
        let start = Instant::now();
        for _ in 0..3 {
            assert!(src.read(20).is_ok());
        }
        // 60 samples at 1 kHz = 60 ms of audio.
        assert!(start.elapsed() >= Duration::from_millis(55));
    }
}
