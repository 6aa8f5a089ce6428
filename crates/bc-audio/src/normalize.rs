use bc_core::value::{BandPower, NormalizedValue};

/// Range of band-power values observed since the process started.
///
/// Both bounds are monotone: `min_seen` never increases, `max_seen` never
/// decreases. There is no reset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizationState {
    /// Smallest band power seen so far.
    pub min_seen: BandPower,
    /// Largest band power seen so far.
    pub max_seen: BandPower,
}

impl NormalizationState {
    /// `true` while every observed sample was identical.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.max_seen <= self.min_seen
    }
}

/// Online min–max normalizer onto `[0, 100]`.
///
/// # Example
/// ```
/// use bc_audio::normalize::Normalizer;
/// let mut norm = Normalizer::new();
/// assert!(norm.update(1.0).is_none()); // first sample: degenerate range
/// assert_eq!(norm.update(3.0).map(|v| v.get()), Some(100));
/// assert_eq!(norm.update(2.0).map(|v| v.get()), Some(50));
/// ```
#[derive(Debug, Default)]
pub struct Normalizer {
    state: Option<NormalizationState>,
}

impl Normalizer {
    /// Create a normalizer that has observed nothing.
    #[must_use]
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Widen the bounds with `sample` and map it onto `[0, 100]`.
    ///
    /// Returns `None` for the first sample, while the range is degenerate, and for
    /// non-finite samples (which leave the bounds untouched).
    pub fn update(&mut self, sample: BandPower) -> Option<NormalizedValue> {
        if !sample.is_finite() {
            log::warn!("Band power non fini ignoré : {sample}");
            return None;
        }

        let state = match self.state.as_mut() {
            None => {
                self.state = Some(NormalizationState {
                    min_seen: sample,
                    max_seen: sample,
                });
                return None;
            }
            Some(state) => {
                state.min_seen = state.min_seen.min(sample);
                state.max_seen = state.max_seen.max(sample);
                *state
            }
        };

        if state.is_degenerate() {
            log::trace!("Plage dégénérée ({}) : pas de valeur", state.min_seen);
            return None;
        }

        let ratio = (sample - state.min_seen) / (state.max_seen - state.min_seen);
        // Ties round to even.
        let scaled = (ratio * 100.0).round_ties_even().clamp(0.0, 100.0);
        NormalizedValue::new(scaled as u8)
    }

    /// Current bounds, or `None` before the first sample.
    #[must_use]
    pub fn state(&self) -> Option<NormalizationState> {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(norm: &mut Normalizer, samples: &[f64]) -> Vec<Option<u8>> {
        samples
            .iter()
            .map(|&s| norm.update(s).map(NormalizedValue::get))
            .collect()
    }

    #[test]
    fn first_sample_is_suppressed() {
        for first in [0.0, 1e-9, 42.0, 1e12] {
            let mut norm = Normalizer::new();
            assert!(norm.update(first).is_none());
            let state = norm.state();
            assert_eq!(
                state,
                Some(NormalizationState {
                    min_seen: first,
                    max_seen: first
                })
            );
        }
    }

    #[test]
    fn constant_input_never_yields_a_value() {
        let mut norm = Normalizer::new();
        assert!(values(&mut norm, &[5.0; 50]).iter().all(Option::is_none));
    }

    #[test]
    fn maps_onto_observed_range() {
        let mut norm = Normalizer::new();
        let out = values(&mut norm, &[10.0, 20.0, 15.0, 10.0, 30.0, 20.0]);
        assert_eq!(
            out,
            vec![None, Some(100), Some(50), Some(0), Some(100), Some(50)]
        );
    }

    #[test]
    fn rounds_half_to_even() {
        let mut norm = Normalizer::new();
        norm.update(0.0);
        norm.update(8.0);
        // 12.5, 37.5 and 62.5 sit exactly on a half.
        assert_eq!(norm.update(1.0).map(NormalizedValue::get), Some(12));
        assert_eq!(norm.update(3.0).map(NormalizedValue::get), Some(38));
        assert_eq!(norm.update(5.0).map(NormalizedValue::get), Some(62));
    }

    #[test]
    fn bounds_are_monotone_and_bracket_each_sample() {
        let mut norm = Normalizer::new();
        let samples = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0, 3.0, 5.0, 0.5, 8.0];
        let mut prev: Option<NormalizationState> = None;
        for &s in &samples {
            let out = norm.update(s);
            let Some(state) = norm.state() else {
                panic!("state missing after update");
            };
            assert!(state.min_seen <= s && s <= state.max_seen);
            if let Some(p) = prev {
                assert!(state.min_seen <= p.min_seen);
                assert!(state.max_seen >= p.max_seen);
            }
            if let Some(v) = out {
                assert!(v.get() <= 100);
            }
            prev = Some(state);
        }
    }

    #[test]
    fn outlier_permanently_widens_range() {
        let mut norm = Normalizer::new();
        norm.update(1.0);
        norm.update(2.0);
        norm.update(1000.0);
        // Back to normal levels: compressed near zero for the rest of the run.
        assert_eq!(norm.update(2.0).map(NormalizedValue::get), Some(0));
        assert_eq!(norm.update(100.0).map(NormalizedValue::get), Some(10));
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let mut norm = Normalizer::new();
        assert!(norm.update(f64::NAN).is_none());
        assert!(norm.state().is_none());
        norm.update(1.0);
        norm.update(2.0);
        assert!(norm.update(f64::INFINITY).is_none());
        assert_eq!(
            norm.state(),
            Some(NormalizationState {
                min_seen: 1.0,
                max_seen: 2.0
            })
        );
    }
}
