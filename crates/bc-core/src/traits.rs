use crate::error::CaptureError;
use crate::value::NormalizedValue;

/// Fournit des blocs d'échantillons mono au pipeline.
///
/// Implémenté par : `MicSource`, `FileSource`.
///
/// # Example
/// ```
/// use bc_core::traits::SampleSource;
/// use bc_core::error::CaptureError;
///
/// struct Silence;
/// impl SampleSource for Silence {
///     fn read(&mut self, n: usize) -> Result<Vec<f32>, CaptureError> { Ok(vec![0.0; n]) }
///     fn sample_rate(&self) -> u32 { 44100 }
/// }
/// ```
pub trait SampleSource {
    /// Retourne exactement `n` échantillons, en bloquant jusqu'à ce qu'ils soient disponibles.
    ///
    /// Toute erreur est fatale pour la boucle de capture.
    fn read(&mut self, n: usize) -> Result<Vec<f32>, CaptureError>;

    /// Fréquence d'échantillonnage effective, en Hz.
    fn sample_rate(&self) -> u32;
}

/// Reçoit chaque valeur normalisée produite par la boucle de capture.
///
/// CONTRAT : ne doit PAS bloquer. La livraison est best-effort.
///
/// # Example
/// ```
/// use bc_core::traits::Publisher;
/// use bc_core::value::NormalizedValue;
///
/// struct Discard;
/// impl Publisher for Discard {
///     fn publish(&self, _value: NormalizedValue) {}
/// }
/// ```
pub trait Publisher: Send + Sync {
    /// Pousse `value` vers tous les abonnés courants.
    fn publish(&self, value: NormalizedValue);
}

impl<P: Publisher + ?Sized> Publisher for std::sync::Arc<P> {
    fn publish(&self, value: NormalizedValue) {
        (**self).publish(value);
    }
}
