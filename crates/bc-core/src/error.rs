use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Frequency band whose bounds are negative or inverted.
    #[error("Bande de fréquence invalide : [{min_hz}, {max_hz}] Hz")]
    InvalidBand {
        /// Lower edge in Hz.
        min_hz: f32,
        /// Upper edge in Hz.
        max_hz: f32,
    },

    /// Analysis window too short to hop by half of itself.
    #[error("Fenêtre d'analyse trop courte : {0} échantillons (minimum 2)")]
    WindowTooShort(usize),
}

/// Fatal failures of a capture collaborator.
///
/// The capture loop does not retry any of these: they end the loop and
/// propagate to the process.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The input device could not be found or opened.
    #[error("Périphérique audio indisponible : {0}")]
    Device(String),

    /// The backend reported an error on a running stream.
    #[error("Erreur de stream audio : {0}")]
    Stream(String),

    /// No samples arrived within the configured timeout.
    #[error("Capture bloquée : aucun échantillon depuis {0} ms")]
    Stalled(u64),

    /// The source has no more samples to give.
    #[error("Fin du flux audio")]
    Ended,
}
