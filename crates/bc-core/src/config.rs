use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default sample rate, in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
/// Default lower edge of the measured band, in Hz.
pub const DEFAULT_BAND_MIN_HZ: f32 = 12.0;
/// Default upper edge of the measured band, in Hz.
pub const DEFAULT_BAND_MAX_HZ: f32 = 30.0;
/// Default push server port.
pub const DEFAULT_PORT: u16 = 4649;

/// Configuration complète du processus.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine.
///
/// # Example
/// ```
/// use bc_core::config::AppConfig;
/// let config = AppConfig::default();
/// assert_eq!(config.server.port, 4649);
/// assert_eq!(config.analysis.window_for(44100), 44100);
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Input side.
    pub capture: CaptureConfig,
    /// Windowing and band selection.
    pub analysis: AnalysisConfig,
    /// Push transport.
    pub server: ServerConfig,
}

/// Capture collaborator settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Nom du périphérique d'entrée, ou "default".
    pub device: String,
    /// Fréquence demandée au périphérique, en Hz.
    pub sample_rate: u32,
    /// Délai sans échantillon au-delà duquel la capture est déclarée morte.
    pub stall_timeout_ms: u64,
    /// Rejouer un fichier en boucle au lieu de s'arrêter en fin de flux.
    pub loop_file: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            stall_timeout_ms: 5000,
            loop_file: true,
        }
    }
}

impl CaptureConfig {
    /// The stall timeout as a `Duration`.
    #[must_use]
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    /// `true` when no specific device was requested.
    #[must_use]
    pub fn wants_default_device(&self) -> bool {
        self.device.is_empty() || self.device.eq_ignore_ascii_case("default")
    }
}

/// Spectral analysis settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Window length in samples. `None` = one second at the source rate.
    pub window: Option<usize>,
    /// Borne basse de la bande (incluse), en Hz.
    pub band_min_hz: f32,
    /// Borne haute de la bande (incluse), en Hz.
    pub band_max_hz: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window: None,
            band_min_hz: DEFAULT_BAND_MIN_HZ,
            band_max_hz: DEFAULT_BAND_MAX_HZ,
        }
    }
}

impl AnalysisConfig {
    /// Window length to use for a source running at `sample_rate`.
    #[must_use]
    pub fn window_for(&self, sample_rate: u32) -> usize {
        self.window.unwrap_or(sample_rate as usize)
    }

    /// Hop between consecutive windows: half the window.
    #[must_use]
    pub fn overlap_for(&self, sample_rate: u32) -> usize {
        self.window_for(sample_rate) / 2
    }
}

/// WebSocket push server settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Adresse d'écoute.
    pub bind: String,
    /// Port d'écoute.
    pub port: u16,
    /// Chemin HTTP de l'upgrade WebSocket.
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            path: "/".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parse `bind` and `port` into a socket address.
    ///
    /// # Errors
    /// Returns `CoreError::Config` if `bind` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, CoreError> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|_| CoreError::Config(format!("adresse d'écoute invalide : {}", self.bind)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl AppConfig {
    /// Clamp toutes les valeurs dans leurs plages valides.
    pub fn clamp_all(&mut self) {
        let stall = self.capture.stall_timeout_ms.clamp(100, 60_000);
        if stall != self.capture.stall_timeout_ms {
            log::warn!(
                "stall_timeout_ms {} hors plage, ramené à {stall}",
                self.capture.stall_timeout_ms
            );
            self.capture.stall_timeout_ms = stall;
        }
        let rate = self.capture.sample_rate.clamp(1, 384_000);
        if rate != self.capture.sample_rate {
            log::warn!("sample_rate {} hors plage, ramené à {rate}", self.capture.sample_rate);
            self.capture.sample_rate = rate;
        }
        if !self.server.path.starts_with('/') {
            self.server.path.insert(0, '/');
        }
    }

    /// Check the invariants the pipeline relies on.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), CoreError> {
        let a = &self.analysis;
        if !(a.band_min_hz.is_finite() && a.band_max_hz.is_finite())
            || a.band_min_hz < 0.0
            || a.band_min_hz > a.band_max_hz
        {
            return Err(CoreError::InvalidBand {
                min_hz: a.band_min_hz,
                max_hz: a.band_max_hz,
            });
        }
        if let Some(window) = a.window
            && window < 2
        {
            return Err(CoreError::WindowTooShort(window));
        }
        if self.capture.sample_rate == 0 {
            return Err(CoreError::Config("sample_rate doit être > 0".to_string()));
        }
        if self.server.path == "/status" {
            return Err(CoreError::Config("le chemin /status est réservé".to_string()));
        }
        if !is_literal_route(&self.server.path) {
            return Err(CoreError::Config(format!(
                "chemin invalide : {} (paramètres et jokers interdits)",
                self.server.path
            )));
        }
        self.server.socket_addr()?;
        Ok(())
    }
}

/// `true` when `path` is a plain route: no `{capture}`, `:param` or `*wildcard` segment.
fn is_literal_route(path: &str) -> bool {
    !path.contains(['{', '}'])
        && path
            .split('/')
            .all(|segment| !segment.starts_with([':', '*']))
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    capture: Option<CaptureSection>,
    analysis: Option<AnalysisSection>,
    server: Option<ServerSection>,
}

/// Capture section, all fields optional for partial override.
#[derive(Deserialize)]
struct CaptureSection {
    device: Option<String>,
    sample_rate: Option<u32>,
    stall_timeout_ms: Option<u64>,
    loop_file: Option<bool>,
}

/// Analysis section, all fields optional.
#[derive(Deserialize)]
struct AnalysisSection {
    window: Option<usize>,
    band_min_hz: Option<f32>,
    band_max_hz: Option<f32>,
}

/// Server section, all fields optional.
#[derive(Deserialize)]
struct ServerSection {
    bind: Option<String>,
    port: Option<u16>,
    path: Option<String>,
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, or if the merged
/// configuration fails validation.
///
/// # Example
/// ```no_run
/// use bc_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("Erreur de configuration dans {}", path.display()))?;
    Ok(config)
}

/// Parse TOML text and merge it over the defaults.
///
/// # Errors
/// Returns an error on malformed TOML or invalid values.
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;

    let mut config = AppConfig::default();

    if let Some(c) = file.capture {
        if let Some(v) = c.device {
            config.capture.device = v;
        }
        if let Some(v) = c.sample_rate {
            config.capture.sample_rate = v;
        }
        if let Some(v) = c.stall_timeout_ms {
            config.capture.stall_timeout_ms = v;
        }
        if let Some(v) = c.loop_file {
            config.capture.loop_file = v;
        }
    }

    if let Some(a) = file.analysis {
        if a.window.is_some() {
            config.analysis.window = a.window;
        }
        if let Some(v) = a.band_min_hz {
            config.analysis.band_min_hz = v;
        }
        if let Some(v) = a.band_max_hz {
            config.analysis.band_max_hz = v;
        }
    }

    if let Some(s) = file.server {
        if let Some(v) = s.bind {
            config.server.bind = v;
        }
        if let Some(v) = s.port {
            config.server.port = v;
        }
        if let Some(v) = s.path {
            config.server.path = v;
        }
    }

    config.clamp_all();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").unwrap_or_default();
        assert_eq!(config.capture.sample_rate, 44_100);
        assert!(config.analysis.window.is_none());
        assert!((config.analysis.band_min_hz - 12.0).abs() < f32::EPSILON);
        assert!((config.analysis.band_max_hz - 30.0).abs() < f32::EPSILON);
        assert_eq!(config.server.port, 4649);
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let config = parse_config(
            r#"
            [analysis]
            band_max_hz = 25.0

            [server]
            port = 9000
            path = "ws"
            "#,
        );
        let Ok(config) = config else {
            panic!("valid config rejected");
        };
        assert!((config.analysis.band_min_hz - 12.0).abs() < f32::EPSILON);
        assert!((config.analysis.band_max_hz - 25.0).abs() < f32::EPSILON);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.path, "/ws");
        assert_eq!(config.server.bind, "0.0.0.0");
    }

    #[test]
    fn inverted_band_is_rejected() {
        let result = parse_config(
            r"
            [analysis]
            band_min_hz = 40.0
            band_max_hz = 30.0
            ",
        );
        assert!(result.is_err());
    }

    #[test]
    fn one_sample_window_is_rejected() {
        let mut config = AppConfig::default();
        config.analysis.window = Some(1);
        assert!(matches!(
            config.validate(),
            Err(CoreError::WindowTooShort(1))
        ));
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        let mut config = AppConfig::default();
        config.server.bind = "not-an-ip".to_string();
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn status_path_is_reserved() {
        let mut config = AppConfig::default();
        config.server.path = "/status".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn route_parameters_are_rejected_in_path() {
        for path in ["/:feed", "/live/{capture}", "/*rest", "/a}b"] {
            let mut config = AppConfig::default();
            config.server.path = path.to_string();
            assert!(
                matches!(config.validate(), Err(CoreError::Config(_))),
                "{path} accepted"
            );
        }
        let mut config = AppConfig::default();
        config.server.path = "/live/feed".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn clamp_brings_out_of_range_values_back() {
        let mut config = AppConfig::default();
        config.capture.stall_timeout_ms = 5;
        config.capture.sample_rate = 0;
        config.clamp_all();
        assert_eq!(config.capture.stall_timeout_ms, 100);
        assert_eq!(config.capture.sample_rate, 1);
    }

    #[test]
    fn window_defaults_to_one_second() {
        let mut analysis = AnalysisConfig::default();
        assert_eq!(analysis.window_for(48_000), 48_000);
        assert_eq!(analysis.overlap_for(48_000), 24_000);
        analysis.window = Some(4);
        assert_eq!(analysis.overlap_for(48_000), 2);
    }

    #[test]
    fn load_config_reads_file_from_disk() {
        let mut file = match tempfile::NamedTempFile::new() {
            Ok(f) => f,
            Err(e) => panic!("tempfile: {e}"),
        };
        let written = writeln!(file, "[capture]\nsample_rate = 48000\nloop_file = false");
        assert!(written.is_ok());
        let Ok(config) = load_config(file.path()) else {
            panic!("config on disk rejected");
        };
        assert_eq!(config.capture.sample_rate, 48_000);
        assert!(!config.capture.loop_file);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/bandcast.toml")).is_err());
    }
}
