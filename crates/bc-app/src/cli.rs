use std::path::PathBuf;

use bc_core::config::AppConfig;
use clap::Parser;

/// bandcast: band-power meter streamed over WebSocket.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Source audio : "mic" pour microphone, ou chemin vers fichier audio.
    #[arg(long, default_value = "mic")]
    pub audio: String,

    /// Périphérique d'entrée (nom exact, voir --list-devices).
    #[arg(long)]
    pub device: Option<String>,

    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Adresse d'écoute du serveur push.
    #[arg(long)]
    pub bind: Option<String>,

    /// Port d'écoute du serveur push.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Borne basse de la bande, en Hz.
    #[arg(long)]
    pub band_min: Option<f32>,

    /// Borne haute de la bande, en Hz.
    #[arg(long)]
    pub band_max: Option<f32>,

    /// Longueur de fenêtre en échantillons (défaut : 1 s).
    #[arg(long)]
    pub window: Option<usize>,

    /// Avec un fichier : s'arrêter en fin de flux au lieu de boucler.
    #[arg(long, default_value_t = false)]
    pub no_loop: bool,

    /// Lister les périphériques d'entrée et quitter.
    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(ref device) = self.device {
            config.capture.device.clone_from(device);
        }
        if let Some(ref bind) = self.bind {
            config.server.bind.clone_from(bind);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(v) = self.band_min {
            config.analysis.band_min_hz = v;
        }
        if let Some(v) = self.band_max {
            config.analysis.band_max_hz = v;
        }
        if self.window.is_some() {
            config.analysis.window = self.window;
        }
        if self.no_loop {
            config.capture.loop_file = false;
        }
    }

    /// `true` when audio should come from an input device rather than a file.
    #[must_use]
    pub fn wants_microphone(&self) -> bool {
        matches!(self.audio.as_str(), "default" | "mic" | "microphone")
    }
}
