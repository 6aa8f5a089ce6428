use std::sync::Arc;

use anyhow::Result;
use bc_audio::capture_loop::CaptureHandle;
use bc_core::config::{AppConfig, ServerConfig};
use bc_server::{Broadcaster, PushServer, SubscriberRegistry};
use clap::Parser;

pub mod cli;
pub mod pipeline;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    if cli.list_devices {
        for (i, name) in bc_audio::capture::list_input_devices()?.iter().enumerate() {
            let marker = if i == 0 { " (défaut)" } else { "" };
            println!("{name}{marker}");
        }
        return Ok(());
    }

    // 3. Charger la config, puis les overrides CLI
    let mut config = resolve_config(&cli)?;
    cli.apply_overrides(&mut config);
    config.clamp_all();
    config.validate()?;

    // 4. Registre + broadcaster partagés entre capture et réseau
    let registry = Arc::new(SubscriberRegistry::new());
    let broadcaster = Arc::new(Broadcaster::new(registry));

    // 5. Démarrer le thread de capture
    let capture = pipeline::start_capture(&cli, &config, Arc::clone(&broadcaster))?;

    // 6. Serveur push sur le runtime tokio
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("bc-net")
        .build()?;
    runtime.block_on(serve(config.server, broadcaster, capture))
}

/// Run the push server until Ctrl-C or a fatal capture error.
async fn serve(
    server_config: ServerConfig,
    broadcaster: Arc<Broadcaster>,
    capture: CaptureHandle,
) -> Result<()> {
    let server = PushServer::bind(&server_config, broadcaster).await?;
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server_task = tokio::spawn(server.run(async move {
        let _ = stop_rx.await;
    }));

    let outcome = tokio::select! {
        err = capture.failed() => {
            Err(anyhow::Error::new(err).context("Capture audio perdue"))
        }
        joined = &mut server_task => match joined {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        },
        _ = tokio::signal::ctrl_c() => {
            log::info!("Arrêt demandé");
            Ok(())
        }
    };

    let _ = stop_tx.send(());
    outcome
}

/// Load --config if it exists, defaults otherwise.
fn resolve_config(cli: &cli::Cli) -> Result<AppConfig> {
    if cli.config.exists() {
        bc_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        Ok(AppConfig::default())
    }
}
