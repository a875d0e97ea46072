//! berth-api - Deployment orchestrator entry point

use berth::app::options::AppOptions;
use berth::app::run::run;
use berth::config::Settings;
use berth::logs::{init_logging, LogOptions};

use tracing::{error, info};

#[tokio::main]
async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    let options = AppOptions::from_settings(&settings);
    info!("Running berth API service with options: {:?}", options);

    let result = run(options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the API service: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("signal handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("signal handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
