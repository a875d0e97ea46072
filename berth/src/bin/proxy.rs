//! berth-proxy - Edge router entry point

use berth::config::Settings;
use berth::logs::{init_logging, LogOptions};
use berth::proxy::{serve, ProxyOptions};

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

    let options = ProxyOptions {
        host: settings.api_host.clone(),
        port: settings.proxy_port,
        content_base_url: settings.content_base_url.clone(),
    };

    let handle = match serve(&options, await_shutdown_signal()).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start edge router: {e}");
            std::process::exit(1);
        }
    };

    match handle.await {
        Ok(Ok(())) => info!("Edge router stopped"),
        Ok(Err(e)) => {
            error!("Edge router failed: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Edge router task failed: {e}");
            std::process::exit(1);
        }
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
