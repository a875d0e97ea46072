//! berth-builder - Build executor entry point
//!
//! Launched by the execution substrate with its parameters in the
//! environment. The bus connection is released on every exit path, success
//! or failure.

use berth::builder::publish::BuildLogger;
use berth::builder::{run, BuildContext};
use berth::config::Settings;
use berth::errors::BerthError;
use berth::logs::{init_logging, LogOptions};
use berth::mqtt::client::{BusAddress, BusPublisher};

use tracing::{error, info};
use uuid::Uuid;

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging(LogOptions::default()) {
        println!("Failed to initialize logging: {e}");
    }

    let exit_code = match execute().await {
        Ok(()) => 0,
        Err(e) => {
            error!("Build failed: {e}");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn execute() -> Result<(), BerthError> {
    let ctx = BuildContext::from_env()?;
    info!("Executing build for {}", ctx.deployment_id);

    // Same env vars the API service reads; only bus and storage matter here.
    let settings = Settings::from_env()?;
    let objects = settings.storage.build()?;

    let publisher = connect_publisher(&settings.bus, &ctx.deployment_id)?;
    let logger = BuildLogger::new(publisher, ctx.deployment_id.clone());

    let workspace = workspace_dir(&ctx.deployment_id).await?;
    let result = run(&ctx, &logger, objects.as_ref(), &workspace).await;

    // Release the publish channel no matter how the build went.
    logger.close().await;

    if let Err(e) = tokio::fs::remove_dir_all(&workspace).await {
        error!("Failed to clean workspace {}: {}", workspace.display(), e);
    }

    result
}

fn connect_publisher(bus: &BusAddress, deployment_id: &str) -> Result<BusPublisher, BerthError> {
    let client_id = format!(
        "berth-builder-{}-{}",
        deployment_id,
        &Uuid::new_v4().simple().to_string()[..8]
    );
    BusPublisher::connect(bus, &client_id)
}

async fn workspace_dir(deployment_id: &str) -> Result<std::path::PathBuf, BerthError> {
    let dir = std::env::temp_dir().join(format!(
        "berth-build-{}-{}",
        deployment_id,
        &Uuid::new_v4().simple().to_string()[..8]
    ));
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}
