//! lumibridge daemon.
//!
//! # Usage
//!
//! ```bash
//! # Bridge with the default ports (eHuB 8765 in, Art-Net 6454 out)
//! lumibridge-server --routing routing.csv
//!
//! # With a channel patch applied on top
//! lumibridge-server --routing routing.csv --patch patch.csv
//! ```

use std::path::PathBuf;

use clap::Parser;
use lumibridge_server::{ConfigManager, ControlRequest, PipelineOptions};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// eHuB to Art-Net realtime bridge
#[derive(Parser, Debug)]
#[command(name = "lumibridge-server")]
#[command(about = "eHuB to Art-Net realtime lighting bridge")]
#[command(version)]
struct Args {
    /// Routing sheet (CSV: name,entity_start,entity_end,ip,universe)
    #[arg(short, long)]
    routing: PathBuf,

    /// Optional patch sheet (CSV: universe,source,destination)
    #[arg(short, long)]
    patch: Option<PathBuf>,

    /// UDP port to listen on for eHuB
    #[arg(long, default_value_t = lumibridge_server::DEFAULT_EHUB_PORT)]
    ehub_port: u16,

    /// UDP port controllers listen on for Art-Net
    #[arg(long, default_value_t = lumibridge_proto::artnet::ARTNET_PORT)]
    artnet_port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("lumibridge starting");

    let options = PipelineOptions { ehub_port: args.ehub_port, artnet_port: args.artnet_port };
    let (manager, mut monitor) = ConfigManager::new(options);

    let (request_tx, request_rx) = tokio::sync::mpsc::channel(16);
    let manager_task = tokio::spawn(manager.run(request_rx));

    // Headless stand-in for the inspection GUI: drain the tap so bursts
    // are visible at trace level instead of piling up.
    tokio::spawn(async move {
        while let Some(snapshot) = monitor.recv().await {
            tracing::trace!(
                universe = snapshot.universe,
                entities = snapshot.input.len(),
                "monitor snapshot"
            );
        }
    });

    let (request, outcome) = ControlRequest::load_file(args.routing);
    request_tx.send(request).await?;
    outcome.await??;

    if let Some(patch) = args.patch {
        let (request, outcome) = ControlRequest::load_patch(patch);
        request_tx.send(request).await?;
        outcome.await??;
    }

    tracing::info!("bridge running, ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    let (request, outcome) = ControlRequest::shutdown();
    request_tx.send(request).await?;
    let _ = outcome.await;
    manager_task.await?;

    Ok(())
}
