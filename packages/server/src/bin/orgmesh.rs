//! `orgmesh` binary: runs the department or employee service.

use anyhow::Result;
use clap::Parser;
use orgmesh_server::cli::Cli;
use orgmesh_server::{app, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_format)?;
    if let Some(addr) = cli.metrics_addr {
        telemetry::install_metrics_exporter(addr)?;
    }

    let config = cli.command.service_config()?;
    app::run(cli.command.role(), config).await
}
