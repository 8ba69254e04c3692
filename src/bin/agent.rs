//! `meshc2-agent` entry point: resolves configuration, opens the serial
//! transport (or discovers one), and runs the agent engine until the
//! transport closes or the process is signaled.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use meshc2::agent_engine::AgentEngine;
use meshc2::cli::AgentArgs;
use meshc2::config::AgentConfigBuilder;
use meshc2::transport::{discover_port, SerialTransport};

#[tokio::main]
async fn main() -> ExitCode {
    let args = AgentArgs::parse();
    init_logging(args.verbose);

    let config = match AgentConfigBuilder::new()
        .port(args.port.clone())
        .channel_index(args.channel_index)
        .timeout(args.timeout_duration())
        .max_payload(args.max_payload)
        .from_env()
    {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let port_wait = args.port_wait_duration().unwrap_or(config.port_wait);

    let port = match &config.port {
        Some(port) => port.clone(),
        None => match discover_port(port_wait, Duration::from_millis(500)).await {
            Ok(port) => port,
            Err(e) => {
                error!(error = %e, "failed to discover a serial device");
                return ExitCode::FAILURE;
            }
        },
    };

    info!(port, channel_index = config.channel_index, "opening serial transport");
    let transport = match SerialTransport::open(&port, config.baud) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, "failed to open serial transport");
            return ExitCode::FAILURE;
        }
    };

    let engine = Arc::new(AgentEngine::new(
        Arc::new(transport),
        config.timeout,
        config.max_payload,
    ));

    tokio::select! {
        () = engine.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, shutting down");
        }
    }

    ExitCode::SUCCESS
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}
