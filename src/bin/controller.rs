//! `meshc2-controller` entry point: resolves configuration, opens the
//! serial transport (or discovers one), sends a single command, and prints
//! the assembled reply.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::error;

use meshc2::cli::output::{render_json, render_text};
use meshc2::cli::{ControllerArgs, OutputFormat};
use meshc2::config::ControllerConfigBuilder;
use meshc2::controller_engine::ControllerEngine;
use meshc2::transport::{discover_port, SerialTransport};

#[tokio::main]
async fn main() -> ExitCode {
    let args = ControllerArgs::parse();
    init_logging(args.verbose);

    let config = match ControllerConfigBuilder::new()
        .port(args.port.clone())
        .channel_index(args.channel)
        .timeout(args.timeout_duration())
        .more_delay(args.more_delay_duration())
        .port_wait(args.port_wait_duration())
        .from_env()
    {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let port = match &config.port {
        Some(port) => port.clone(),
        None => match discover_port(config.port_wait, Duration::from_millis(500)).await {
            Ok(port) => port,
            Err(e) => {
                error!(error = %e, "failed to discover a serial device");
                return ExitCode::FAILURE;
            }
        },
    };

    let transport = match SerialTransport::open(&port, config.baud) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, "failed to open serial transport");
            return ExitCode::FAILURE;
        }
    };

    let engine = ControllerEngine::new(transport);
    let result = engine
        .send_and_listen(&args.command, config.timeout, config.more_delay)
        .await;

    let rendered = match args.format {
        OutputFormat::Text => render_text(&result),
        OutputFormat::Json => render_json(&result),
    };
    // The controller's whole purpose is to print its result to stdout.
    #[allow(clippy::print_stdout)]
    {
        println!("{rendered}");
    }

    if result.received {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
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
