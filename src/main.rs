// src/main.rs
//! GPS Uplink - forwards serial GPS fixes to an HTTP endpoint

use clap::Parser;
use gps_uplink::{
    config::{Cli, ForwarderConfig},
    error::UplinkError,
    gps::serial::{self, PortReader},
    Forwarder, UplinkSender,
};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status for configuration faults
const EXIT_CONFIG: u8 = 2;

/// Startup failures caused by bad settings exit with `EXIT_CONFIG`, anything else with 1
fn startup_exit_code(error: &UplinkError) -> ExitCode {
    if error.is_configuration_fault() {
        ExitCode::from(EXIT_CONFIG)
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_ports {
        return match serial::available_ports() {
            Ok(ports) if ports.is_empty() => {
                println!("No serial ports found.");
                ExitCode::SUCCESS
            }
            Ok(ports) => {
                println!("Available serial ports:");
                for port in ports {
                    println!("  {}", port);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to list serial ports: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let settings = match ForwarderConfig::load(cli.config.as_deref()).and_then(|mut config| {
        cli.apply(&mut config);
        config.validate()
    }) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return startup_exit_code(&e);
        }
    };

    info!("Starting GPS uplink v{}", env!("CARGO_PKG_VERSION"));
    info!("Device: {} at {} baud", settings.device.path, settings.device.baud_rate);
    info!("Endpoint: {} (device id {})", settings.endpoint.url, settings.endpoint.device_id);

    let sender = match UplinkSender::new(settings.endpoint) {
        Ok(sender) => sender,
        Err(e) => {
            error!("{}", e);
            return startup_exit_code(&e);
        }
    };

    if settings.health_check {
        if let Err(e) = sender.health_check().await {
            warn!("Cannot reach endpoint: {}; continuing anyway", e);
        }
    }

    let reader = PortReader::open(settings.device);
    let mut forwarder = Forwarder::new(reader, sender, settings.send_interval);

    tokio::select! {
        _ = forwarder.run() => {}
        _ = shutdown_signal() => info!("Shutting down GPS uplink..."),
    }

    forwarder.close();
    ExitCode::SUCCESS
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
