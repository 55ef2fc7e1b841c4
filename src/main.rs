use clap::Parser;
use slackgw::{config::Cli, Gateway};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slackgw=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!("Starting Slack gateway");

    let server = config.server;
    let mut gateway = Gateway::new(config);

    if let Err(e) = gateway.start_slack().await {
        error!(error = %e, "Failed to start");
        return ExitCode::FAILURE;
    }

    if server {
        match gateway.start_http().await {
            Ok(addr) => info!("Server running on http://{}", addr),
            Err(e) => {
                error!(error = %e, "Failed to start");
                return ExitCode::FAILURE;
            }
        }
    }

    if let Err(e) = gateway.start_rtm().await {
        error!(error = %e, "Failed to start");
        gateway.close();
        return ExitCode::FAILURE;
    }

    // Wait till we're killed, or something goes wrong
    match gateway.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Failed to run");
            ExitCode::FAILURE
        }
    }
}
