use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kube::Client;
use tokio_util::sync::CancellationToken;

use chainlink_operator::domain::dispatch;
use chainlink_operator::{custom_resource_definitions, load_operator_config, logger};

#[derive(Debug, Parser)]
#[command(name = "chainlink-operator", version, about = "Runs Chainlink nodes and registers their jobs on Kubernetes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Watch ChainlinkNode and ChainlinkJob resources and reconcile them.
    Run {
        /// JSON configuration file. Defaults apply when omitted.
        #[arg(long, short)]
        config: Option<PathBuf>,
        /// Only watch this namespace instead of the whole cluster.
        #[arg(long, short)]
        namespace: Option<String>,
    },
    /// Print the CustomResourceDefinitions as JSON.
    Crds,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Crds => {
            for crd in custom_resource_definitions() {
                println!("{}", serde_json::to_string_pretty(&crd)?);
            }
            Ok(())
        }
        Command::Run { config, namespace } => {
            logger::init();

            let operator_config = load_operator_config(config.as_deref()).context("Failed to load operator configuration")?;
            let client = Client::try_default().await.context("Failed to create Kubernetes client")?;

            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Failed to listen for shutdown signal: {}", e);
                    return;
                }
                log::info!("Shutdown signal received. Stopping controllers.");
                signal_token.cancel();
            });

            dispatch::run(client, operator_config, namespace, shutdown).await;
            log::info!("Operator stopped.");
            Ok(())
        }
    }
}
