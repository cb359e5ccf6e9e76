use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use parley::cli::{Cli, Command};
use parley::{ParleyServer, client};

fn init_tracing(default_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Command::Server(args) => {
            let server = ParleyServer::builder()
                .bind(&args.bind_addr())
                .heartbeat_timeout(Duration::from_secs(args.heartbeat_secs))
                .build()
                .await
                .context("failed to start server")?;
            let addr = server.local_addr()?;
            info!("server listening on {addr}");

            server
                .run_until(async {
                    if let Err(error) = tokio::signal::ctrl_c().await {
                        warn!(%error, "ctrl-c handler failed");
                    }
                })
                .await?;
        }
        Command::Client(args) => client::run(args).await?,
    }

    Ok(())
}
