#![forbid(unsafe_code)]

mod api_client;
mod cli;
mod commands;
mod shutdown;
mod startup;

use anyhow::Result;

use api_client::ApiClient;
use cli::Command;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::parse();
    let output = cli.output;

    match cli.command {
        Some(Command::Version) => {
            println!("domainwatch-agent {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }

        Some(Command::Status { conn }) => {
            let client = ApiClient::new(&conn.host, conn.port);
            commands::cmd_status(&client, output).await
        }

        Some(Command::Health { conn }) => {
            let client = ApiClient::new(&conn.host, conn.port);
            commands::cmd_health(&client, output).await
        }

        Some(Command::Domains { conn }) => {
            let client = ApiClient::new(&conn.host, conn.port);
            commands::cmd_domains(&client, output).await
        }

        Some(Command::Domain { conn, name }) => {
            let client = ApiClient::new(&conn.host, conn.port);
            commands::cmd_domain(&client, &name, output).await
        }

        Some(Command::Metrics { conn, filter }) => {
            let client = ApiClient::new(&conn.host, conn.port);
            commands::cmd_metrics(&client, filter.as_deref()).await
        }

        Some(Command::Refresh { conn }) => {
            let client = ApiClient::new(&conn.host, conn.port);
            commands::cmd_refresh(&client, output).await
        }

        // No subcommand = run the monitor daemon.
        None => startup::run(&cli).await,
    }
}
