//! CLI for querying cluster nodes

use clap::{Parser, Subcommand};
use nameserv::cluster::types::{ClientConfig, Reply};
use nameserv::common::Node;
use std::collections::HashMap;

#[derive(Parser)]
#[command(name = "nameserv")]
#[command(about = "nameserv cluster query CLI")]
#[command(version)]
struct Cli {
    /// Node to query
    #[arg(long, default_value = "127.0.0.1:8585")]
    node: Node,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the node's registry snapshot
    Clusters,

    /// Print the node's status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Clusters => {
            let reply: Reply<HashMap<String, ClientConfig>> = client
                .post(format!("{}/vote/clusters", cli.node.base_url()))
                .json(&serde_json::json!({}))
                .send()
                .await?
                .json()
                .await?;
            anyhow::ensure!(reply.success, "query failed: {}", reply.message);

            let clients = reply.data.unwrap_or_default();
            println!("Registry of {} ({} clients):", cli.node, clients.len());
            let mut names: Vec<_> = clients.keys().collect();
            names.sort();
            for name in names {
                let config = &clients[name];
                println!(
                    "  {}  {}  {}:{}  last-seen={}",
                    name, config.role, config.ip, config.port, config.heartbeat_time
                );
            }
        }

        Commands::Status => {
            let status: serde_json::Value = client
                .get(format!("{}/status", cli.node.base_url()))
                .send()
                .await?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
