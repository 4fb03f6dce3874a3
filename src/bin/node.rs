//! Cluster node binary

use clap::{Parser, Subcommand};
use nameserv::common::{Config, Node};
use nameserv::Server;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "nameserv-node")]
#[command(about = "nameserv cluster node with majority-vote master election")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a cluster node
    Serve {
        /// Config file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Advertised IP
        #[arg(long)]
        ip: Option<String>,

        /// Advertised port
        #[arg(long)]
        port: Option<u16>,

        /// Cluster nodes (comma-separated ip:port, this node included)
        #[arg(long, value_delimiter = ',')]
        nodes: Vec<Node>,

        /// Cluster name
        #[arg(long)]
        cluster: Option<String>,

        /// Client group
        #[arg(long)]
        group: Option<String>,

        /// Minimum affirmative votes to win an election
        #[arg(long)]
        min_quorum: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            ip,
            port,
            nodes,
            cluster,
            group,
            min_quorum,
        } => {
            // File config first, CLI flags win
            let mut cfg = Config::load(config.as_deref())?;
            if let Some(ip) = ip {
                cfg.ip = ip;
            }
            if let Some(port) = port {
                cfg.port = port;
            }
            if !nodes.is_empty() {
                cfg.nodes = nodes;
            }
            if let Some(cluster) = cluster {
                cfg.cluster = cluster;
            }
            if let Some(group) = group {
                cfg.group = group;
            }
            if let Some(min_quorum) = min_quorum {
                cfg.min_quorum = min_quorum;
            }

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level)),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            Server::new(cfg).serve().await?;
        }
    }

    Ok(())
}
