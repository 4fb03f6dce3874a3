//! Configuration for nameserv nodes

use crate::common::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Consistency mode. `availability` keeps the node passive: it answers
/// queries from its last-known registry but never heartbeats or elects.
/// `strong` runs the full heartbeat/election machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyMode {
    Availability,
    Strong,
}

/// A statically configured peer endpoint. Equality by (ip, port).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub ip: String,
    pub port: u16,
}

impl Node {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self { ip: ip.into(), port }
    }

    /// Base URL for the node's RPC endpoint.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl FromStr for Node {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (ip, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidConfig(format!("invalid node address: {}", s)))?;
        if ip.is_empty() {
            return Err(Error::InvalidConfig(format!("invalid node address: {}", s)));
        }
        let port = port
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("invalid node port: {}", s)))?;
        Ok(Node::new(ip, port))
    }
}

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cluster this node belongs to
    #[serde(default = "default_cluster")]
    pub cluster: String,

    /// Client group within the cluster
    #[serde(default = "default_group")]
    pub group: String,

    #[serde(default = "default_mode")]
    pub mode: ConsistencyMode,

    /// This node's advertised address
    #[serde(default = "default_ip")]
    pub ip: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// All cluster nodes, this node included
    #[serde(default)]
    pub nodes: Vec<Node>,

    /// Minimum affirmative votes to win an election, self included
    #[serde(default = "default_min_quorum")]
    pub min_quorum: usize,

    #[serde(default = "default_vote_timeout")]
    pub vote_timeout_ms: u64,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_refresh_interval")]
    pub cluster_refresh_interval_ms: u64,

    #[serde(default = "default_heartbeat_enabled")]
    pub heartbeat_enabled: bool,

    /// Outbound peer RPC timeout
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_ms: u64,

    /// Listen address override; defaults to 0.0.0.0:{port}
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<SocketAddr>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_cluster() -> String {
    "defaultCluster".to_string()
}
fn default_group() -> String {
    "defaultGroup".to_string()
}
fn default_mode() -> ConsistencyMode {
    ConsistencyMode::Strong
}
fn default_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8585
}
fn default_min_quorum() -> usize {
    2
}
fn default_vote_timeout() -> u64 {
    60_000
}
fn default_heartbeat_interval() -> u64 {
    10_000
}
fn default_refresh_interval() -> u64 {
    3_000
}
fn default_heartbeat_enabled() -> bool {
    true
}
fn default_rpc_timeout() -> u64 {
    3_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster: default_cluster(),
            group: default_group(),
            mode: default_mode(),
            ip: default_ip(),
            port: default_port(),
            nodes: Vec::new(),
            min_quorum: default_min_quorum(),
            vote_timeout_ms: default_vote_timeout(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            cluster_refresh_interval_ms: default_refresh_interval(),
            heartbeat_enabled: default_heartbeat_enabled(),
            rpc_timeout_ms: default_rpc_timeout(),
            bind: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file plus `NAMESERV_*`
    /// environment overrides. Missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(p) => builder.add_source(config::File::from(p)),
            None => builder.add_source(config::File::with_name("nameserv").required(false)),
        };
        let raw = builder
            .add_source(
                config::Environment::with_prefix("NAMESERV")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        raw.try_deserialize()
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::InvalidConfig("port must be non-zero".into()));
        }
        if self.min_quorum < 1 {
            return Err(Error::InvalidConfig("min_quorum must be at least 1".into()));
        }
        if self.is_strong() && self.nodes.is_empty() {
            return Err(Error::InvalidConfig(
                "strong mode requires a configured node list".into(),
            ));
        }
        Ok(())
    }

    pub fn is_strong(&self) -> bool {
        self.mode == ConsistencyMode::Strong
    }

    pub fn self_node(&self) -> Node {
        Node::new(self.ip.clone(), self.port)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], self.port)))
    }

    pub fn vote_timeout(&self) -> Duration {
        Duration::from_millis(self.vote_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn cluster_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.cluster_refresh_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Age past which a registry heartbeat is considered stale: one heartbeat
    /// interval plus a one-second grace.
    pub fn heartbeat_stale_ms(&self) -> i64 {
        self.heartbeat_interval_ms as i64 + 1_000
    }
}
