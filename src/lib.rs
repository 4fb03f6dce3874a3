//! # nameserv
//!
//! A lightweight cluster name server: a fixed set of peer nodes elects one
//! master among themselves and maintains a shared registry of live clients
//! (name → address → role) that other services query to discover the current
//! master and peer list.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   vote/accept    ┌────────────┐
//! │  Node A    │◄────────────────►│  Node B    │
//! │ (MASTER)   │   master/sync    │ (SLAVE)    │
//! └─────┬──────┘                  └─────┬──────┘
//!       │        heartbeat              │
//!       │   ┌────────────┐              │
//!       └──►│  Node C    │◄─────────────┘
//!           │ (SLAVE)    │   vote/clusters
//!           └────────────┘
//! ```
//!
//! Each node runs the same process: an axum HTTP surface for inbound RPCs,
//! a heartbeat worker that detects master loss and proposes elections, and a
//! cluster-refresh worker that re-pulls the registry as a consistency
//! backstop. Elections are a simplified majority vote: earliest-issued vote
//! wins ties, a quorum of acceptances installs the proposer as master.
//!
//! ## Usage
//!
//! ### Start a node
//! ```bash
//! nameserv-node serve \
//!   --ip 10.0.0.1 --port 8585 \
//!   --nodes 10.0.0.1:8585,10.0.0.2:8585,10.0.0.3:8585
//! ```
//!
//! ### Query a node
//! ```bash
//! # Registry snapshot
//! nameserv clusters --node 10.0.0.1:8585
//!
//! # Node status
//! nameserv status --node 10.0.0.1:8585
//! ```

pub mod cluster;
pub mod common;

// Re-export commonly used types
pub use cluster::{ClusterService, Gateway, Server};
pub use common::{Config, Error, Node, Result};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
