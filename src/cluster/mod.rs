//! Cluster coordination: the client registry, the election engine, the
//! background workers, and both sides of the RPC surface.

pub mod context;
pub mod engine;
pub mod gateway;
pub mod http;
pub mod peer_client;
pub mod server;
pub mod types;
pub mod workers;

pub use context::Context;
pub use engine::{ClusterService, RejectReason, VoteDecision};
pub use gateway::Gateway;
pub use peer_client::HttpGateway;
pub use server::Server;
pub use types::{ClientConfig, Heartbeat, Reply, Role, Vote};
