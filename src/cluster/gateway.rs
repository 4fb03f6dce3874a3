//! Outbound RPC seam consumed by the engine.

use crate::cluster::types::{ClientConfig, Heartbeat, Vote};
use crate::common::{Node, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// Transport used for node-to-node calls.
///
/// The engine treats every `Err` as a negative vote, a skipped sync, or an
/// empty registry depending on the call site; implementations report
/// transport trouble as errors and must not panic. A peer's `success=false`
/// envelope is also an `Err` — it is a failed call, not empty data.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Register/refresh the sender in `node`'s registry.
    async fn heartbeat_to(&self, node: &Node, heartbeat: Heartbeat) -> Result<()>;

    /// Fetch `node`'s registry snapshot.
    async fn query_registry(&self, node: &Node) -> Result<HashMap<String, ClientConfig>>;

    /// Ask `node` to accept `vote`. A clean protocol "no" is `Ok(false)`.
    async fn request_vote(&self, node: &Node, vote: &Vote) -> Result<bool>;

    /// Push a winning vote to `node`.
    async fn push_master_sync(&self, node: &Node, vote: &Vote) -> Result<()>;
}
