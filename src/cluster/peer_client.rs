//! JSON-over-HTTP gateway used for real peer traffic.

use crate::cluster::gateway::Gateway;
use crate::cluster::types::{ClientConfig, Heartbeat, QueryClients, Reply, Vote};
use crate::common::{Error, Node, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

pub struct HttpGateway {
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// POST `body` to `node`, decode the envelope, and surface
    /// `success=false` as a failed call.
    async fn post<B, T>(&self, node: &Node, path: &str, body: &B) -> Result<Reply<T>>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Default,
    {
        let url = format!("{}{}", node.base_url(), path);
        let reply: Reply<T> = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await?
            .json()
            .await?;
        if !reply.success {
            return Err(Error::Rpc(reply.message));
        }
        Ok(reply)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn heartbeat_to(&self, node: &Node, heartbeat: Heartbeat) -> Result<()> {
        self.post::<_, serde_json::Value>(node, "/vote/heartbeat", &heartbeat)
            .await?;
        Ok(())
    }

    async fn query_registry(&self, node: &Node) -> Result<HashMap<String, ClientConfig>> {
        let reply = self
            .post::<_, HashMap<String, ClientConfig>>(node, "/vote/clusters", &QueryClients::default())
            .await?;
        Ok(reply.data.unwrap_or_default())
    }

    async fn request_vote(&self, node: &Node, vote: &Vote) -> Result<bool> {
        let reply = self.post::<_, bool>(node, "/vote/accept", vote).await?;
        Ok(reply.data.unwrap_or(false))
    }

    async fn push_master_sync(&self, node: &Node, vote: &Vote) -> Result<()> {
        self.post::<_, bool>(node, "/vote/master/sync", vote).await?;
        Ok(())
    }
}
